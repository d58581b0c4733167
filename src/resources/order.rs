//! The `hashicups_order` resource.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::{HashicupsApi, OrderItem};
use crate::error::ProviderError;
use crate::mapping::{
    from_api_order_items, items_changed, to_api_order_items, OrderItemState, OrderState,
};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Type name of the order resource.
pub const ORDER_RESOURCE: &str = "hashicups_order";

const LAST_UPDATED_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Schema of the order resource.
pub fn schema() -> Schema {
    let coffee = Block::new()
        .with_attribute(
            "id",
            Attribute::required_int64().with_description("Coffee to order."),
        )
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("teaser", Attribute::computed_string())
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("price", Attribute::computed_int64())
        .with_attribute("image", Attribute::computed_string());

    let item = Block::new()
        .with_attribute(
            "quantity",
            Attribute::required_int64().with_description("Number of cups."),
        )
        .with_block("coffee", NestedBlock::exactly_one(coffee));

    Schema::v0()
        .with_description("A HashiCups coffee order.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "last_updated",
            Attribute::optional_computed_string()
                .with_description("Set whenever the provider changes the order's items."),
        )
        .with_block("items", NestedBlock::list(item).with_min_items(1))
}

/// The current time in the `last_updated` format, e.g.
/// `Tuesday, 14-Nov-23 15:04:05 UTC`.
pub fn last_updated_now() -> String {
    chrono::Utc::now().format(LAST_UPDATED_FORMAT).to_string()
}

/// Plan a change to an order.
///
/// A null proposed state plans a destroy. Without a prior state the order is
/// created. Otherwise the plan is in place, and only a change to a coffee id
/// or quantity counts as a change.
pub fn plan(prior_state: Option<Value>, proposed_state: Value) -> Result<PlanResult, ProviderError> {
    let prior = match prior_state.filter(|v| !v.is_null()) {
        Some(value) => Some(OrderState::from_value(value)?),
        None => None,
    };

    if proposed_state.is_null() {
        let id = prior.and_then(|p| p.id).map_or(Value::Null, Value::String);
        return Ok(PlanResult::with_changes(
            Value::Null,
            vec![AttributeChange::removed("id", id)],
        ));
    }

    let proposed = OrderState::from_value(proposed_state)?;
    let planned_items: Vec<OrderItemState> =
        proposed.items.iter().map(OrderItemState::planned).collect();

    match prior {
        None => {
            let planned = OrderState {
                id: None,
                last_updated: proposed.last_updated,
                items: planned_items,
            };
            let items = serde_json::to_value(&planned.items)?;
            Ok(PlanResult::with_changes(
                planned.to_value()?,
                vec![AttributeChange::added("items", items)],
            ))
        }
        Some(prior) if items_changed(&prior.items, &proposed.items) => {
            let before = serde_json::to_value(&prior.items)?;
            let planned = OrderState {
                id: prior.id,
                last_updated: None,
                items: planned_items,
            };
            let after = serde_json::to_value(&planned.items)?;
            Ok(PlanResult::with_changes(
                planned.to_value()?,
                vec![AttributeChange::modified("items", before, after)],
            ))
        }
        Some(prior) => Ok(PlanResult::no_change(prior.to_value()?)),
    }
}

/// Start tracking an existing order by id.
///
/// Only the id is known until the next read.
pub fn import(id: &str) -> Result<OrderState, ProviderError> {
    if id.trim().is_empty() {
        return Err(ProviderError::Validation(
            "import requires a non-empty order id".to_string(),
        ));
    }
    Ok(OrderState {
        id: Some(id.to_string()),
        ..Default::default()
    })
}

/// Lifecycle handler for orders, bound to a configured client.
pub struct OrderResource<'a> {
    api: &'a dyn HashicupsApi,
}

impl<'a> OrderResource<'a> {
    /// Bind the handler to a client.
    pub fn new(api: &'a dyn HashicupsApi) -> Self {
        Self { api }
    }

    /// Place the order described by `state` and record the assigned id.
    ///
    /// If the refresh after placing the order fails, the failure is logged
    /// and the state from the create response is kept.
    #[instrument(skip_all)]
    pub async fn create(&self, state: &mut OrderState) -> Result<(), ProviderError> {
        let items = self.api_items(state)?;
        let order = self.api.create_order(&items).await?;

        state.id = Some(order.id.to_string());
        state.items = from_api_order_items(order.items.as_deref());
        info!(order_id = order.id, "Created order");

        let mut refreshed = state.clone();
        match self.read(&mut refreshed).await {
            Ok(()) if refreshed.id.is_some() => *state = refreshed,
            Ok(()) => warn!(order_id = order.id, "Order vanished right after create"),
            Err(e) => warn!(order_id = order.id, error = %e, "Refresh after create failed"),
        }
        Ok(())
    }

    /// Refresh `state` from the API.
    ///
    /// If the order no longer exists the id is cleared.
    #[instrument(skip_all, fields(order_id = ?state.id))]
    pub async fn read(&self, state: &mut OrderState) -> Result<(), ProviderError> {
        let order_id = state.require_id()?.to_string();
        match self.api.get_order(&order_id).await {
            Ok(order) => {
                state.items = from_api_order_items(order.items.as_deref());
                debug!(items = state.items.len(), "Read order");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Order no longer exists, removing from state");
                state.id = None;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bring the remote order in line with `state`.
    ///
    /// The API is only called when a coffee id or quantity differs from
    /// `prior`; `last_updated` changes exactly then.
    #[instrument(skip_all, fields(order_id = ?prior.id))]
    pub async fn update(
        &self,
        prior: &OrderState,
        state: &mut OrderState,
    ) -> Result<(), ProviderError> {
        if state.id.is_none() {
            state.id = prior.id.clone();
        }
        let order_id = state.require_id()?.to_string();

        if items_changed(&prior.items, &state.items) {
            let items = self.api_items(state)?;
            self.api.update_order(&order_id, &items).await?;
            state.last_updated = Some(last_updated_now());
            info!("Updated order items");
        } else {
            debug!("Order items unchanged, skipping API update");
            if state.last_updated.is_none() {
                state.last_updated = prior.last_updated.clone();
            }
        }

        self.read(state).await
    }

    /// Delete the remote order.
    ///
    /// The id is cleared only once the API confirms; an order that is
    /// already gone counts as deleted.
    #[instrument(skip_all, fields(order_id = ?state.id))]
    pub async fn delete(&self, state: &mut OrderState) -> Result<(), ProviderError> {
        let order_id = state.require_id()?.to_string();
        match self.api.delete_order(&order_id).await {
            Ok(()) => info!("Deleted order"),
            Err(e) if e.is_not_found() => debug!("Order already gone"),
            Err(e) => return Err(e.into()),
        }
        state.id = None;
        Ok(())
    }

    fn api_items(&self, state: &OrderState) -> Result<Vec<OrderItem>, ProviderError> {
        if state.items.is_empty() {
            return Err(ProviderError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        to_api_order_items(&state.items)
    }
}

/// The order state as the host expects it: null once the order is gone.
pub(crate) fn to_host_state(state: &OrderState) -> Result<Value, ProviderError> {
    if state.id.is_none() {
        Ok(Value::Null)
    } else {
        state.to_value()
    }
}
