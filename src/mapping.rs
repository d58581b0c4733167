//! Conversion between host states and HashiCups API types.
//!
//! Host states arrive as JSON and are parsed into the typed structs below at
//! the boundary, so shape and type errors surface as
//! [`ProviderError::Validation`] before any API call is made. The conversion
//! functions themselves are pure.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{Coffee, OrderItem};
use crate::error::ProviderError;

/// The `coffee` block of an order item.
///
/// Only `id` is user input; the rest is filled in from the API and is `None`
/// while unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoffeeState {
    /// Coffee identifier.
    pub id: i64,
    /// Coffee name.
    #[serde(default)]
    pub name: Option<String>,
    /// Teaser line.
    #[serde(default)]
    pub teaser: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Price in minor currency units.
    #[serde(default)]
    pub price: Option<i64>,
    /// Image path.
    #[serde(default)]
    pub image: Option<String>,
}

/// One entry of the `items` block of the order resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemState {
    /// The ordered coffee.
    pub coffee: CoffeeState,
    /// Number of cups.
    pub quantity: i64,
}

impl OrderItemState {
    /// An item referencing `coffee_id`, with every computed field unknown.
    pub fn new(coffee_id: i64, quantity: i64) -> Self {
        Self {
            coffee: CoffeeState {
                id: coffee_id,
                ..Default::default()
            },
            quantity,
        }
    }

    /// The same item with computed coffee fields reset to unknown.
    pub fn planned(&self) -> Self {
        Self::new(self.coffee.id, self.quantity)
    }
}

/// State of a `hashicups_order` resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderState {
    /// Remote order id; `None` while the order does not exist.
    #[serde(default)]
    pub id: Option<String>,
    /// When the provider last changed the order's items.
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Order lines.
    #[serde(default)]
    pub items: Vec<OrderItemState>,
}

impl OrderState {
    /// Parse a host state.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        parse("order", value)
    }

    /// Encode for the host.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        to_state(self)
    }

    /// The remote id, or a validation error if the order has none.
    pub fn require_id(&self) -> Result<&str, ProviderError> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Validation("order state has no id".to_string()))
    }
}

/// One entry of the `items` list of the `hashicups_order` data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemData {
    /// Coffee identifier.
    pub coffee_id: i64,
    /// Coffee name.
    pub coffee_name: String,
    /// Teaser line.
    pub coffee_teaser: String,
    /// Description.
    pub coffee_description: String,
    /// Price in minor currency units.
    pub coffee_price: i64,
    /// Image path.
    pub coffee_image: String,
    /// Number of cups.
    pub quantity: i64,
}

/// One entry of the `coffees` list of the `hashicups_coffees` data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeData {
    /// Coffee identifier.
    pub id: i64,
    /// Name.
    pub name: String,
    /// Teaser line.
    pub teaser: String,
    /// Description.
    pub description: String,
    /// Price in minor currency units.
    pub price: i64,
    /// Image path.
    pub image: String,
}

/// Build API order items from resource items.
///
/// Every quantity must be positive.
pub fn to_api_order_items(items: &[OrderItemState]) -> Result<Vec<OrderItem>, ProviderError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if item.quantity < 1 {
                return Err(ProviderError::Validation(format!(
                    "items.{}.quantity must be a positive integer, got {}",
                    i, item.quantity
                )));
            }
            Ok(OrderItem::new(item.coffee.id, item.quantity))
        })
        .collect()
}

/// Resource items from API order items, with every coffee field filled in.
///
/// Absent input yields an empty list.
pub fn from_api_order_items(items: Option<&[OrderItem]>) -> Vec<OrderItemState> {
    items
        .unwrap_or_default()
        .iter()
        .map(|item| OrderItemState {
            coffee: CoffeeState {
                id: item.coffee.id,
                name: Some(item.coffee.name.clone()),
                teaser: Some(item.coffee.teaser.clone()),
                description: Some(item.coffee.description.clone()),
                price: Some(item.coffee.price),
                image: Some(item.coffee.image.clone()),
            },
            quantity: item.quantity,
        })
        .collect()
}

/// Flat data-source items from API order items.
///
/// Absent input yields an empty list.
pub fn from_api_order_items_data(items: Option<&[OrderItem]>) -> Vec<OrderItemData> {
    items
        .unwrap_or_default()
        .iter()
        .map(|item| OrderItemData {
            coffee_id: item.coffee.id,
            coffee_name: item.coffee.name.clone(),
            coffee_teaser: item.coffee.teaser.clone(),
            coffee_description: item.coffee.description.clone(),
            coffee_price: item.coffee.price,
            coffee_image: item.coffee.image.clone(),
            quantity: item.quantity,
        })
        .collect()
}

/// Project coffees onto the data-source shape.
pub fn from_api_coffee_list(coffees: &[Coffee]) -> Vec<CoffeeData> {
    coffees
        .iter()
        .map(|coffee| CoffeeData {
            id: coffee.id,
            name: coffee.name.clone(),
            teaser: coffee.teaser.clone(),
            description: coffee.description.clone(),
            price: coffee.price,
            image: coffee.image.clone(),
        })
        .collect()
}

/// Whether two item lists differ in coffee id or quantity at any position.
///
/// Computed coffee fields are ignored.
pub fn items_changed(prior: &[OrderItemState], planned: &[OrderItemState]) -> bool {
    prior.len() != planned.len()
        || prior
            .iter()
            .zip(planned)
            .any(|(a, b)| a.coffee.id != b.coffee.id || a.quantity != b.quantity)
}

pub(crate) fn parse<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Validation(format!("invalid {}: {}", what, e)))
}

pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}
