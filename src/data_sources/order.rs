//! The `hashicups_order` data source: one order looked up by id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::HashicupsApi;
use crate::error::ProviderError;
use crate::mapping::{from_api_order_items_data, parse, to_state, OrderItemData};
use crate::schema::{Attribute, AttributeType, Schema};

/// Type name of the order data source.
pub const ORDER_DATA_SOURCE: &str = "hashicups_order";

/// Schema of the order data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Look up a single HashiCups order.")
        .with_attribute(
            "id",
            Attribute::required_int64().with_description("Order to look up."),
        )
        .with_attribute(
            "items",
            Attribute::computed_object_list([
                ("coffee_id", AttributeType::Int64),
                ("coffee_name", AttributeType::String),
                ("coffee_teaser", AttributeType::String),
                ("coffee_description", AttributeType::String),
                ("coffee_price", AttributeType::Int64),
                ("coffee_image", AttributeType::String),
                ("quantity", AttributeType::Int64),
            ]),
        )
}

#[derive(Debug, Deserialize)]
struct OrderDataConfig {
    id: i64,
}

#[derive(Debug, Serialize)]
struct OrderData {
    id: i64,
    items: Vec<OrderItemData>,
}

/// Fetch the order named by `config.id`.
#[instrument(skip_all)]
pub async fn read(api: &dyn HashicupsApi, config: Value) -> Result<Value, ProviderError> {
    let config: OrderDataConfig = parse("order lookup", config)?;
    let order = api.get_order(&config.id.to_string()).await?;
    let items = from_api_order_items_data(order.items.as_deref());
    debug!(order_id = config.id, items = items.len(), "Read order data source");

    to_state(&OrderData {
        id: config.id,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OrderItem;
    use crate::testing::InMemoryApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_order() {
        let api = InMemoryApi::with_menu()
            .with_order(1, vec![OrderItem::new(1, 2), OrderItem::new(3, 1)]);

        let state = read(&api, json!({"id": 1})).await.unwrap();
        assert_eq!(state["id"], 1);
        assert_eq!(state["items"].as_array().unwrap().len(), 2);
        assert_eq!(state["items"][0]["coffee_name"], "Packer Spiced Latte");
        assert_eq!(state["items"][0]["quantity"], 2);
        assert_eq!(state["items"][1]["coffee_id"], 3);
    }

    #[tokio::test]
    async fn test_missing_order_is_an_error() {
        let api = InMemoryApi::with_menu();
        let err = read(&api, json!({"id": 9})).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_id_is_required() {
        let api = InMemoryApi::with_menu();
        let err = read(&api, json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_items_are_computed() {
        let schema = schema();
        assert!(schema.block.attributes["items"].flags.is_computed_only());
        assert!(schema.block.attributes["id"].flags.required);
    }
}
