//! The `hashicups_coffees` data source: the full menu.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::HashicupsApi;
use crate::error::ProviderError;
use crate::mapping::{from_api_coffee_list, to_state, CoffeeData};
use crate::schema::{Attribute, AttributeType, Schema};

/// Type name of the coffees data source.
pub const COFFEES_DATA_SOURCE: &str = "hashicups_coffees";

/// Schema of the coffees data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Every coffee on the HashiCups menu.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "coffees",
            Attribute::computed_object_list([
                ("id", AttributeType::Int64),
                ("name", AttributeType::String),
                ("teaser", AttributeType::String),
                ("description", AttributeType::String),
                ("price", AttributeType::Int64),
                ("image", AttributeType::String),
            ]),
        )
}

#[derive(Debug, Serialize)]
struct CoffeesData {
    id: String,
    coffees: Vec<CoffeeData>,
}

/// List the menu.
///
/// The listing has no natural id, so the read time in Unix seconds is used.
#[instrument(skip_all)]
pub async fn read(api: &dyn HashicupsApi) -> Result<Value, ProviderError> {
    let coffees = from_api_coffee_list(&api.list_coffees().await?);
    debug!(count = coffees.len(), "Read coffees data source");

    to_state(&CoffeesData {
        id: chrono::Utc::now().timestamp().to_string(),
        coffees,
    })
}
