//! Wire types of the HashiCups REST API.

use serde::{Deserialize, Serialize};

/// A coffee on the HashiCups menu.
///
/// Coffees are read-only from the provider's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coffee {
    /// Coffee identifier.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Short teaser line.
    #[serde(default)]
    pub teaser: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Price in minor currency units.
    #[serde(default)]
    pub price: i64,
    /// Image path.
    #[serde(default)]
    pub image: String,
}

impl Coffee {
    /// A coffee reference carrying only its identifier.
    ///
    /// This is what order requests send; the API fills in the rest.
    pub fn reference(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The ordered coffee.
    pub coffee: Coffee,
    /// How many cups.
    pub quantity: i64,
}

impl OrderItem {
    /// Create an order item referencing a coffee by id.
    pub fn new(coffee_id: i64, quantity: i64) -> Self {
        Self {
            coffee: Coffee::reference(coffee_id),
            quantity,
        }
    }
}

/// An order as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: i64,
    /// Order lines. The API may omit them.
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignInRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(rename = "UserID", default)]
    pub user_id: i64,
    #[serde(rename = "Username", default)]
    pub username: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_without_items_decodes() {
        let order: Order = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(order.id, 7);
        assert!(order.items.is_none());
    }

    #[test]
    fn test_order_item_request_shape() {
        let body = serde_json::to_value(vec![OrderItem::new(3, 2)]).unwrap();
        assert_eq!(body[0]["coffee"]["id"], 3);
        assert_eq!(body[0]["quantity"], 2);
    }

    #[test]
    fn test_auth_response_field_names() {
        let auth: AuthResponse =
            serde_json::from_value(json!({"UserID": 1, "Username": "education", "token": "t0k"}))
                .unwrap();
        assert_eq!(auth.user_id, 1);
        assert_eq!(auth.username, "education");
        assert_eq!(auth.token, "t0k");
    }
}
