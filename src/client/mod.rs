//! HashiCups API client.
//!
//! Handlers only ever see the [`HashicupsApi`] trait. The production
//! implementation is [`HttpClient`]; tests use
//! [`InMemoryApi`](crate::testing::InMemoryApi).

mod error;
mod http;
mod models;

use std::sync::Arc;

pub use error::ClientError;
pub use http::{HttpClient, DEFAULT_HOST_URL};
pub use models::{Coffee, Order, OrderItem};

use crate::config::Credentials;

/// The slice of the HashiCups API the provider consumes.
#[async_trait::async_trait]
pub trait HashicupsApi: Send + Sync {
    /// Fetch an order by id.
    async fn get_order(&self, order_id: &str) -> Result<Order, ClientError>;

    /// Place a new order.
    async fn create_order(&self, items: &[OrderItem]) -> Result<Order, ClientError>;

    /// Replace the items of an existing order.
    async fn update_order(&self, order_id: &str, items: &[OrderItem])
        -> Result<Order, ClientError>;

    /// Delete an order.
    async fn delete_order(&self, order_id: &str) -> Result<(), ClientError>;

    /// List every coffee on the menu.
    async fn list_coffees(&self) -> Result<Vec<Coffee>, ClientError>;
}

/// Builds an API client from resolved credentials.
///
/// Called once per `Configure`.
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    /// Construct (and authenticate, if credentials are present) a client.
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn HashicupsApi>, ClientError>;
}

/// Factory producing [`HttpClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

#[async_trait::async_trait]
impl ClientFactory for HttpClientFactory {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn HashicupsApi>, ClientError> {
        let client = HttpClient::new(credentials).await?;
        Ok(Arc::new(client))
    }
}
