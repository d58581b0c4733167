//! `reqwest`-backed HashiCups client.

use std::fmt;
use std::time::Duration;

use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::models::{AuthResponse, SignInRequest};
use super::{ClientError, Coffee, HashicupsApi, Order, OrderItem};
use crate::config::Credentials;

/// Host used when neither configuration nor environment names one.
pub const DEFAULT_HOST_URL: &str = "http://localhost:19090";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DELETED_ORDER_BODY: &str = "Deleted order";

/// HTTP client for the HashiCups API.
///
/// When both a username and a password are supplied the client signs in on
/// construction and sends the returned token with every later request.
pub struct HttpClient {
    http: reqwest::Client,
    host_url: String,
    token: Option<String>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("host_url", &self.host_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Build a client, signing in if both credentials are present.
    pub async fn new(credentials: &Credentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let host_url = credentials
            .host
            .as_deref()
            .unwrap_or(DEFAULT_HOST_URL)
            .trim_end_matches('/')
            .to_string();

        let mut client = Self {
            http,
            host_url,
            token: None,
        };

        if let (Some(username), Some(password)) = (
            credentials.username.as_deref(),
            credentials.password.as_deref(),
        ) {
            client.sign_in(username, password).await?;
        }

        Ok(client)
    }

    /// Base URL requests are sent to.
    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    /// Whether the client holds an auth token.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[instrument(skip(self, password), fields(host = %self.host_url))]
    async fn sign_in(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.url("/signin"))
            .json(&SignInRequest { username, password });
        let auth: AuthResponse = self.send_json(request).await?;
        debug!(user_id = auth.user_id, username = %auth.username, "Signed in");
        self.token = Some(auth.token);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, token.as_str()),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();
        let body = response.text().await?;

        match status {
            StatusCode::OK => Ok(body),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(format!(
                "{} ({})",
                path,
                body.trim()
            ))),
            other => Err(ClientError::Status {
                status: other.as_u16(),
                body,
            }),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl HashicupsApi for HttpClient {
    async fn get_order(&self, order_id: &str) -> Result<Order, ClientError> {
        let path = format!("/orders/{}", order_id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn create_order(&self, items: &[OrderItem]) -> Result<Order, ClientError> {
        let request = self.request(Method::POST, "/orders").json(items);
        self.send_json(request).await
    }

    async fn update_order(
        &self,
        order_id: &str,
        items: &[OrderItem],
    ) -> Result<Order, ClientError> {
        let path = format!("/orders/{}", order_id);
        let request = self.request(Method::PUT, &path).json(items);
        self.send_json(request).await
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), ClientError> {
        let path = format!("/orders/{}", order_id);
        let body = self.send(self.request(Method::DELETE, &path)).await?;
        if body.trim() != DELETED_ORDER_BODY {
            return Err(ClientError::Unexpected(body));
        }
        Ok(())
    }

    async fn list_coffees(&self) -> Result<Vec<Coffee>, ClientError> {
        self.send_json(self.request(Method::GET, "/coffees")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn credentials(host: String, username: Option<&str>, password: Option<&str>) -> Credentials {
        Credentials {
            host: Some(host),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_signs_in_and_sends_token() {
        let mut server = mockito::Server::new_async().await;
        let signin = server
            .mock("POST", "/signin")
            .match_body(Matcher::Json(
                json!({"username": "education", "password": "test123"}),
            ))
            .with_status(200)
            .with_body(r#"{"UserID":1,"Username":"education","token":"t0k"}"#)
            .create_async()
            .await;
        let coffees = server
            .mock("GET", "/coffees")
            .match_header("authorization", "t0k")
            .with_status(200)
            .with_body(r#"[{"id":1,"name":"Packer Spiced Latte","teaser":"Packed with goodness","description":"","price":350,"image":"/packer.png"}]"#)
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(
            server.url(),
            Some("education"),
            Some("test123"),
        ))
        .await
        .unwrap();
        assert!(client.is_authenticated());

        let list = client.list_coffees().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Packer Spiced Latte");
        assert_eq!(list[0].price, 350);

        signin.assert_async().await;
        coffees.assert_async().await;
    }

    #[tokio::test]
    async fn test_skips_sign_in_without_both_credentials() {
        let mut server = mockito::Server::new_async().await;
        let signin = server
            .mock("POST", "/signin")
            .expect(0)
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(server.url(), Some("education"), None))
            .await
            .unwrap();
        assert!(!client.is_authenticated());
        signin.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_sign_in_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/signin")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let err = HttpClient::new(&credentials(server.url(), Some("a"), Some("b")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/orders/9")
            .with_status(404)
            .with_body("order not found")
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(server.url(), None, None))
            .await
            .unwrap();
        let err = client.get_order("9").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_order_posts_items() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/orders")
            .match_body(Matcher::PartialJson(
                json!([{"coffee": {"id": 3}, "quantity": 2}]),
            ))
            .with_status(200)
            .with_body(r#"{"id":12,"items":[{"coffee":{"id":3,"name":"Nomadicano","teaser":"","description":"","price":150,"image":"/nomad.png"},"quantity":2}]}"#)
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(server.url(), None, None))
            .await
            .unwrap();
        let order = client.create_order(&[OrderItem::new(3, 2)]).await.unwrap();

        assert_eq!(order.id, 12);
        let items = order.items.unwrap();
        assert_eq!(items[0].coffee.name, "Nomadicano");
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_order_checks_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/orders/1")
            .with_status(200)
            .with_body("Deleted order")
            .create_async()
            .await;
        server
            .mock("DELETE", "/orders/2")
            .with_status(200)
            .with_body("something else")
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(server.url(), None, None))
            .await
            .unwrap();
        tokio_test::assert_ok!(client.delete_order("1").await);
        let err = client.delete_order("2").await.unwrap_err();
        assert!(matches!(err, ClientError::Unexpected(body) if body == "something else"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/orders/4")
            .with_status(500)
            .with_body("database down")
            .create_async()
            .await;

        let client = HttpClient::new(&credentials(server.url(), None, None))
            .await
            .unwrap();
        let err = client
            .update_order("4", &[OrderItem::new(1, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "status: 500, body: database down");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = HttpClient {
            http: reqwest::Client::new(),
            host_url: DEFAULT_HOST_URL.to_string(),
            token: Some("secret-token".to_string()),
        };
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("authenticated: true"));
    }
}
