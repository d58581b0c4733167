//! The HashiCups provider: configuration plus dispatch to resources and data
//! sources.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::client::{ClientFactory, HashicupsApi, HttpClientFactory};
use crate::config::{self, ProviderConfig};
use crate::data_sources::{self, COFFEES_DATA_SOURCE, ORDER_DATA_SOURCE};
use crate::error::ProviderError;
use crate::mapping::OrderState;
use crate::resources::order::{self, OrderResource, ORDER_RESOURCE};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The HashiCups provider.
///
/// Holds no client until [`configure`](ProviderService::configure) succeeds;
/// every call that needs the API fails with
/// [`ProviderError::Configuration`] before then.
pub struct HashicupsProvider<F: ClientFactory = HttpClientFactory> {
    factory: F,
    env: EnvLookup,
    client: RwLock<Option<Arc<dyn HashicupsApi>>>,
}

impl HashicupsProvider {
    /// A provider talking to the real API over HTTP.
    pub fn new() -> Self {
        Self::with_factory(HttpClientFactory)
    }
}

impl Default for HashicupsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ClientFactory> HashicupsProvider<F> {
    /// A provider building its client with `factory`, reading credential
    /// fallbacks from the process environment.
    pub fn with_factory(factory: F) -> Self {
        Self {
            factory,
            env: Box::new(|key: &str| std::env::var(key).ok()),
            client: RwLock::new(None),
        }
    }

    /// Replace the environment lookup used for credential fallbacks.
    pub fn with_env<E>(mut self, env: E) -> Self
    where
        E: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// The client factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether a client is currently configured.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<dyn HashicupsApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(resource_type.to_string())
}

#[async_trait::async_trait]
impl<F: ClientFactory> ProviderService for HashicupsProvider<F> {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config::schema())
            .with_resource(ORDER_RESOURCE, order::schema())
            .with_data_source(ORDER_DATA_SOURCE, data_sources::order::schema())
            .with_data_source(COFFEES_DATA_SOURCE, data_sources::coffees::schema())
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        // No client survives a failed configure.
        *self.client.write().await = None;

        let diagnostics = validation::validate(&config::schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let credentials = ProviderConfig::from_value(config)?.resolve_with(|key| (self.env)(key));
        debug!(?credentials, "Resolved provider credentials");

        match self.factory.connect(&credentials).await {
            Ok(client) => {
                *self.client.write().await = Some(client);
                info!("HashiCups client configured");
                Ok(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "Unable to create HashiCups client");
                Ok(vec![Diagnostic::error("Unable to create HashiCups client")
                    .with_detail("Unable to auth user for authenticated HashiCups client")])
            }
        }
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        *self.client.write().await = None;
        debug!("Released HashiCups client");
        Ok(())
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        match resource_type {
            ORDER_RESOURCE => order::plan(prior_state, proposed_state),
            other => Err(unknown_resource(other)),
        }
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        if resource_type != ORDER_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let client = self.client().await?;
        let mut state = OrderState::from_value(planned_state)?;
        OrderResource::new(client.as_ref()).create(&mut state).await?;
        order::to_host_state(&state)
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        if resource_type != ORDER_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let client = self.client().await?;
        let mut state = OrderState::from_value(current_state)?;
        OrderResource::new(client.as_ref()).read(&mut state).await?;
        order::to_host_state(&state)
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        if resource_type != ORDER_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let client = self.client().await?;
        let prior = OrderState::from_value(prior_state)?;
        let mut state = OrderState::from_value(planned_state)?;
        OrderResource::new(client.as_ref())
            .update(&prior, &mut state)
            .await?;
        order::to_host_state(&state)
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        if resource_type != ORDER_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let client = self.client().await?;
        let mut state = OrderState::from_value(current_state)?;
        OrderResource::new(client.as_ref()).delete(&mut state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        if resource_type != ORDER_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let state = order::import(id)?;
        Ok(vec![ImportedResource::new(ORDER_RESOURCE, state.to_value()?)])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let client = match data_source_type {
            ORDER_DATA_SOURCE | COFFEES_DATA_SOURCE => self.client().await?,
            other => return Err(unknown_resource(other)),
        };
        if data_source_type == COFFEES_DATA_SOURCE {
            data_sources::coffees::read(client.as_ref()).await
        } else {
            data_sources::order::read(client.as_ref(), config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OrderItem;
    use crate::config::{HOST_ENV, PASSWORD_ENV, USERNAME_ENV};
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_no_changes, ApiCall, InMemoryApi,
        ProviderTester, RecordingFactory, TestError,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn tester(api: Arc<InMemoryApi>) -> ProviderTester<HashicupsProvider<RecordingFactory>> {
        ProviderTester::new(
            HashicupsProvider::with_factory(RecordingFactory::new(api)).with_env(env(&[])),
        )
    }

    #[tokio::test]
    async fn test_credentials_fall_back_to_environment() {
        let provider = HashicupsProvider::with_factory(RecordingFactory::new(Arc::new(
            InMemoryApi::new(),
        )))
        .with_env(env(&[
            (HOST_ENV, "http://cups.internal:19090"),
            (USERNAME_ENV, "education"),
            (PASSWORD_ENV, "test123"),
        ]));
        let tester = ProviderTester::new(provider);

        tester.configure(json!({"username": "admin"})).await.unwrap();

        let creds = tester.provider().factory().last_credentials().unwrap();
        assert_eq!(creds.host.as_deref(), Some("http://cups.internal:19090"));
        assert_eq!(creds.username.as_deref(), Some("admin"));
        assert_eq!(creds.password.as_deref(), Some("test123"));
    }

    #[tokio::test]
    async fn test_empty_strings_resolve_to_absent() {
        let provider = HashicupsProvider::with_factory(RecordingFactory::new(Arc::new(
            InMemoryApi::new(),
        )))
        .with_env(env(&[(USERNAME_ENV, "education")]));
        let tester = ProviderTester::new(provider);

        tester
            .configure(json!({"host": "", "username": "", "password": ""}))
            .await
            .unwrap();

        let creds = tester.provider().factory().last_credentials().unwrap();
        assert_eq!(creds.host, None);
        assert_eq!(creds.username, None);
        assert_eq!(creds.password, None);
    }

    #[tokio::test]
    async fn test_configure_failure_is_a_single_diagnostic() {
        let provider = HashicupsProvider::with_factory(
            RecordingFactory::new(Arc::new(InMemoryApi::new())).failing(),
        )
        .with_env(env(&[]));
        let tester = ProviderTester::new(provider);

        let diagnostics = match tester
            .configure(json!({"username": "education", "password": "wrong"}))
            .await
        {
            Err(TestError::Diagnostics(diagnostics)) => diagnostics,
            other => panic!("expected error diagnostics, got {:?}", other),
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Unable to create HashiCups client");
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Unable to auth user for authenticated HashiCups client")
        );
        assert!(!tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_invalid_config_never_reaches_factory() {
        let tester = tester(Arc::new(InMemoryApi::new()));
        let err = tester.configure(json!({"host": 19090})).await.unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
        assert!(tester.provider().factory().credentials().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reconfigure_drops_previous_client() {
        let tester = tester(Arc::new(InMemoryApi::with_menu()));
        tester.configure(json!({})).await.unwrap();
        assert!(tester.provider().is_configured().await);

        let err = tester.configure(json!({"host": 5})).await.unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
        assert!(!tester.provider().is_configured().await);

        let err = tester
            .create(
                ORDER_RESOURCE,
                json!({"items": [{"coffee": {"id": 1}, "quantity": 1}]}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejects_api_calls() {
        let tester = tester(Arc::new(InMemoryApi::with_menu()));
        let err = tester
            .create(
                ORDER_RESOURCE,
                json!({"items": [{"coffee": {"id": 1}, "quantity": 1}]}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let api = Arc::new(InMemoryApi::with_menu());
        let tester = tester(Arc::clone(&api));
        tester.configure(json!({})).await.unwrap();

        let config = json!({"items": [{"coffee": {"id": 3}, "quantity": 2}]});
        let plan = tester.plan_create(ORDER_RESOURCE, config).await.unwrap();
        assert_plan_changes_attribute(&plan, "items");

        let state = tester.create(ORDER_RESOURCE, plan.planned_state).await.unwrap();
        assert_eq!(state["id"], "1");
        assert_eq!(state["items"][0]["coffee"]["name"], "Nomadicano");

        let read = tester.read(ORDER_RESOURCE, state.clone()).await.unwrap();
        assert_eq!(read, state);

        let plan = tester
            .plan_update(ORDER_RESOURCE, state.clone(), state.clone())
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let updated = tester
            .update(ORDER_RESOURCE, state.clone(), state.clone())
            .await
            .unwrap();
        assert_eq!(api.call_count(ApiCall::UpdateOrder), 0);
        assert_eq!(updated["items"], state["items"]);

        let proposed = json!({"id": "1", "items": [{"coffee": {"id": 1}, "quantity": 4}]});
        let plan = tester
            .plan_update(ORDER_RESOURCE, state.clone(), proposed)
            .await
            .unwrap();
        assert_plan_changes_attribute(&plan, "items");
        let updated = tester
            .update(ORDER_RESOURCE, state, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(api.call_count(ApiCall::UpdateOrder), 1);
        assert_eq!(updated["items"][0]["coffee"]["name"], "Packer Spiced Latte");
        assert!(updated["last_updated"].is_string());

        tester.lifecycle_delete(ORDER_RESOURCE, updated).await.unwrap();
        assert!(api.order(1).is_none());
    }

    #[tokio::test]
    async fn test_out_of_band_delete_reads_as_gone() {
        let api = Arc::new(InMemoryApi::with_menu());
        let tester = tester(Arc::clone(&api));
        tester.configure(json!({})).await.unwrap();

        let state = tester
            .create(
                ORDER_RESOURCE,
                json!({"items": [{"coffee": {"id": 2}, "quantity": 1}]}),
            )
            .await
            .unwrap();
        api.remove_order(1);

        let read = tester.read(ORDER_RESOURCE, state).await.unwrap();
        assert!(read.is_null());
    }

    #[tokio::test]
    async fn test_import_then_read() {
        let api = Arc::new(
            InMemoryApi::with_menu().with_order(42, vec![OrderItem::new(3, 2), OrderItem::new(1, 1)]),
        );
        let tester = tester(api);
        tester.configure(json!({})).await.unwrap();

        let imported = tester.import_resource(ORDER_RESOURCE, "42").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["id"], "42");

        let state = tester
            .read(ORDER_RESOURCE, imported[0].state.clone())
            .await
            .unwrap();
        assert_eq!(state["id"], "42");
        assert_eq!(state["items"][0]["coffee"]["id"], 3);
        assert_eq!(state["items"][0]["quantity"], 2);
        assert_eq!(state["items"][1]["coffee"]["name"], "Packer Spiced Latte");
    }

    #[tokio::test]
    async fn test_data_sources() {
        let api = Arc::new(InMemoryApi::with_menu().with_order(1, vec![OrderItem::new(2, 3)]));
        let tester = tester(api);
        tester.configure(json!({})).await.unwrap();

        let order = tester
            .read_data_source(ORDER_DATA_SOURCE, json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(order["items"][0]["coffee_name"], "Vaulatte");
        assert_eq!(order["items"][0]["quantity"], 3);

        let coffees = tester
            .read_data_source(COFFEES_DATA_SOURCE, json!({}))
            .await
            .unwrap();
        assert!(!coffees["coffees"].as_array().unwrap().is_empty());

        let err = tester
            .read_data_source("hashicups_ingredients", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let tester = tester(Arc::new(InMemoryApi::new()));
        tester.configure(json!({})).await.unwrap();
        let err = tester
            .create("hashicups_ingredient", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_stop_releases_client() {
        let tester = tester(Arc::new(InMemoryApi::new()));
        tester.configure(json!({})).await.unwrap();
        assert!(tester.provider().is_configured().await);
        tester.stop().await.unwrap();
        assert!(!tester.provider().is_configured().await);
    }

    #[test]
    fn test_schema_lists_everything() {
        let schema = HashicupsProvider::new().schema();
        assert!(schema.resources.contains_key(ORDER_RESOURCE));
        assert!(schema.data_sources.contains_key(ORDER_DATA_SOURCE));
        assert!(schema.data_sources.contains_key(COFFEES_DATA_SOURCE));
        assert!(schema.provider.block.attributes["password"].flags.sensitive);
    }
}
