//! Test support: a harness for driving a [`ProviderService`] without gRPC,
//! an in-memory HashiCups API and a client factory that records what it was
//! asked to connect with.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hashicups_provider::testing::{InMemoryApi, ProviderTester, RecordingFactory};
//! use hashicups_provider::HashicupsProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(InMemoryApi::with_menu());
//! let provider = HashicupsProvider::with_factory(RecordingFactory::new(api))
//!     .with_env(|_: &str| None);
//! let tester = ProviderTester::new(provider);
//! tester.configure(json!({})).await.unwrap();
//!
//! let state = tester
//!     .lifecycle_create(
//!         "hashicups_order",
//!         json!({"items": [{"coffee": {"id": 3}, "quantity": 2}]}),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(state["items"][0]["coffee"]["name"], "Nomadicano");
//! # });
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::client::{ClientError, ClientFactory, Coffee, HashicupsApi, Order, OrderItem};
use crate::config::Credentials;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a [`ProviderService`] directly.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Names of the resource types the provider serves.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.schema().resources.into_keys().collect()
    }

    /// Names of the data source types the provider serves.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.schema().data_sources.into_keys().collect()
    }

    /// Validate the provider configuration; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create. The proposed state doubles as the config.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan an in-place change.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration; error diagnostics become `Err`.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// plan, create, read. Returns the state after the read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// plan, update, read. Returns the state after the read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// plan, delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// create, update, delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }
}

/// A harness call that failed with error diagnostics or a provider error.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// A provider error.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn change_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {:?}",
        change_paths(plan)
    );
}

/// Assert that a plan changes something.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got none"
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if no change has that path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change '{}', changed: {:?}",
        path,
        change_paths(plan)
    );
}

/// Assert that there are no error diagnostics.
///
/// # Panics
///
/// Panics if any diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "Expected no errors, got {:?}", errors);
}

/// Assert that there is at least one error diagnostic.
///
/// # Panics
///
/// Panics if no diagnostic is an error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let summaries: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        summaries.iter().any(|s| s.contains(substring)),
        "Expected an error containing '{}', errors: {:?}",
        substring,
        summaries
    );
}

/// A [`HashicupsApi`] operation, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    /// `get_order`
    GetOrder,
    /// `create_order`
    CreateOrder,
    /// `update_order`
    UpdateOrder,
    /// `delete_order`
    DeleteOrder,
    /// `list_coffees`
    ListCoffees,
}

/// An in-memory HashiCups API.
///
/// Orders get sequential ids starting at 1. Items are stored with the full
/// coffee record from the menu; ordering an unknown coffee fails with a 400.
/// Operations marked with [`fail`](Self::fail) return a 500 until
/// [`recover`](Self::recover)ed.
#[derive(Debug, Default)]
pub struct InMemoryApi {
    state: Mutex<ApiState>,
}

#[derive(Debug, Default)]
struct ApiState {
    menu: Vec<Coffee>,
    orders: BTreeMap<i64, Vec<OrderItem>>,
    last_order_id: i64,
    calls: Vec<ApiCall>,
    failing: HashSet<ApiCall>,
}

impl ApiState {
    fn coffee(&self, id: i64) -> Option<&Coffee> {
        self.menu.iter().find(|c| c.id == id)
    }

    fn resolve(&self, items: &[OrderItem]) -> Result<Vec<OrderItem>, ClientError> {
        items
            .iter()
            .map(|item| {
                let coffee = self.coffee(item.coffee.id).ok_or_else(|| ClientError::Status {
                    status: 400,
                    body: format!("unknown coffee id {}", item.coffee.id),
                })?;
                Ok(OrderItem {
                    coffee: coffee.clone(),
                    quantity: item.quantity,
                })
            })
            .collect()
    }
}

fn menu_item(id: i64, name: &str, teaser: &str, price: i64, image: &str) -> Coffee {
    Coffee {
        id,
        name: name.to_string(),
        teaser: teaser.to_string(),
        description: String::new(),
        price,
        image: image.to_string(),
    }
}

fn parse_order_id(order_id: &str) -> Result<i64, ClientError> {
    order_id.parse().map_err(|_| ClientError::Status {
        status: 400,
        body: format!("invalid order id {:?}", order_id),
    })
}

impl InMemoryApi {
    /// An API with an empty menu and no orders.
    pub fn new() -> Self {
        Self::default()
    }

    /// An API serving the standard HashiCups menu.
    pub fn with_menu() -> Self {
        [
            menu_item(1, "Packer Spiced Latte", "Packed with goodness to spice up your images", 350, "/packer.png"),
            menu_item(2, "Vaulatte", "Nothing gives you a safe and secure feeling like a Vaulatte", 200, "/vault.png"),
            menu_item(3, "Nomadicano", "Drink one today and you will want to schedule another", 150, "/nomad.png"),
            menu_item(4, "Terraspresso", "Nothing kickstarts your day like a provision of Terraspresso", 150, "/terraform.png"),
            menu_item(5, "Vagrante espresso", "Stdin is not a tty", 200, "/vagrant.png"),
            menu_item(6, "Connectaccino", "Discover the wonders of our meshy service", 250, "/consul.png"),
        ]
        .into_iter()
        .fold(Self::new(), Self::with_coffee)
    }

    /// Add a coffee to the menu.
    pub fn with_coffee(self, coffee: Coffee) -> Self {
        self.lock().menu.push(coffee);
        self
    }

    /// Seed an order. Items naming a coffee on the menu get its full record.
    pub fn with_order(self, id: i64, items: Vec<OrderItem>) -> Self {
        {
            let mut state = self.lock();
            let items = items
                .into_iter()
                .map(|item| match state.coffee(item.coffee.id) {
                    Some(coffee) => OrderItem {
                        coffee: coffee.clone(),
                        quantity: item.quantity,
                    },
                    None => item,
                })
                .collect();
            state.orders.insert(id, items);
            state.last_order_id = state.last_order_id.max(id);
        }
        self
    }

    /// Make every later call of `call` fail with a 500.
    pub fn fail(&self, call: ApiCall) {
        self.lock().failing.insert(call);
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, call: ApiCall) {
        self.lock().failing.remove(&call);
    }

    /// Delete an order behind the provider's back.
    pub fn remove_order(&self, id: i64) {
        self.lock().orders.remove(&id);
    }

    /// The stored items of an order.
    pub fn order(&self, id: i64) -> Option<Vec<OrderItem>> {
        self.lock().orders.get(&id).cloned()
    }

    /// The menu.
    pub fn menu(&self) -> Vec<Coffee> {
        self.lock().menu.clone()
    }

    /// Every call made so far, in order, failed ones included.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// How many times `call` was made.
    pub fn call_count(&self, call: ApiCall) -> usize {
        self.lock().calls.iter().filter(|&&c| c == call).count()
    }

    fn lock(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, call: ApiCall) -> Result<MutexGuard<'_, ApiState>, ClientError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failing.contains(&call) {
            return Err(ClientError::Status {
                status: 500,
                body: format!("injected {:?} failure", call),
            });
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl HashicupsApi for InMemoryApi {
    async fn get_order(&self, order_id: &str) -> Result<Order, ClientError> {
        let state = self.enter(ApiCall::GetOrder)?;
        let id = parse_order_id(order_id)?;
        state
            .orders
            .get(&id)
            .map(|items| Order {
                id,
                items: Some(items.clone()),
            })
            .ok_or_else(|| ClientError::NotFound(format!("/orders/{}", order_id)))
    }

    async fn create_order(&self, items: &[OrderItem]) -> Result<Order, ClientError> {
        let mut state = self.enter(ApiCall::CreateOrder)?;
        let items = state.resolve(items)?;
        state.last_order_id += 1;
        let id = state.last_order_id;
        state.orders.insert(id, items.clone());
        Ok(Order {
            id,
            items: Some(items),
        })
    }

    async fn update_order(&self, order_id: &str, items: &[OrderItem]) -> Result<Order, ClientError> {
        let mut state = self.enter(ApiCall::UpdateOrder)?;
        let id = parse_order_id(order_id)?;
        if !state.orders.contains_key(&id) {
            return Err(ClientError::NotFound(format!("/orders/{}", order_id)));
        }
        let items = state.resolve(items)?;
        state.orders.insert(id, items.clone());
        Ok(Order {
            id,
            items: Some(items),
        })
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), ClientError> {
        let mut state = self.enter(ApiCall::DeleteOrder)?;
        let id = parse_order_id(order_id)?;
        match state.orders.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound(format!("/orders/{}", order_id))),
        }
    }

    async fn list_coffees(&self) -> Result<Vec<Coffee>, ClientError> {
        let state = self.enter(ApiCall::ListCoffees)?;
        Ok(state.menu.clone())
    }
}

/// A [`ClientFactory`] that hands out a shared [`InMemoryApi`] and records
/// the credentials of every `connect`.
pub struct RecordingFactory {
    api: Arc<InMemoryApi>,
    seen: Mutex<Vec<Credentials>>,
    fail: bool,
}

impl RecordingFactory {
    /// Hand out `api` on every connect.
    pub fn new(api: Arc<InMemoryApi>) -> Self {
        Self {
            api,
            seen: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Reject every connect with a 401, as a failed sign-in would.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// The API handed out.
    pub fn api(&self) -> &Arc<InMemoryApi> {
        &self.api
    }

    /// Credentials of every connect so far.
    pub fn credentials(&self) -> Vec<Credentials> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Credentials of the latest connect.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.credentials().pop()
    }
}

#[async_trait::async_trait]
impl ClientFactory for RecordingFactory {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn HashicupsApi>, ClientError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(credentials.clone());
        if self.fail {
            return Err(ClientError::Status {
                status: 401,
                body: "Unauthorized".to_string(),
            });
        }
        let api: Arc<dyn HashicupsApi> = self.api.clone();
        Ok(api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashicupsProvider;
    use crate::types::AttributeChange;
    use serde_json::json;

    fn tester(api: Arc<InMemoryApi>) -> ProviderTester<HashicupsProvider<RecordingFactory>> {
        ProviderTester::new(
            HashicupsProvider::with_factory(RecordingFactory::new(api)).with_env(|_: &str| None),
        )
    }

    #[tokio::test]
    async fn test_tester_configure_and_types() {
        let tester = tester(Arc::new(InMemoryApi::new()));
        tester.configure(json!({})).await.unwrap();
        assert_eq!(tester.resource_types(), vec!["hashicups_order".to_string()]);
        assert_eq!(
            tester.data_source_types(),
            vec!["hashicups_coffees".to_string(), "hashicups_order".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let api = Arc::new(InMemoryApi::with_menu());
        let tester = tester(Arc::clone(&api));
        tester.configure(json!({})).await.unwrap();

        let updated = tester
            .lifecycle_crud(
                "hashicups_order",
                json!({"items": [{"coffee": {"id": 3}, "quantity": 2}]}),
                json!({"items": [{"coffee": {"id": 4}, "quantity": 1}]}),
            )
            .await
            .unwrap();

        assert_eq!(updated["id"], "1");
        assert_eq!(updated["items"][0]["coffee"]["name"], "Terraspresso");
        assert_eq!(api.call_count(ApiCall::CreateOrder), 1);
        assert_eq!(api.call_count(ApiCall::UpdateOrder), 1);
        assert_eq!(api.call_count(ApiCall::DeleteOrder), 1);
        assert!(api.order(1).is_none());
    }

    #[tokio::test]
    async fn test_tester_validation_errors() {
        let tester = tester(Arc::new(InMemoryApi::new()));
        let err = tester
            .validate_resource_config("hashicups_order", json!({"items": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(ref d) if d.len() == 1));

        tester
            .validate_data_source_config("hashicups_order", json!({"id": 1}))
            .await
            .unwrap();
        assert!(tester
            .validate_data_source_config("hashicups_order", json!({}))
            .await
            .is_err());
        assert!(tester
            .validate_provider_config(json!({"username": false}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_in_memory_ids_are_sequential() {
        let api = InMemoryApi::with_menu();
        let first = api.create_order(&[OrderItem::new(1, 1)]).await.unwrap();
        let second = api.create_order(&[OrderItem::new(2, 1)]).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let seeded = InMemoryApi::with_menu().with_order(10, vec![OrderItem::new(1, 1)]);
        let next = seeded.create_order(&[OrderItem::new(1, 1)]).await.unwrap();
        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn test_in_memory_rejects_unknown_coffee() {
        let api = InMemoryApi::with_menu();
        let err = api.create_order(&[OrderItem::new(99, 1)]).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_in_memory_failure_injection() {
        let api = InMemoryApi::with_menu();
        api.fail(ApiCall::ListCoffees);
        assert!(api.list_coffees().await.is_err());
        api.recover(ApiCall::ListCoffees);
        assert_eq!(api.list_coffees().await.unwrap().len(), 6);
        assert_eq!(api.calls(), vec![ApiCall::ListCoffees, ApiCall::ListCoffees]);
    }

    #[tokio::test]
    async fn test_in_memory_not_found() {
        let api = InMemoryApi::new();
        assert!(api.get_order("3").await.unwrap_err().is_not_found());
        assert!(api.delete_order("3").await.unwrap_err().is_not_found());
        assert!(api
            .update_order("3", &[])
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_recording_factory() {
        let factory = RecordingFactory::new(Arc::new(InMemoryApi::new()));
        let creds = Credentials {
            host: Some("http://localhost:19090".to_string()),
            ..Default::default()
        };
        assert!(factory.connect(&creds).await.is_ok());
        assert_eq!(factory.last_credentials(), Some(creds.clone()));

        let factory = factory.failing();
        assert!(factory.connect(&creds).await.is_err());
        assert_eq!(factory.credentials().len(), 2);
    }

    #[test]
    fn test_assertion_helpers() {
        assert_no_errors(&[Diagnostic::warning("heads up")]);
        let diagnostics = vec![Diagnostic::error("Missing required attribute 'items'")];
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "items");

        let plan = PlanResult::with_changes(
            json!({}),
            vec![AttributeChange::modified("items", json!([]), json!([{}]))],
        );
        assert_plan_has_changes(&plan);
        assert_plan_changes_attribute(&plan, "items");
        assert_plan_no_changes(&PlanResult::no_change(json!({})));
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Invalid type")
            .with_detail("Expected int64, got string")
            .with_attribute("items.0.quantity")]);
        let text = err.to_string();
        assert!(text.contains("1 error diagnostic(s)"));
        assert!(text.contains("Invalid type: Expected int64, got string (at items.0.quantity)"));

        let err = TestError::from(ProviderError::NotFound("/orders/1".to_string()));
        assert_eq!(err.to_string(), "Provider error: Resource not found: /orders/1");
    }
}
