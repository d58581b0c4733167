//! The provider service trait and the gRPC server that hosts it.
//!
//! [`ProviderService`] is what the HashiCups provider implements, in terms of
//! JSON values and [`Diagnostic`]s. The server adapts it to the generated
//! `Provider` gRPC service, prints the handshake line on stdout and runs
//! until SIGTERM/SIGINT.
//!
//! Payload conventions:
//! - states and configs travel as JSON bytes
//! - empty bytes decode to null, and a null state encodes to empty bytes
//! - provider errors become error diagnostics; only malformed payloads fail
//!   the call with a gRPC status

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::proto;
use crate::schema::{
    has_errors, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema,
};
use crate::types::{handshake_line, AttributeChange, ImportedResource, PlanResult};
use crate::validation;

/// A provider as seen by the server.
///
/// Validation hooks default to checking the config against the declared
/// schema.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Schemas of the provider config, resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Check the provider configuration without applying it.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&self.schema().provider, &config))
    }

    /// Apply the provider configuration.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release whatever `configure` set up.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(resource, &config))
    }

    /// Plan a resource change. `proposed_state` is null for a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource from its planned state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. Null means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt an existing remote object by id.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    /// Check a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let data_source = schema
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        Ok(validation::validate(data_source, &config))
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

type GrpcResult<T> = Result<tonic::Response<T>, tonic::Status>;

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct GrpcProvider<P: ProviderService> {
    provider: Arc<P>,
}

fn decode(bytes: &[u8]) -> Result<Value, tonic::Status> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| ProviderError::Serialization(e).into())
}

fn decode_optional(bytes: &[u8]) -> Result<Option<Value>, tonic::Status> {
    if bytes.is_empty() {
        Ok(None)
    } else {
        decode(bytes).map(Some)
    }
}

fn encode(value: &Value) -> Result<Vec<u8>, tonic::Status> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::to_vec(value).map_err(|e| ProviderError::Serialization(e).into())
}

fn changes_to_proto(
    changes: Vec<AttributeChange>,
) -> Result<Vec<proto::AttributeChange>, tonic::Status> {
    changes
        .into_iter()
        .map(|change| {
            proto::AttributeChange::try_from(change)
                .map_err(|e| tonic::Status::from(ProviderError::Serialization(e)))
        })
        .collect()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<proto::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

/// Log the outcome of a diagnostics-only call and convert it.
fn finish_diagnostics(
    op: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                warn!(op, diagnostics = diagnostics.len(), "Completed with errors");
            } else {
                debug!(op, "Completed");
            }
            diagnostics_to_proto(diagnostics)
        }
        Err(e) => {
            error!(op, error = %e, "Failed");
            error_to_diagnostics(e)
        }
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::Block {
    proto::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| proto::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| proto::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => proto::nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => proto::nested_block::NestingMode::List as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for GrpcProvider<P> {
    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<proto::GetSchemaRequest>,
    ) -> GrpcResult<proto::GetSchemaResponse> {
        let schema = self.provider.schema();
        info!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::ValidateProviderConfigRequest>,
    ) -> GrpcResult<proto::ValidateProviderConfigResponse> {
        let config = decode(&request.into_inner().config)?;
        let result = self.provider.validate_provider_config(config).await;
        Ok(tonic::Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: finish_diagnostics("ValidateProviderConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<proto::ConfigureRequest>,
    ) -> GrpcResult<proto::ConfigureResponse> {
        let config = decode(&request.into_inner().config)?;
        let result = self.provider.configure(config).await;
        Ok(tonic::Response::new(proto::ConfigureResponse {
            diagnostics: finish_diagnostics("Configure", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<proto::StopRequest>,
    ) -> GrpcResult<proto::StopResponse> {
        let error = match self.provider.stop().await {
            Ok(()) => {
                info!("Provider stopped");
                String::new()
            }
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            }
        };
        Ok(tonic::Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type = tracing::field::Empty))]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::ValidateResourceConfigRequest>,
    ) -> GrpcResult<proto::ValidateResourceConfigResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let config = decode(&req.config)?;
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, config)
            .await;
        Ok(tonic::Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: finish_diagnostics("ValidateResourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type = tracing::field::Empty))]
    async fn plan(
        &self,
        request: tonic::Request<proto::PlanRequest>,
    ) -> GrpcResult<proto::PlanResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior_state = decode_optional(&req.prior_state)?;
        let proposed_state = decode(&req.proposed_state)?;
        let config = decode(&req.config)?;
        debug!(is_create = prior_state.is_none(), "Plan called");

        let response = match self
            .provider
            .plan(&req.resource_type, prior_state, proposed_state, config)
            .await
        {
            Ok(result) => {
                info!(
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                proto::PlanResponse {
                    planned_state: encode(&result.planned_state)?,
                    changes: changes_to_proto(result.changes)?,
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(error = %e, "Plan failed");
                proto::PlanResponse {
                    diagnostics: error_to_diagnostics(e),
                    ..Default::default()
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type = tracing::field::Empty))]
    async fn create(
        &self,
        request: tonic::Request<proto::CreateRequest>,
    ) -> GrpcResult<proto::CreateResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let planned_state = decode(&req.planned_state)?;

        let response = match self.provider.create(&req.resource_type, planned_state).await {
            Ok(state) => {
                info!("Create completed");
                proto::CreateResponse {
                    state: encode(&state)?,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(error = %e, "Create failed");
                proto::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type = tracing::field::Empty))]
    async fn read(&self, request: tonic::Request<proto::ReadRequest>) -> GrpcResult<proto::ReadResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let current_state = decode(&req.current_state)?;

        let response = match self.provider.read(&req.resource_type, current_state).await {
            Ok(state) => {
                debug!(gone = state.is_null(), "Read completed");
                proto::ReadResponse {
                    state: encode(&state)?,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(error = %e, "Read failed");
                proto::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type = tracing::field::Empty))]
    async fn update(
        &self,
        request: tonic::Request<proto::UpdateRequest>,
    ) -> GrpcResult<proto::UpdateResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior_state = decode(&req.prior_state)?;
        let planned_state = decode(&req.planned_state)?;

        let response = match self
            .provider
            .update(&req.resource_type, prior_state, planned_state)
            .await
        {
            Ok(state) => {
                info!("Update completed");
                proto::UpdateResponse {
                    state: encode(&state)?,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(error = %e, "Update failed");
                proto::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type = tracing::field::Empty))]
    async fn delete(
        &self,
        request: tonic::Request<proto::DeleteRequest>,
    ) -> GrpcResult<proto::DeleteResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let current_state = decode(&req.current_state)?;

        let result = self
            .provider
            .delete(&req.resource_type, current_state)
            .await
            .map(|()| Vec::new());
        Ok(tonic::Response::new(proto::DeleteResponse {
            diagnostics: finish_diagnostics("Delete", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type = tracing::field::Empty))]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::ImportResourceStateRequest>,
    ) -> GrpcResult<proto::ImportResourceStateResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let response = match self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await
        {
            Ok(imported) => {
                info!(id = %req.id, count = imported.len(), "Import completed");
                proto::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| -> Result<_, tonic::Status> {
                            Ok(proto::ImportedResource {
                                state: encode(&r.state)?,
                                resource_type: r.resource_type,
                            })
                        })
                        .collect::<Result<_, tonic::Status>>()?,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(id = %req.id, error = %e, "Import failed");
                proto::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type = tracing::field::Empty))]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<proto::ValidateDataSourceConfigRequest>,
    ) -> GrpcResult<proto::ValidateDataSourceConfigResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let config = decode(&req.config)?;
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, config)
            .await;
        Ok(tonic::Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: finish_diagnostics("ValidateDataSourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type = tracing::field::Empty))]
    async fn read_data_source(
        &self,
        request: tonic::Request<proto::ReadDataSourceRequest>,
    ) -> GrpcResult<proto::ReadDataSourceResponse> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let config = decode(&req.config)?;

        let response = match self
            .provider
            .read_data_source(&req.data_source_type, config)
            .await
        {
            Ok(state) => {
                info!("ReadDataSource completed");
                proto::ReadDataSourceResponse {
                    state: encode(&state)?,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(error = %e, "ReadDataSource failed");
                proto::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }
}

/// Options for the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may take to drain after a shutdown
    /// signal. Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve on SIGTERM or SIGINT (CTRL+C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Unable to install signal handlers, falling back to CTRL+C");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "Unable to listen for CTRL+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints `PROVIDER_PLUGIN|<version>|<address>` on stdout once the listener
/// is bound, then serves until SIGTERM/SIGINT.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_with_shutdown(provider, listener, wait_for_shutdown_signal(), options).await
}

/// Serve a provider on a fixed address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(
        provider,
        listener,
        wait_for_shutdown_signal(),
        ServeOptions::default(),
    )
    .await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// After `shutdown` resolves, in-flight requests get
/// [`ServeOptions::shutdown_timeout`] to finish, then the provider's
/// [`stop`](ProviderService::stop) is called.
pub async fn serve_with_shutdown<P, S>(
    provider: P,
    listener: TcpListener,
    shutdown: S,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    S: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let grpc = GrpcProvider {
        provider: Arc::clone(&provider),
    };

    let drain = Arc::new(Notify::new());
    let drain_signal = Arc::clone(&drain);
    let server = Server::builder()
        .add_service(proto::provider_server::ProviderServer::new(grpc))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move { drain_signal.notified().await },
        );
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                error!(error = %e, "Server stopped unexpectedly");
                return Err(e.into());
            }
        }
        _ = shutdown => {
            drain.notify_one();
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(Ok(())) => info!("Server shutdown complete"),
                Ok(Err(e)) => {
                    error!(error = %e, "Server error during shutdown");
                    return Err(e.into());
                }
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "Shutdown timeout exceeded, forcing shutdown"
                ),
            }
        }
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop returned an error");
    }
    info!("Provider shutdown complete");
    Ok(())
}
