//! HashiCups provider
//!
//! An infrastructure provider plugin for the HashiCups coffee-shop API. A
//! host process launches the plugin, reads the handshake line from its
//! stdout and drives it over gRPC:
//!
//! - **`hashicups_order`** resource: a coffee order, with create, read,
//!   update, delete, import and plan
//! - **`hashicups_order`** data source: one order looked up by id
//! - **`hashicups_coffees`** data source: the full menu
//!
//! # Layout
//!
//! - [`config`]: the provider block and credential resolution
//! - [`client`]: the HashiCups HTTP client behind the [`client::HashicupsApi`]
//!   trait
//! - [`mapping`]: typed states and conversion to and from API types
//! - [`resources`], [`data_sources`]: per-type handlers
//! - [`provider`]: [`HashicupsProvider`], dispatching host calls to handlers
//! - [`server`]: the [`ProviderService`] trait and the gRPC server
//! - [`testing`]: a harness, an in-memory API and a recording client factory
//!
//! # Handshake
//!
//! ```text
//! PROVIDER_PLUGIN|1|127.0.0.1:50051
//! ```
//!
//! Format: `PROVIDER_PLUGIN|<protocol_version>|<address>`. Logs go to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

/// Generated gRPC types for the plugin protocol.
#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod proto {
    tonic::include_proto!("hashicups.provider.v1");
}

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::HashicupsProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_with_options, serve_with_shutdown, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
