//! Error types for the provider.

use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by provider operations.
///
/// The gRPC layer turns these into error diagnostics; only malformed
/// protocol payloads become a [`tonic::Status`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The configuration or state did not have the expected shape.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is not configured, or its configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resource or data source type is not served by this provider.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A JSON payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HashiCups API call failed.
    #[error("{0}")]
    Api(ClientError),

    /// The operation is not supported.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// The error message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Api(err) => err.to_string(),
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => Self::NotFound(what),
            other => Self::Api(other),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            }
            ProviderError::Api(err) => tonic::Status::unavailable(err.to_string()),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("/orders/9".to_string());
        assert_eq!(err.to_string(), "Resource not found: /orders/9");

        let err = ProviderError::Validation("quantity must be positive".to_string());
        assert_eq!(err.to_string(), "Validation error: quantity must be positive");

        let err = ProviderError::UnknownResource("hashicups_ingredient".to_string());
        assert_eq!(err.to_string(), "Unknown resource type: hashicups_ingredient");
    }

    #[test]
    fn test_api_error_is_verbatim() {
        let err: ProviderError = ClientError::Status {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "status: 500, body: boom");
        assert_eq!(err.message(), "status: 500, body: boom");
    }

    #[test]
    fn test_client_not_found_maps_to_not_found() {
        let err: ProviderError = ClientError::NotFound("/orders/9".to_string()).into();
        assert!(matches!(err, ProviderError::NotFound(ref what) if what == "/orders/9"));
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Configuration("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::Unimplemented("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Unimplemented);

        let bad = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let status: tonic::Status = ProviderError::Serialization(bad).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = ProviderError::Configuration("provider is not configured".to_string());
        assert_eq!(err.message(), "provider is not configured");
    }
}
