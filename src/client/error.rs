//! Error type for the HashiCups API client.

use thiserror::Error;

/// Errors returned by [`HashicupsApi`](super::HashicupsApi) implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("status: {status}, body: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The requested order or coffee does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API answered 200 with a body the client did not expect.
    #[error("unexpected response: {0}")]
    Unexpected(String),

    /// The response body was not the expected JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the error means the remote object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ClientError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "status: 500, body: boom");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found() {
        let err = ClientError::NotFound("order 9".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: order 9");
    }
}
