//! Provider configuration and credential resolution.
//!
//! The host sends the provider block as JSON. Each field falls back to an
//! environment variable when it is not set; an explicit empty string counts as
//! "not provided" and resolves to `None`, because the client treats any
//! present credential as a request to authenticate.

use std::fmt;

use serde::Deserialize;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment variable consulted when `host` is unset.
pub const HOST_ENV: &str = "HASHICUPS_HOST";
/// Environment variable consulted when `username` is unset.
pub const USERNAME_ENV: &str = "HASHICUPS_USERNAME";
/// Environment variable consulted when `password` is unset.
pub const PASSWORD_ENV: &str = "HASHICUPS_PASSWORD";

/// Schema of the provider configuration block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "host",
            Attribute::optional_string()
                .with_description("HashiCups API URL. Falls back to HASHICUPS_HOST."),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_description("HashiCups username. Falls back to HASHICUPS_USERNAME."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("HashiCups password. Falls back to HASHICUPS_PASSWORD."),
        )
}

/// The provider configuration block as written by the user.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API base URL.
    #[serde(default)]
    pub host: Option<String>,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
}

impl ProviderConfig {
    /// Parse the JSON configuration sent by the host.
    ///
    /// A null configuration is the same as an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider block: {}", e)))
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Credentials {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using the given environment lookup.
    pub fn resolve_with<F>(self, env: F) -> Credentials
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, key: &str| {
            explicit.or_else(|| env(key)).filter(|v| !v.is_empty())
        };

        Credentials {
            host: pick(self.host, HOST_ENV),
            username: pick(self.username, USERNAME_ENV),
            password: pick(self.password, PASSWORD_ENV),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Resolved credentials handed to the client factory.
///
/// `None` is the absent marker.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// API base URL.
    pub host: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_fallback_when_unset() {
        let config = ProviderConfig::from_value(json!({})).unwrap();
        let creds = config.resolve_with(env(&[
            (USERNAME_ENV, "education"),
            (PASSWORD_ENV, "test123"),
        ]));

        assert_eq!(creds.username.as_deref(), Some("education"));
        assert_eq!(creds.password.as_deref(), Some("test123"));
        assert_eq!(creds.host, None);
    }

    #[test]
    fn test_explicit_value_wins_over_env() {
        let config = ProviderConfig::from_value(json!({"username": "alice"})).unwrap();
        let creds = config.resolve_with(env(&[(USERNAME_ENV, "education")]));
        assert_eq!(creds.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_empty_string_is_absent() {
        let config =
            ProviderConfig::from_value(json!({"username": "", "password": ""})).unwrap();
        let creds = config.resolve_with(env(&[
            (USERNAME_ENV, "education"),
            (PASSWORD_ENV, "test123"),
        ]));
        assert_eq!(creds.username, None);
        assert_eq!(creds.password, None);
    }

    #[test]
    fn test_empty_env_is_absent() {
        let creds = ProviderConfig::default().resolve_with(env(&[(PASSWORD_ENV, "")]));
        assert_eq!(creds.password, None);
    }

    #[test]
    fn test_null_config_is_empty() {
        let config = ProviderConfig::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_wrong_type_is_configuration_error() {
        let err = ProviderConfig::from_value(json!({"username": 5})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            host: None,
            username: Some("education".to_string()),
            password: Some("test123".to_string()),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("education"));
        assert!(!debug.contains("test123"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_schema_marks_password_sensitive() {
        let schema = schema();
        let password = &schema.block.attributes["password"];
        assert!(password.flags.sensitive);
        assert!(password.flags.optional);
    }
}
