//! Plan, import and handshake types shared by the provider and the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute path.
    pub path: String,
    /// Value before the change; `None` when the attribute is new.
    pub before: Option<Value>,
    /// Value after the change; `None` when the attribute goes away.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// An attribute that appears.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// An attribute that disappears.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

impl TryFrom<AttributeChange> for crate::proto::AttributeChange {
    type Error = serde_json::Error;

    fn try_from(change: AttributeChange) -> Result<Self, Self::Error> {
        let encode = |v: Option<Value>| -> Result<Vec<u8>, serde_json::Error> {
            v.map(|v| serde_json::to_vec(&v))
                .transpose()
                .map(Option::unwrap_or_default)
        };
        Ok(Self {
            path: change.path,
            before: encode(change.before)?,
            after: encode(change.after)?,
        })
    }
}

/// The result of planning a resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource is expected to have afterwards.
    pub planned_state: Value,
    /// What changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and recreated.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to do.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// An in-place change.
    pub fn with_changes(planned_state: Value, changes: Vec<AttributeChange>) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: false,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name.
    pub resource_type: String,
    /// Imported state; a later read fills in the rest.
    pub state: Value,
}

impl ImportedResource {
    /// Create an imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Prefix of the handshake line written to stdout.
pub const HANDSHAKE_PREFIX: &str = "PROVIDER_PLUGIN";

/// The handshake line for a server listening on `addr`.
pub fn handshake_line(addr: std::net::SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}
