//! Error taxonomy for the governance core.
//!
//! Parsing and lookup failures are local and typed; provider-level failures
//! are surfaced unchanged so callers can apply their own retry policy.

use crate::registry::capability::CapabilityKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A resource id string that does not follow the ARM hierarchy.
    #[error("malformed resource id '{id}': {reason}")]
    MalformedIdentifier { id: String, reason: &'static str },

    /// Transport or auth failure talking to the management endpoint.
    /// Not retried at this layer.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The provider answered, but the payload is not what a list/get
    /// operation is expected to return.
    #[error("malformed provider response: {0}")]
    Enumeration(String),

    /// The provider reports the resource as absent.
    #[error("resource not found: {id}")]
    ResourceNotFound { id: String },

    /// Invocation settings an action or filter cannot work with.
    #[error("invalid capability parameters: {0}")]
    InvalidParams(String),

    /// A resource type key with no descriptor in the catalog.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),

    /// A child type whose parent manager cannot be resolved.
    #[error("no parent manager resolvable for '{0}'")]
    UnknownParentType(String),

    #[error("no {kind} named '{name}' registered for '{class}'")]
    UnknownCapability {
        class: String,
        kind: CapabilityKind,
        name: String,
    },

    /// Two registrations disagree about an implementation. Fatal at
    /// startup: the capability universe is inconsistent.
    #[error("conflicting {kind} registration '{name}' for '{class}'")]
    CapabilityConflict {
        class: String,
        kind: CapabilityKind,
        name: String,
    },
}

impl Error {
    pub fn provider(message: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            message: message.into(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ProviderUnavailable {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
