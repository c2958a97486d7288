//! Error types for plan validation and convergence.
//!
//! Every error is fatal to the run. Probe and apply failures carry the
//! qualified key of the resource and the underlying cause.

use crate::notify::Action;
use thiserror::Error;

/// Result type alias for declarative operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Two resources share the same `type[id]` key
    #[error("resource {0} is declared twice")]
    DuplicateResource(String),

    /// A notification references a resource that is not in the plan
    #[error("notification from {source_key} targets unknown resource {target}")]
    UnknownTarget { source_key: String, target: String },

    /// A notification is declared on a resource that is not in the plan
    #[error("notification source {0} is not declared")]
    UnknownSource(String),

    /// Current state of a resource could not be determined
    #[error("cannot determine state of {resource}: {source:#}")]
    Probe {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    /// Converging a resource failed
    #[error("failed to apply {resource}: {source:#}")]
    Apply {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    /// A notified action failed
    #[error("{action} on {target} (notified by {notified_by}) failed: {source:#}")]
    Notify {
        target: String,
        action: Action,
        notified_by: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Qualified key of the resource the error is about, if any
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::DuplicateResource(key) | Self::UnknownSource(key) => Some(key),
            Self::UnknownTarget { target, .. } => Some(target),
            Self::Probe { resource, .. } | Self::Apply { resource, .. } => Some(resource),
            Self::Notify { target, .. } => Some(target),
        }
    }
}
