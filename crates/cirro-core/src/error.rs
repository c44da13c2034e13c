// ── Core error types ──
//
// Consumer-facing errors from cirro-core. Transport failures are wrapped,
// never swallowed: an operation's caller always sees the rejection, while
// the store only ever sees explicit failure actions.

use thiserror::Error;

use crate::model::ResourceId;
use crate::resource::{ConfigError, Operation};

/// Unified error type for the operations layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed resource configuration or addressing. Not recoverable;
    /// surfaces programming errors, not runtime conditions.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The resource's config does not declare this operation.
    #[error("operation {operation} not supported by resource '{resource}'")]
    Unsupported {
        operation: Operation,
        resource: String,
    },

    /// No slice with this root name is mounted in the store.
    #[error("unknown resource '{0}' (not mounted in this store)")]
    UnknownResource(String),

    /// An entity the operation needed was absent from local state.
    #[error("entity {id} not found in local state for '{resource}'")]
    NotFound { resource: String, id: ResourceId },

    /// A poll-until operation exhausted its attempt budget before the
    /// predicate accepted the entity.
    #[error("gave up polling '{resource}' {id} after {attempts} attempts")]
    PollBudgetExhausted {
        resource: String,
        id: ResourceId,
        attempts: u32,
    },

    /// A rejected HTTP call, propagated to the operation's caller.
    #[error(transparent)]
    Api(#[from] cirro_api::Error),
}

impl CoreError {
    /// Returns `true` if the underlying cause was an API "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api(e) => e.is_not_found(),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if retrying the operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_transient())
    }
}
