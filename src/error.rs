//! Store error taxonomy

use crate::models::EntityKind;

/// Errors surfaced by store commands.
///
/// `Validation`, `NotFound` and `ReferentialIntegrity` are raised before any
/// state change. `Persistence` is raised after the optimistic change was
/// applied, once the backend call failed. `Superseded` is raised when the
/// backend confirmed a change to an entity that a later command had already
/// removed locally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{kind} entry {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Failed to persist {kind}: {message}")]
    Persistence { kind: EntityKind, message: String },

    #[error("Link endpoint {note_id} is not a known note")]
    ReferentialIntegrity { note_id: String },

    #[error("{kind} entry {id} was removed before the backend confirmed it")]
    Superseded { kind: EntityKind, id: String },
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wrap a backend failure for the given kind
    pub fn persistence(kind: EntityKind, error: &anyhow::Error) -> Self {
        Self::Persistence {
            kind,
            message: format!("{:#}", error),
        }
    }

    /// True for errors raised before any state change
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Persistence { .. } | Self::Superseded { .. })
    }
}
