//! Result of a mutation that reached the optimistic stage

use crate::error::StoreError;

/// What happened to an accepted command.
///
/// Commands rejected by validation return `Err` instead and leave the store
/// untouched. Everything else produces an `Outcome`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The backend confirmed the change
    Confirmed(T),
    /// The backend failed; the optimistic local state was kept and the
    /// error was recorded against the entity kind
    Kept { value: T, error: StoreError },
    /// The backend failed and the store was reloaded from it
    Reconciled { error: StoreError },
    /// The backend confirmed, but a later command had already removed the
    /// entity locally. The confirmed `value` was not applied to the store.
    Superseded { value: T, error: StoreError },
}

impl<T> Outcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Confirmed(_) => None,
            Self::Kept { error, .. }
            | Self::Reconciled { error }
            | Self::Superseded { error, .. } => Some(error),
        }
    }

    /// The confirmed, kept or superseded value
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Confirmed(value) | Self::Kept { value, .. } | Self::Superseded { value, .. } => {
                Some(value)
            }
            Self::Reconciled { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Confirmed(value) => Outcome::Confirmed(f(value)),
            Self::Kept { value, error } => Outcome::Kept {
                value: f(value),
                error,
            },
            Self::Reconciled { error } => Outcome::Reconciled { error },
            Self::Superseded { value, error } => Outcome::Superseded {
                value: f(value),
                error,
            },
        }
    }

    /// Treat anything but a confirmation as an error
    pub fn into_result(self) -> Result<T, StoreError> {
        match self {
            Self::Confirmed(value) => Ok(value),
            Self::Kept { error, .. }
            | Self::Reconciled { error }
            | Self::Superseded { error, .. } => Err(error),
        }
    }
}
