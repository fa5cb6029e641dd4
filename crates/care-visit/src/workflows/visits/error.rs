use super::domain::{ShiftEvent, ShiftId, ShiftStatus};
use super::repository::RepositoryError;

/// Error kinds surfaced by every visit workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl VisitError {
    pub(crate) fn shift_not_found(id: &ShiftId) -> Self {
        Self::NotFound {
            entity: "shift",
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_transition(id: &ShiftId, status: ShiftStatus, event: ShiftEvent) -> Self {
        Self::StateConflict(format!("shift {id} cannot accept {event} while {status}"))
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict(_))
    }
}
