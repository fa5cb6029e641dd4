use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::access::Requester;
use super::domain::{
    ActorId, Shift, ShiftAssignment, ShiftEvent, ShiftId, ShiftStatus, ShiftUpdate, TenantId,
};
use super::error::VisitError;
use super::repository::{RepositoryError, ShiftRepository};

/// Attempts at the compare-and-set before a moving status is reported as a conflict.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// What an event does to a shift in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply(ShiftStatus),
    /// Re-entrant event: the shift already reflects it.
    Unchanged,
    Rejected,
}

/// The shift state machine. Terminal states accept nothing but their own re-entrant event.
pub fn resolve_transition(current: ShiftStatus, event: ShiftEvent) -> Transition {
    use ShiftEvent as E;
    use ShiftStatus as S;

    match (current, event) {
        (S::Scheduled, E::CheckIn) => Transition::Apply(S::InProgress),
        (S::InProgress, E::CheckIn) => Transition::Unchanged,
        (S::InProgress, E::CheckOut) => Transition::Apply(S::Completed),
        (S::Completed, E::CheckOut) => Transition::Unchanged,
        (S::Scheduled | S::InProgress, E::Cancel) => Transition::Apply(S::Cancelled),
        (S::Cancelled, E::Cancel) => Transition::Unchanged,
        (S::Scheduled, E::Missed) => Transition::Apply(S::Missed),
        (S::Missed, E::Missed) => Transition::Unchanged,
        _ => Transition::Rejected,
    }
}

/// Result of `advance_with_outcome`, telling callers whether this call moved the shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub shift: Shift,
    pub applied: bool,
}

/// Owns every status change a shift goes through.
pub struct ShiftLifecycleManager {
    shifts: Arc<dyn ShiftRepository>,
}

impl ShiftLifecycleManager {
    pub fn new(shifts: Arc<dyn ShiftRepository>) -> Self {
        Self { shifts }
    }

    /// Registers a shift handed over by external scheduling.
    pub fn schedule(
        &self,
        tenant: &TenantId,
        assignment: ShiftAssignment,
    ) -> Result<Shift, VisitError> {
        if assignment.scheduled_end <= assignment.scheduled_start {
            return Err(VisitError::Validation(format!(
                "shift {} must end after it starts",
                assignment.shift_id
            )));
        }

        let shift = Shift::from_assignment(tenant.clone(), assignment);
        let stored = self.shifts.insert(shift).map_err(|err| match err {
            RepositoryError::Conflict => {
                VisitError::StateConflict("shift already scheduled".to_string())
            }
            other => other.into(),
        })?;

        info!(tenant = %tenant, shift = %stored.id, carer = %stored.carer_id, "shift scheduled");
        Ok(stored)
    }

    pub fn get(&self, tenant: &TenantId, shift_id: &ShiftId) -> Result<Shift, VisitError> {
        self.shifts
            .fetch(tenant, shift_id)?
            .ok_or_else(|| VisitError::shift_not_found(shift_id))
    }

    /// Apply `event` to the shift and return its resulting state.
    pub fn advance(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        event: ShiftEvent,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<Shift, VisitError> {
        self.advance_with_outcome(tenant, shift_id, event, actor, at)
            .map(|outcome| outcome.shift)
    }

    pub fn advance_with_outcome(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        event: ShiftEvent,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, VisitError> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let shift = self.get(tenant, shift_id)?;

            let next = match resolve_transition(shift.status, event) {
                Transition::Unchanged => {
                    debug!(shift = %shift_id, %event, status = %shift.status, "re-entrant event ignored");
                    return Ok(AdvanceOutcome {
                        shift,
                        applied: false,
                    });
                }
                Transition::Rejected => {
                    return Err(VisitError::invalid_transition(shift_id, shift.status, event));
                }
                Transition::Apply(next) => next,
            };

            let update = ShiftUpdate {
                status: next,
                actual_start: (event == ShiftEvent::CheckIn).then_some(at),
                actual_end: (event == ShiftEvent::CheckOut).then_some(at),
            };

            match self
                .shifts
                .compare_and_set(tenant, shift_id, shift.status, update)
            {
                Ok(Some(updated)) => {
                    info!(
                        tenant = %tenant,
                        shift = %shift_id,
                        actor = %actor,
                        %event,
                        from = %shift.status,
                        to = %next,
                        "shift transition applied"
                    );
                    return Ok(AdvanceOutcome {
                        shift: updated,
                        applied: true,
                    });
                }
                Ok(None) => {
                    debug!(shift = %shift_id, %event, "status moved during transition, re-reading");
                }
                Err(RepositoryError::NotFound) => return Err(VisitError::shift_not_found(shift_id)),
                Err(err) => return Err(err.into()),
            }
        }

        Err(VisitError::StateConflict(format!(
            "shift {shift_id} kept changing while applying {event}"
        )))
    }

    /// Explicit cancellation by someone who manages the schedule.
    pub fn cancel(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        requester: &Requester,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<Shift, VisitError> {
        requester.ensure_manages_schedule()?;
        self.advance(tenant, shift_id, ShiftEvent::Cancel, actor, at)
    }
}
