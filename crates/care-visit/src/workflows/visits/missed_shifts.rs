use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{ActorId, ShiftEvent, ShiftId, TenantId};
use super::error::VisitError;
use super::lifecycle::ShiftLifecycleManager;
use super::repository::{AttendanceRepository, ShiftRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub shift_id: ShiftId,
    pub reason: String,
}

/// Outcome of one sweep run. Shifts land in exactly one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub tenant_id: TenantId,
    pub as_of: DateTime<Utc>,
    pub transitioned: Vec<ShiftId>,
    pub already_handled: Vec<ShiftId>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(tenant_id: TenantId, as_of: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            as_of,
            transitioned: Vec::new(),
            already_handled: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Marks overdue SCHEDULED shifts without attendance as MISSED.
pub struct MissedShiftSweep {
    shifts: Arc<dyn ShiftRepository>,
    attendance: Arc<dyn AttendanceRepository>,
    lifecycle: Arc<ShiftLifecycleManager>,
}

impl MissedShiftSweep {
    pub fn new(
        shifts: Arc<dyn ShiftRepository>,
        attendance: Arc<dyn AttendanceRepository>,
        lifecycle: Arc<ShiftLifecycleManager>,
    ) -> Self {
        Self {
            shifts,
            attendance,
            lifecycle,
        }
    }

    /// Only a failing selection query aborts the run; per-shift failures are reported.
    pub fn sweep_missed_shifts(
        &self,
        tenant: &TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<SweepReport, VisitError> {
        let candidates = self.shifts.scheduled_ending_before(tenant, as_of)?;
        let mut report = SweepReport::new(tenant.clone(), as_of);
        let actor = ActorId::system();

        for shift in candidates {
            match self.attendance.exists_for_shift(tenant, &shift.id) {
                Ok(true) => {
                    debug!(shift = %shift.id, "attendance present, skipping");
                    report.already_handled.push(shift.id);
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(tenant = %tenant, shift = %shift.id, error = %err, "attendance lookup failed");
                    report.failed.push(SweepFailure {
                        shift_id: shift.id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            match self
                .lifecycle
                .advance_with_outcome(tenant, &shift.id, ShiftEvent::Missed, &actor, as_of)
            {
                Ok(outcome) if outcome.applied => report.transitioned.push(shift.id),
                Ok(_) => report.already_handled.push(shift.id),
                Err(err) if err.is_state_conflict() => {
                    debug!(shift = %shift.id, error = %err, "shift moved before the sweep reached it");
                    report.already_handled.push(shift.id);
                }
                Err(err) => {
                    warn!(tenant = %tenant, shift = %shift.id, error = %err, "missed-shift transition failed");
                    report.failed.push(SweepFailure {
                        shift_id: shift.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            tenant = %tenant,
            %as_of,
            transitioned = report.transitioned.len(),
            already_handled = report.already_handled.len(),
            failed = report.failed.len(),
            "missed-shift sweep finished"
        );
        Ok(report)
    }
}
