use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use super::access::{can_access_shift, Role};
use super::domain::{
    ActorId, AttendanceId, AttendanceRecord, CarerId, CheckOutUpdate, LocationReading,
    LocationVerification, Shift, ShiftEvent, ShiftId, ShiftStatus, TenantEvvConfig, TenantId,
};
use super::error::VisitError;
use super::geofence::{verify_location, ClientCoordinate};
use super::lifecycle::ShiftLifecycleManager;
use super::repository::{AttendanceRepository, ClientDirectory};
use super::tenant::TenantConfigProvider;

static ATTENDANCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_attendance_id() -> AttendanceId {
    let id = ATTENDANCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AttendanceId(format!("att-{id:06}"))
}

/// Attendance rows are grouped by UTC calendar day.
pub fn attendance_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Records check-in and check-out events and applies the tenant's geofence policy.
pub struct AttendanceService {
    attendance: Arc<dyn AttendanceRepository>,
    clients: Arc<dyn ClientDirectory>,
    tenant_config: Arc<TenantConfigProvider>,
    lifecycle: Arc<ShiftLifecycleManager>,
}

impl AttendanceService {
    pub fn new(
        attendance: Arc<dyn AttendanceRepository>,
        clients: Arc<dyn ClientDirectory>,
        tenant_config: Arc<TenantConfigProvider>,
        lifecycle: Arc<ShiftLifecycleManager>,
    ) -> Self {
        Self {
            attendance,
            clients,
            tenant_config,
            lifecycle,
        }
    }

    /// Start (or re-confirm) today's visit for the assigned carer.
    ///
    /// A repeated call while the visit is open returns the stored record untouched, even
    /// when it was opened on an earlier day. The shift is
    /// advanced before the record is written, so a shift holding attendance is never
    /// left SCHEDULED for the missed-shift sweep to pick up.
    pub fn check_in(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        carer: &CarerId,
        location: Option<LocationReading>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, VisitError> {
        let shift = self.assigned_shift(tenant, shift_id, carer)?;

        if matches!(
            shift.status,
            ShiftStatus::Cancelled | ShiftStatus::Completed | ShiftStatus::Missed
        ) {
            return Err(VisitError::invalid_transition(
                shift_id,
                shift.status,
                ShiftEvent::CheckIn,
            ));
        }

        let day = attendance_day(now);
        if shift.status == ShiftStatus::InProgress {
            if let Some(existing) = self.attendance.fetch_for_day(tenant, shift_id, day)? {
                return Ok(existing);
            }
            // Visit still running from an earlier day.
            if let Some(open) = self.attendance.open_for_shift(tenant, shift_id)? {
                return Ok(open);
            }
        }

        let verification = self.verify(tenant, &shift, location.as_ref())?;

        self.lifecycle.advance(
            tenant,
            shift_id,
            ShiftEvent::CheckIn,
            &ActorId::from(carer),
            now,
        )?;

        let record = AttendanceRecord {
            id: next_attendance_id(),
            tenant_id: tenant.clone(),
            shift_id: shift_id.clone(),
            date: day,
            check_in_time: now,
            check_in_location: location,
            check_in_verification: verification,
            check_out_time: None,
            check_out_location: None,
            check_out_verification: None,
            out_of_geofence: verification.is_outside_geofence(),
        };
        let stored = self.attendance.insert_if_absent(record)?;

        if stored.out_of_geofence {
            warn!(
                tenant = %tenant,
                shift = %shift_id,
                carer = %carer,
                ?verification,
                "check-in recorded outside geofence; flagged for supervisor review"
            );
        } else {
            info!(tenant = %tenant, shift = %shift_id, carer = %carer, "check-in recorded");
        }

        Ok(stored)
    }

    /// Complete the shift and close its open attendance record.
    ///
    /// The status compare-and-set runs first, so a cancellation racing the check-out
    /// leaves the record open instead of closing it on a shift that never completed.
    pub fn check_out(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        carer: &CarerId,
        location: Option<LocationReading>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, VisitError> {
        let shift = self.assigned_shift(tenant, shift_id, carer)?;

        if shift.status != ShiftStatus::InProgress {
            return Err(VisitError::invalid_transition(
                shift_id,
                shift.status,
                ShiftEvent::CheckOut,
            ));
        }

        let open = self
            .attendance
            .open_for_shift(tenant, shift_id)?
            .ok_or_else(|| {
                VisitError::StateConflict(format!("shift {shift_id} has no open check-in"))
            })?;

        if now < open.check_in_time {
            return Err(VisitError::StateConflict(format!(
                "check-out at {now} precedes check-in at {}",
                open.check_in_time
            )));
        }

        let verification = self.verify(tenant, &shift, location.as_ref())?;
        let update = CheckOutUpdate {
            time: now,
            location,
            verification,
        };

        let outcome = self.lifecycle.advance_with_outcome(
            tenant,
            shift_id,
            ShiftEvent::CheckOut,
            &ActorId::from(carer),
            now,
        )?;
        if !outcome.applied {
            return Err(already_checked_out(shift_id));
        }

        let closed = self
            .attendance
            .close(tenant, &open.id, update)?
            .ok_or_else(|| already_checked_out(shift_id))?;

        if verification.is_outside_geofence() {
            warn!(
                tenant = %tenant,
                shift = %shift_id,
                carer = %carer,
                ?verification,
                "check-out recorded outside geofence; flagged for supervisor review"
            );
        } else {
            info!(tenant = %tenant, shift = %shift_id, carer = %carer, "check-out recorded");
        }

        Ok(closed)
    }

    fn assigned_shift(
        &self,
        tenant: &TenantId,
        shift_id: &ShiftId,
        carer: &CarerId,
    ) -> Result<Shift, VisitError> {
        let shift = self.lifecycle.get(tenant, shift_id)?;
        if !can_access_shift(Role::Carer, &shift.carer_id == carer) {
            return Err(VisitError::Authorization(format!(
                "carer {carer} is not assigned to shift {shift_id}"
            )));
        }
        Ok(shift)
    }

    fn verify(
        &self,
        tenant: &TenantId,
        shift: &Shift,
        location: Option<&LocationReading>,
    ) -> Result<LocationVerification, VisitError> {
        let config = self.tenant_config.get(tenant)?;
        let client = self.client_coordinate(tenant, shift, &config);
        verify_location(&config, client, location)
    }

    fn client_coordinate(
        &self,
        tenant: &TenantId,
        shift: &Shift,
        config: &TenantEvvConfig,
    ) -> ClientCoordinate {
        if !config.evv_enabled {
            return ClientCoordinate::Missing;
        }

        match self.clients.address_coordinate(tenant, &shift.client_id) {
            Ok(Some(point)) => ClientCoordinate::Known(point),
            Ok(None) => ClientCoordinate::Missing,
            Err(err) => {
                warn!(
                    tenant = %tenant,
                    client = %shift.client_id,
                    error = %err,
                    "client coordinate lookup failed; location left unverified"
                );
                ClientCoordinate::LookupFailed
            }
        }
    }
}

fn already_checked_out(shift_id: &ShiftId) -> VisitError {
    VisitError::StateConflict(format!("shift {shift_id} is already checked out"))
}
