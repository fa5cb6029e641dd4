use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    AttendanceId, AttendanceRecord, CarerId, CheckOutUpdate, ClientId, GeoPoint, Notification,
    Shift, ShiftId, ShiftStatus, ShiftUpdate, TemplateId, TenantEvvConfig, TenantId,
    ThresholdBreach, ThresholdRuleSet, VisitNoteId, VisitNoteRecord,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Shift storage. Status changes go through `compare_and_set` only.
pub trait ShiftRepository: Send + Sync {
    fn insert(&self, shift: Shift) -> Result<Shift, RepositoryError>;
    fn fetch(&self, tenant: &TenantId, id: &ShiftId) -> Result<Option<Shift>, RepositoryError>;
    /// Applies `update` atomically if the stored status still equals `expected`.
    /// Returns `None` when the status moved underneath the caller.
    fn compare_and_set(
        &self,
        tenant: &TenantId,
        id: &ShiftId,
        expected: ShiftStatus,
        update: ShiftUpdate,
    ) -> Result<Option<Shift>, RepositoryError>;
    /// SCHEDULED shifts whose scheduled end is strictly before `as_of`.
    fn scheduled_ending_before(
        &self,
        tenant: &TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Shift>, RepositoryError>;
    /// COMPLETED shifts whose completion instant lies in `[from, to]`, optionally for one carer.
    fn completed_between(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        carer: Option<&CarerId>,
    ) -> Result<Vec<Shift>, RepositoryError>;
    fn mark_reminder_sent(&self, tenant: &TenantId, id: &ShiftId) -> Result<(), RepositoryError>;
}

/// Attendance storage keyed by (shift, day).
pub trait AttendanceRepository: Send + Sync {
    /// First writer wins: returns the already stored record for the same (shift, day) if any.
    fn insert_if_absent(&self, record: AttendanceRecord)
        -> Result<AttendanceRecord, RepositoryError>;
    fn fetch_for_day(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError>;
    /// Most recent record for the shift that has no check-out yet.
    fn open_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError>;
    /// Writes the check-out atomically. `None` if the record was already closed.
    fn close(
        &self,
        tenant: &TenantId,
        id: &AttendanceId,
        update: CheckOutUpdate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError>;
    fn exists_for_shift(&self, tenant: &TenantId, shift: &ShiftId)
        -> Result<bool, RepositoryError>;
}

/// Visit notes and their threshold breaches.
pub trait VisitNoteRepository: Send + Sync {
    /// Stores the note and every breach as one unit of work.
    fn record_submission(
        &self,
        note: VisitNoteRecord,
        breaches: Vec<ThresholdBreach>,
    ) -> Result<(), RepositoryError>;
    fn has_note_for_shift(&self, tenant: &TenantId, shift: &ShiftId)
        -> Result<bool, RepositoryError>;
    fn breaches_for_note(
        &self,
        tenant: &TenantId,
        note: &VisitNoteId,
    ) -> Result<Vec<ThresholdBreach>, RepositoryError>;
}

pub trait TenantConfigStore: Send + Sync {
    fn fetch_config(&self, tenant: &TenantId) -> Result<Option<TenantEvvConfig>, RepositoryError>;
    fn save_config(&self, tenant: &TenantId, config: TenantEvvConfig)
        -> Result<(), RepositoryError>;
}

/// Client records live elsewhere; only the address coordinate is consumed.
pub trait ClientDirectory: Send + Sync {
    fn address_coordinate(
        &self,
        tenant: &TenantId,
        client: &ClientId,
    ) -> Result<Option<GeoPoint>, RepositoryError>;
}

/// Threshold rules owned by the form-template subsystem.
pub trait ThresholdRuleSource: Send + Sync {
    fn rules_for_template(
        &self,
        tenant: &TenantId,
        template: &TemplateId,
    ) -> Result<Option<ThresholdRuleSet>, RepositoryError>;
}

/// Outbound notification hook (e-mail, SMS, or push adapters).
pub trait NotificationPublisher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
