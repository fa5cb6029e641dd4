//! Home-care visit verification: shift lifecycle, attendance with geofence checks,
//! vital-sign threshold breaches, and the compliance sweeps run over completed and
//! overdue shifts.
//!
//! Every operation takes the tenant explicitly, and time-dependent operations take the
//! instant they evaluate against, so batch runs stay reproducible.

pub mod access;
pub mod attendance;
pub mod breach;
pub mod domain;
pub mod error;
pub mod geofence;
pub mod lifecycle;
pub mod memory;
pub mod missed_shifts;
pub mod missing_notes;
pub mod reminders;
pub mod repository;
pub mod router;
pub mod service;
pub mod tenant;

#[cfg(test)]
mod tests;

pub use access::{can_access_shift, Requester, Role, ShiftScope};
pub use attendance::{attendance_day, AttendanceService};
pub use breach::{evaluate, ThresholdBreachDetector};
pub use domain::{
    ActorId, AttendanceId, AttendanceRecord, BreachId, BreachType, CarerId, ClientId, GeoPoint,
    GeofenceEnforcement, LocationReading, LocationVerification, Notification, Shift,
    ShiftAssignment, ShiftEvent, ShiftId, ShiftStatus, TemplateId, TenantEvvConfig, TenantId,
    ThresholdBreach, ThresholdRule, ThresholdRuleSet, UndocumentedShift, UnverifiedReason,
    VisitNoteId, VisitNoteRecord, VisitNoteSubmission,
};
pub use error::VisitError;
pub use geofence::{haversine_distance_meters, verify_location, ClientCoordinate};
pub use lifecycle::{resolve_transition, AdvanceOutcome, ShiftLifecycleManager, Transition};
pub use memory::{MemoryNotifier, MemoryStore};
pub use missed_shifts::{MissedShiftSweep, SweepFailure, SweepReport};
pub use missing_notes::MissingNoteScanner;
pub use reminders::{NoteReminderDispatcher, ReminderFailure, ReminderReport};
pub use repository::{
    AttendanceRepository, ClientDirectory, NotificationPublisher, NotifyError, RepositoryError,
    ShiftRepository, TenantConfigStore, ThresholdRuleSource, VisitNoteRepository,
};
pub use router::{visit_router, RequestContext};
pub use service::{VisitServices, VisitStores};
pub use tenant::TenantConfigProvider;
