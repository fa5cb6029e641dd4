use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Company owning the data. Every read and write is scoped by it.
    TenantId
);
identifier!(ShiftId);
identifier!(CarerId);
identifier!(ClientId);
identifier!(AttendanceId);
identifier!(VisitNoteId);
identifier!(BreachId);
identifier!(
    /// Form template that owns a threshold rule set.
    TemplateId
);
identifier!(
    /// Whoever triggered a transition: a carer, a coordinator, or the sweep itself.
    ActorId
);

impl ActorId {
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

impl From<&CarerId> for ActorId {
    fn from(value: &CarerId) -> Self {
        Self(value.0.clone())
    }
}

/// Lifecycle status of a scheduled visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Missed,
}

impl ShiftStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Missed => "MISSED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Missed)
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events that drive the shift state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftEvent {
    CheckIn,
    CheckOut,
    Cancel,
    Missed,
}

impl ShiftEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::CheckIn => "CHECK_IN",
            Self::CheckOut => "CHECK_OUT",
            Self::Cancel => "CANCEL",
            Self::Missed => "MISSED",
        }
    }
}

impl fmt::Display for ShiftEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scheduling input produced by the external rostering system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub shift_id: ShiftId,
    pub carer_id: CarerId,
    pub client_id: ClientId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// One scheduled care visit. Never deleted; cancellation is a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub tenant_id: TenantId,
    pub carer_id: CarerId,
    pub client_id: ClientId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: ShiftStatus,
    pub reminder_sent: bool,
}

impl Shift {
    pub fn from_assignment(tenant_id: TenantId, assignment: ShiftAssignment) -> Self {
        Self {
            id: assignment.shift_id,
            tenant_id,
            carer_id: assignment.carer_id,
            client_id: assignment.client_id,
            scheduled_start: assignment.scheduled_start,
            scheduled_end: assignment.scheduled_end,
            actual_start: None,
            actual_end: None,
            status: ShiftStatus::Scheduled,
            reminder_sent: false,
        }
    }

    /// Instant the visit ended for compliance purposes.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.actual_end.unwrap_or(self.scheduled_end)
    }
}

/// Fields written alongside a status change. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftUpdate {
    pub status: ShiftStatus,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
}

impl ShiftUpdate {
    pub fn apply(&self, shift: &mut Shift) {
        shift.status = self.status;
        if let Some(start) = self.actual_start {
            shift.actual_start = Some(start);
        }
        if let Some(end) = self.actual_end {
            shift.actual_end = Some(end);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Device-reported position captured client side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
}

impl LocationReading {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn is_plausible(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Why a location could not be checked against the geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnverifiedReason {
    EvvDisabled,
    LocationUnavailable,
    InvalidReading,
    ClientCoordinateMissing,
    CoordinateLookupFailed,
}

/// Outcome of the geofence check for a single check-in or check-out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum LocationVerification {
    Verified {
        distance_meters: f64,
    },
    OutsideGeofence {
        distance_meters: f64,
        radius_meters: u32,
    },
    Unverified {
        reason: UnverifiedReason,
    },
}

impl LocationVerification {
    pub fn is_outside_geofence(&self) -> bool {
        matches!(self, Self::OutsideGeofence { .. })
    }
}

/// One row per (shift, calendar day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub tenant_id: TenantId,
    pub shift_id: ShiftId,
    pub date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    pub check_in_location: Option<LocationReading>,
    pub check_in_verification: LocationVerification,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_out_location: Option<LocationReading>,
    pub check_out_verification: Option<LocationVerification>,
    pub out_of_geofence: bool,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

/// Check-out fields written onto an open attendance record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutUpdate {
    pub time: DateTime<Utc>,
    pub location: Option<LocationReading>,
    pub verification: LocationVerification,
}

impl CheckOutUpdate {
    pub fn apply(&self, record: &mut AttendanceRecord) {
        record.check_out_time = Some(self.time);
        record.check_out_location = self.location;
        record.check_out_verification = Some(self.verification);
        record.out_of_geofence |= self.verification.is_outside_geofence();
    }
}

/// How strictly a tenant applies the geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofenceEnforcement {
    /// Out-of-range or missing locations are flagged, never rejected.
    #[default]
    FailOpen,
    /// Check-ins must carry a location inside the radius.
    Enforced,
}

pub const MIN_GEOFENCE_RADIUS_METERS: u32 = 50;
pub const MAX_GEOFENCE_RADIUS_METERS: u32 = 1000;
pub const DEFAULT_GEOFENCE_RADIUS_METERS: u32 = 150;

/// Per-tenant EVV settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantEvvConfig {
    pub evv_enabled: bool,
    pub default_geofence_radius: u32,
    #[serde(default)]
    pub enforcement: GeofenceEnforcement,
}

impl Default for TenantEvvConfig {
    fn default() -> Self {
        Self {
            evv_enabled: false,
            default_geofence_radius: DEFAULT_GEOFENCE_RADIUS_METERS,
            enforcement: GeofenceEnforcement::FailOpen,
        }
    }
}

/// Bounds for a single form field, owned by the form-template subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type ThresholdRuleSet = BTreeMap<String, ThresholdRule>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreachType {
    BelowMin,
    AboveMax,
}

/// Immutable audit fact: a submitted value fell outside its configured bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub id: BreachId,
    pub visit_note_id: VisitNoteId,
    pub client_id: ClientId,
    pub carer_id: CarerId,
    pub field_id: String,
    pub field_label: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_threshold: Option<f64>,
    pub breach_type: BreachType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Visit-note payload handed over by the form system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitNoteSubmission {
    pub visit_note_id: VisitNoteId,
    pub shift_id: ShiftId,
    pub field_values: BTreeMap<String, serde_json::Value>,
}

/// Stored visit note. Written in the same unit of work as its breaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitNoteRecord {
    pub id: VisitNoteId,
    pub tenant_id: TenantId,
    pub shift_id: ShiftId,
    pub client_id: ClientId,
    pub carer_id: CarerId,
    pub field_values: BTreeMap<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
}

/// Completed shift with no visit note, as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndocumentedShift {
    pub shift: Shift,
    pub completed_at: DateTime<Utc>,
    pub hours_since_completion: i64,
}

/// Outbound notification payload for the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event_type: String,
    pub recipient_ids: Vec<String>,
    pub data: BTreeMap<String, String>,
}
