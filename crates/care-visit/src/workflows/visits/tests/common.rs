use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::ComplianceConfig;
use crate::workflows::visits::access::Requester;
use crate::workflows::visits::domain::{
    ActorId, AttendanceId, AttendanceRecord, CarerId, CheckOutUpdate, ClientId, GeoPoint,
    GeofenceEnforcement, LocationReading, Notification, Shift, ShiftAssignment, ShiftId,
    TenantEvvConfig, TenantId,
};
use crate::workflows::visits::lifecycle::ShiftLifecycleManager;
use crate::workflows::visits::memory::{MemoryNotifier, MemoryStore};
use crate::workflows::visits::repository::{
    AttendanceRepository, ClientDirectory, NotificationPublisher, NotifyError, RepositoryError,
};
use crate::workflows::visits::service::{VisitServices, VisitStores};

pub(super) const CARER: &str = "carer-ada";
pub(super) const OTHER_CARER: &str = "carer-bo";
pub(super) const CLIENT: &str = "client-1";

/// Client home in Westminster.
pub(super) const CLIENT_HOME: GeoPoint = GeoPoint {
    latitude: 51.5007,
    longitude: -0.1246,
};

pub(super) fn tenant() -> TenantId {
    TenantId::new("acme-care")
}

pub(super) fn carer() -> CarerId {
    CarerId::new(CARER)
}

/// 2025-03-04 at the given UTC wall-clock time.
pub(super) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

/// A reading due north of the client home.
pub(super) fn reading_north_of_home(meters: f64) -> LocationReading {
    LocationReading {
        latitude: CLIENT_HOME.latitude + meters / 111_195.0,
        longitude: CLIENT_HOME.longitude,
        accuracy_meters: Some(10.0),
    }
}

pub(super) fn assignment(id: &str, carer: &str) -> ShiftAssignment {
    ShiftAssignment {
        shift_id: ShiftId::new(id),
        carer_id: CarerId::new(carer),
        client_id: ClientId::new(CLIENT),
        scheduled_start: at(9, 0),
        scheduled_end: at(17, 0),
    }
}

pub(super) struct Harness {
    pub store: MemoryStore,
    pub notifier: MemoryNotifier,
    pub services: Arc<VisitServices>,
}

impl Harness {
    pub fn schedule(&self, id: &str, carer: &str) -> Shift {
        self.services
            .lifecycle
            .schedule(&tenant(), assignment(id, carer))
            .expect("shift scheduled")
    }

    pub fn enable_evv(&self, enforcement: GeofenceEnforcement) {
        self.services
            .tenant_config
            .update(
                &tenant(),
                TenantEvvConfig {
                    evv_enabled: true,
                    default_geofence_radius: 150,
                    enforcement,
                },
            )
            .expect("evv config saved");
    }

    pub fn register_client_home(&self) {
        self.store
            .register_client_coordinate(&tenant(), &ClientId::new(CLIENT), CLIENT_HOME)
            .expect("coordinate registered");
    }

    pub fn shift(&self, id: &str) -> Shift {
        self.services
            .lifecycle
            .get(&tenant(), &ShiftId::new(id))
            .expect("shift exists")
    }

    /// Runs a full visit: check-in at `start`, check-out at `end`.
    pub fn complete(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Shift {
        let shift_id = ShiftId::new(id);
        let owner = self.shift(id).carer_id;
        self.services
            .attendance
            .check_in(&tenant(), &shift_id, &owner, None, start)
            .expect("check-in");
        self.services
            .attendance
            .check_out(&tenant(), &shift_id, &owner, None, end)
            .expect("check-out");
        self.shift(id)
    }
}

pub(super) fn compliance() -> ComplianceConfig {
    ComplianceConfig {
        note_lookback_hours: 7 * 24,
        scan_page_size: 50,
    }
}

pub(super) fn harness() -> Harness {
    let store = MemoryStore::default();
    let notifier = MemoryNotifier::default();
    let services = Arc::new(VisitServices::in_memory(
        &store,
        Arc::new(notifier.clone()),
        compliance(),
    ));
    Harness {
        store,
        notifier,
        services,
    }
}

/// Harness whose stores are replaced by the given adapters.
pub(super) fn harness_with(customize: impl FnOnce(&mut VisitStores, &MemoryStore)) -> Harness {
    let store = MemoryStore::default();
    let notifier = MemoryNotifier::default();
    let mut stores = VisitStores::in_memory(&store, Arc::new(notifier.clone()));
    customize(&mut stores, &store);
    Harness {
        store,
        notifier,
        services: Arc::new(VisitServices::new(stores, compliance())),
    }
}

pub(super) fn days(n: i64) -> Duration {
    Duration::days(n)
}

/// Client directory that is always down.
pub(super) struct UnavailableClients;

impl ClientDirectory for UnavailableClients {
    fn address_coordinate(
        &self,
        _tenant: &TenantId,
        _client: &ClientId,
    ) -> Result<Option<GeoPoint>, RepositoryError> {
        Err(RepositoryError::Unavailable("client service timeout".to_string()))
    }
}

/// Attendance store that fails lookups for one shift and delegates everything else.
pub(super) struct FlakyAttendance {
    pub inner: MemoryStore,
    pub failing_shift: ShiftId,
}

impl AttendanceRepository for FlakyAttendance {
    fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        self.inner.insert_if_absent(record)
    }

    fn fetch_for_day(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
        date: chrono::NaiveDate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.fetch_for_day(tenant, shift, date)
    }

    fn open_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.open_for_shift(tenant, shift)
    }

    fn close(
        &self,
        tenant: &TenantId,
        id: &AttendanceId,
        update: CheckOutUpdate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.close(tenant, id, update)
    }

    fn exists_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<bool, RepositoryError> {
        if shift == &self.failing_shift {
            return Err(RepositoryError::Unavailable("attendance replica lagging".to_string()));
        }
        self.inner.exists_for_shift(tenant, shift)
    }
}

/// Attendance store where a manager cancels the shift right after check-out reads the
/// open record.
pub(super) struct CancellingAttendance {
    pub inner: MemoryStore,
    pub lifecycle: ShiftLifecycleManager,
}

impl CancellingAttendance {
    pub fn over(store: &MemoryStore) -> Self {
        Self {
            inner: store.clone(),
            lifecycle: ShiftLifecycleManager::new(Arc::new(store.clone())),
        }
    }
}

impl AttendanceRepository for CancellingAttendance {
    fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        self.inner.insert_if_absent(record)
    }

    fn fetch_for_day(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
        date: chrono::NaiveDate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.fetch_for_day(tenant, shift, date)
    }

    fn open_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let open = self.inner.open_for_shift(tenant, shift)?;
        self.lifecycle
            .cancel(tenant, shift, &Requester::system(), &ActorId::system(), at(15, 59))
            .expect("cancellation lands");
        Ok(open)
    }

    fn close(
        &self,
        tenant: &TenantId,
        id: &AttendanceId,
        update: CheckOutUpdate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.close(tenant, id, update)
    }

    fn exists_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<bool, RepositoryError> {
        self.inner.exists_for_shift(tenant, shift)
    }
}

/// Publisher that rejects notifications for one recipient.
#[derive(Default)]
pub(super) struct PickyNotifier {
    pub rejected_recipient: String,
    pub delivered: MemoryNotifier,
}

impl NotificationPublisher for PickyNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if notification
            .recipient_ids
            .iter()
            .any(|id| id == &self.rejected_recipient)
        {
            return Err(NotifyError::Transport("sms gateway rejected recipient".to_string()));
        }
        self.delivered.notify(notification)
    }
}
