//! In-process adapters for the repository traits, used by the demo service and tests.
//!
//! Each table sits behind its own mutex so the compare-and-set and insert-if-absent
//! operations are atomic with respect to concurrent callers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    AttendanceId, AttendanceRecord, CarerId, CheckOutUpdate, ClientId, GeoPoint, Notification,
    Shift, ShiftId, ShiftStatus, ShiftUpdate, TemplateId, TenantEvvConfig, TenantId,
    ThresholdBreach, ThresholdRuleSet, VisitNoteId, VisitNoteRecord,
};
use super::repository::{
    AttendanceRepository, ClientDirectory, NotificationPublisher, NotifyError, RepositoryError,
    ShiftRepository, TenantConfigStore, ThresholdRuleSource, VisitNoteRepository,
};

type ShiftKey = (TenantId, ShiftId);

#[derive(Default)]
struct NoteTables {
    notes: HashMap<(TenantId, VisitNoteId), VisitNoteRecord>,
    breaches: HashMap<(TenantId, VisitNoteId), Vec<ThresholdBreach>>,
}

/// All visit tables in one in-memory store.
#[derive(Default, Clone)]
pub struct MemoryStore {
    shifts: Arc<Mutex<HashMap<ShiftKey, Shift>>>,
    attendance: Arc<Mutex<BTreeMap<(TenantId, ShiftId, NaiveDate), AttendanceRecord>>>,
    notes: Arc<Mutex<NoteTables>>,
    tenant_configs: Arc<Mutex<HashMap<TenantId, TenantEvvConfig>>>,
    client_coordinates: Arc<Mutex<HashMap<(TenantId, ClientId), GeoPoint>>>,
    templates: Arc<Mutex<HashMap<(TenantId, TemplateId), ThresholdRuleSet>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("memory store mutex poisoned".to_string()))
}

impl MemoryStore {
    pub fn register_client_coordinate(
        &self,
        tenant: &TenantId,
        client: &ClientId,
        point: GeoPoint,
    ) -> Result<(), RepositoryError> {
        lock(&self.client_coordinates)?.insert((tenant.clone(), client.clone()), point);
        Ok(())
    }

    pub fn register_template(
        &self,
        tenant: &TenantId,
        template: &TemplateId,
        rules: ThresholdRuleSet,
    ) -> Result<(), RepositoryError> {
        lock(&self.templates)?.insert((tenant.clone(), template.clone()), rules);
        Ok(())
    }

    pub fn attendance_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        Ok(lock(&self.attendance)?
            .iter()
            .filter(|((t, s, _), _)| t == tenant && s == shift)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

impl ShiftRepository for MemoryStore {
    fn insert(&self, shift: Shift) -> Result<Shift, RepositoryError> {
        let mut guard = lock(&self.shifts)?;
        let key = (shift.tenant_id.clone(), shift.id.clone());
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, shift.clone());
        Ok(shift)
    }

    fn fetch(&self, tenant: &TenantId, id: &ShiftId) -> Result<Option<Shift>, RepositoryError> {
        let guard = lock(&self.shifts)?;
        Ok(guard.get(&(tenant.clone(), id.clone())).cloned())
    }

    fn compare_and_set(
        &self,
        tenant: &TenantId,
        id: &ShiftId,
        expected: ShiftStatus,
        update: ShiftUpdate,
    ) -> Result<Option<Shift>, RepositoryError> {
        let mut guard = lock(&self.shifts)?;
        let shift = guard
            .get_mut(&(tenant.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        if shift.status != expected {
            return Ok(None);
        }
        update.apply(shift);
        Ok(Some(shift.clone()))
    }

    fn scheduled_ending_before(
        &self,
        tenant: &TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Shift>, RepositoryError> {
        let guard = lock(&self.shifts)?;
        let mut shifts: Vec<Shift> = guard
            .values()
            .filter(|shift| {
                &shift.tenant_id == tenant
                    && shift.status == ShiftStatus::Scheduled
                    && shift.scheduled_end < as_of
            })
            .cloned()
            .collect();
        shifts.sort_by(|a, b| a.scheduled_end.cmp(&b.scheduled_end));
        Ok(shifts)
    }

    fn completed_between(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        carer: Option<&CarerId>,
    ) -> Result<Vec<Shift>, RepositoryError> {
        let guard = lock(&self.shifts)?;
        Ok(guard
            .values()
            .filter(|shift| {
                let completed_at = shift.completed_at();
                &shift.tenant_id == tenant
                    && shift.status == ShiftStatus::Completed
                    && completed_at >= from
                    && completed_at <= to
                    && carer.map_or(true, |carer| &shift.carer_id == carer)
            })
            .cloned()
            .collect())
    }

    fn mark_reminder_sent(&self, tenant: &TenantId, id: &ShiftId) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.shifts)?;
        let shift = guard
            .get_mut(&(tenant.clone(), id.clone()))
            .ok_or(RepositoryError::NotFound)?;
        shift.reminder_sent = true;
        Ok(())
    }
}

impl AttendanceRepository for MemoryStore {
    fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        let mut guard = lock(&self.attendance)?;
        let key = (
            record.tenant_id.clone(),
            record.shift_id.clone(),
            record.date,
        );
        Ok(guard.entry(key).or_insert(record).clone())
    }

    fn fetch_for_day(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let guard = lock(&self.attendance)?;
        Ok(guard
            .get(&(tenant.clone(), shift.clone(), date))
            .cloned())
    }

    fn open_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let guard = lock(&self.attendance)?;
        Ok(guard
            .iter()
            .filter(|((t, s, _), record)| t == tenant && s == shift && record.is_open())
            .map(|(_, record)| record)
            .max_by_key(|record| record.check_in_time)
            .cloned())
    }

    fn close(
        &self,
        tenant: &TenantId,
        id: &AttendanceId,
        update: CheckOutUpdate,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let mut guard = lock(&self.attendance)?;
        let record = guard
            .iter_mut()
            .find(|((t, _, _), record)| t == tenant && &record.id == id)
            .map(|(_, record)| record)
            .ok_or(RepositoryError::NotFound)?;
        if !record.is_open() {
            return Ok(None);
        }
        update.apply(record);
        Ok(Some(record.clone()))
    }

    fn exists_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<bool, RepositoryError> {
        let guard = lock(&self.attendance)?;
        Ok(guard.keys().any(|(t, s, _)| t == tenant && s == shift))
    }
}

impl VisitNoteRepository for MemoryStore {
    fn record_submission(
        &self,
        note: VisitNoteRecord,
        breaches: Vec<ThresholdBreach>,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.notes)?;
        let key = (note.tenant_id.clone(), note.id.clone());
        if guard.notes.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.breaches.insert(key.clone(), breaches);
        guard.notes.insert(key, note);
        Ok(())
    }

    fn has_note_for_shift(
        &self,
        tenant: &TenantId,
        shift: &ShiftId,
    ) -> Result<bool, RepositoryError> {
        let guard = lock(&self.notes)?;
        Ok(guard
            .notes
            .values()
            .any(|note| &note.tenant_id == tenant && &note.shift_id == shift))
    }

    fn breaches_for_note(
        &self,
        tenant: &TenantId,
        note: &VisitNoteId,
    ) -> Result<Vec<ThresholdBreach>, RepositoryError> {
        let guard = lock(&self.notes)?;
        Ok(guard
            .breaches
            .get(&(tenant.clone(), note.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

impl TenantConfigStore for MemoryStore {
    fn fetch_config(&self, tenant: &TenantId) -> Result<Option<TenantEvvConfig>, RepositoryError> {
        Ok(lock(&self.tenant_configs)?.get(tenant).copied())
    }

    fn save_config(
        &self,
        tenant: &TenantId,
        config: TenantEvvConfig,
    ) -> Result<(), RepositoryError> {
        lock(&self.tenant_configs)?.insert(tenant.clone(), config);
        Ok(())
    }
}

impl ClientDirectory for MemoryStore {
    fn address_coordinate(
        &self,
        tenant: &TenantId,
        client: &ClientId,
    ) -> Result<Option<GeoPoint>, RepositoryError> {
        Ok(lock(&self.client_coordinates)?
            .get(&(tenant.clone(), client.clone()))
            .copied())
    }
}

impl ThresholdRuleSource for MemoryStore {
    fn rules_for_template(
        &self,
        tenant: &TenantId,
        template: &TemplateId,
    ) -> Result<Option<ThresholdRuleSet>, RepositoryError> {
        Ok(lock(&self.templates)?
            .get(&(tenant.clone(), template.clone()))
            .cloned())
    }
}

/// Captures notifications instead of delivering them.
#[derive(Default, Clone)]
pub struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
