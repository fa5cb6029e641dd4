use std::sync::Arc;

use crate::config::ComplianceConfig;

use super::attendance::AttendanceService;
use super::breach::ThresholdBreachDetector;
use super::lifecycle::ShiftLifecycleManager;
use super::memory::MemoryStore;
use super::missed_shifts::MissedShiftSweep;
use super::missing_notes::MissingNoteScanner;
use super::reminders::NoteReminderDispatcher;
use super::repository::{
    AttendanceRepository, ClientDirectory, NotificationPublisher, ShiftRepository,
    TenantConfigStore, ThresholdRuleSource, VisitNoteRepository,
};
use super::tenant::TenantConfigProvider;

/// Storage and collaborator adapters the visit components are built from.
#[derive(Clone)]
pub struct VisitStores {
    pub shifts: Arc<dyn ShiftRepository>,
    pub attendance: Arc<dyn AttendanceRepository>,
    pub notes: Arc<dyn VisitNoteRepository>,
    pub tenant_configs: Arc<dyn TenantConfigStore>,
    pub clients: Arc<dyn ClientDirectory>,
    pub rules: Arc<dyn ThresholdRuleSource>,
    pub publisher: Arc<dyn NotificationPublisher>,
}

impl VisitStores {
    /// Every table served by one `MemoryStore`.
    pub fn in_memory(store: &MemoryStore, publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self {
            shifts: Arc::new(store.clone()),
            attendance: Arc::new(store.clone()),
            notes: Arc::new(store.clone()),
            tenant_configs: Arc::new(store.clone()),
            clients: Arc::new(store.clone()),
            rules: Arc::new(store.clone()),
            publisher,
        }
    }
}

/// Wires the visit components together around shared stores.
pub struct VisitServices {
    pub lifecycle: Arc<ShiftLifecycleManager>,
    pub attendance: Arc<AttendanceService>,
    pub breaches: Arc<ThresholdBreachDetector>,
    pub scanner: Arc<MissingNoteScanner>,
    pub reminders: Arc<NoteReminderDispatcher>,
    pub sweep: Arc<MissedShiftSweep>,
    pub tenant_config: Arc<TenantConfigProvider>,
    pub compliance: ComplianceConfig,
}

impl VisitServices {
    pub fn new(stores: VisitStores, compliance: ComplianceConfig) -> Self {
        let lifecycle = Arc::new(ShiftLifecycleManager::new(stores.shifts.clone()));
        let tenant_config = Arc::new(TenantConfigProvider::new(stores.tenant_configs.clone()));
        let attendance = Arc::new(AttendanceService::new(
            stores.attendance.clone(),
            stores.clients.clone(),
            tenant_config.clone(),
            lifecycle.clone(),
        ));
        let breaches = Arc::new(ThresholdBreachDetector::new(
            stores.shifts.clone(),
            stores.notes.clone(),
            stores.rules.clone(),
        ));
        let scanner = Arc::new(MissingNoteScanner::new(
            stores.shifts.clone(),
            stores.notes.clone(),
            compliance.scan_page_size,
        ));
        let reminders = Arc::new(NoteReminderDispatcher::new(
            scanner.clone(),
            stores.shifts.clone(),
            stores.publisher.clone(),
        ));
        let sweep = Arc::new(MissedShiftSweep::new(
            stores.shifts.clone(),
            stores.attendance.clone(),
            lifecycle.clone(),
        ));

        Self {
            lifecycle,
            attendance,
            breaches,
            scanner,
            reminders,
            sweep,
            tenant_config,
            compliance,
        }
    }

    pub fn in_memory(
        store: &MemoryStore,
        publisher: Arc<dyn NotificationPublisher>,
        compliance: ComplianceConfig,
    ) -> Self {
        Self::new(VisitStores::in_memory(store, publisher), compliance)
    }
}
