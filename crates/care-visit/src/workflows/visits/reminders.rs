use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Notification, ShiftId, TenantId, UndocumentedShift};
use super::error::VisitError;
use super::missing_notes::MissingNoteScanner;
use super::repository::{NotificationPublisher, ShiftRepository};

pub const VISIT_NOTE_MISSING_EVENT: &str = "visit_note_missing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderFailure {
    pub shift_id: ShiftId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub notified: Vec<ShiftId>,
    pub failed: Vec<ReminderFailure>,
}

/// Reminds carers about visits they have not documented yet, once per shift.
pub struct NoteReminderDispatcher {
    scanner: Arc<MissingNoteScanner>,
    shifts: Arc<dyn ShiftRepository>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl NoteReminderDispatcher {
    pub fn new(
        scanner: Arc<MissingNoteScanner>,
        shifts: Arc<dyn ShiftRepository>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            scanner,
            shifts,
            publisher,
        }
    }

    pub fn dispatch(
        &self,
        tenant: &TenantId,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<ReminderReport, VisitError> {
        let pending = self.scanner.find_unreminded(tenant, lookback, now)?;
        let mut report = ReminderReport::default();

        for item in pending {
            let shift_id = item.shift.id.clone();
            match self.remind(tenant, item) {
                Ok(()) => report.notified.push(shift_id),
                Err(reason) => {
                    warn!(tenant = %tenant, shift = %shift_id, %reason, "note reminder failed");
                    report.failed.push(ReminderFailure { shift_id, reason });
                }
            }
        }

        info!(
            tenant = %tenant,
            notified = report.notified.len(),
            failed = report.failed.len(),
            "note reminders dispatched"
        );
        Ok(report)
    }

    fn remind(&self, tenant: &TenantId, item: UndocumentedShift) -> Result<(), String> {
        let shift = item.shift;
        let mut data = BTreeMap::new();
        data.insert("shiftId".to_string(), shift.id.to_string());
        data.insert("clientId".to_string(), shift.client_id.to_string());
        data.insert("completedAt".to_string(), item.completed_at.to_rfc3339());
        data.insert(
            "hoursSinceCompletion".to_string(),
            item.hours_since_completion.to_string(),
        );

        self.publisher
            .notify(Notification {
                event_type: VISIT_NOTE_MISSING_EVENT.to_string(),
                recipient_ids: vec![shift.carer_id.to_string()],
                data,
            })
            .map_err(|err| err.to_string())?;

        self.shifts
            .mark_reminder_sent(tenant, &shift.id)
            .map_err(|err| err.to_string())
    }
}
