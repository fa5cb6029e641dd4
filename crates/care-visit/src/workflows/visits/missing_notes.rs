use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::access::{can_access_shift, Requester, ShiftScope};
use super::domain::{TenantId, UndocumentedShift};
use super::error::VisitError;
use super::repository::{ShiftRepository, VisitNoteRepository};

/// Finds completed visits that still lack a visit note. Never writes.
pub struct MissingNoteScanner {
    shifts: Arc<dyn ShiftRepository>,
    notes: Arc<dyn VisitNoteRepository>,
    page_size: usize,
}

impl MissingNoteScanner {
    pub fn new(
        shifts: Arc<dyn ShiftRepository>,
        notes: Arc<dyn VisitNoteRepository>,
        page_size: usize,
    ) -> Self {
        Self {
            shifts,
            notes,
            page_size: page_size.max(1),
        }
    }

    /// Undocumented shifts completed within `lookback` of `now`, most recent first.
    pub fn find_undocumented(
        &self,
        tenant: &TenantId,
        lookback: Duration,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> Result<Vec<UndocumentedShift>, VisitError> {
        self.scan(tenant, lookback, requester, now, true)
    }

    /// Like `find_undocumented`, skipping shifts whose carer was already reminded.
    pub fn find_unreminded(
        &self,
        tenant: &TenantId,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<UndocumentedShift>, VisitError> {
        self.scan(tenant, lookback, &Requester::system(), now, false)
    }

    fn scan(
        &self,
        tenant: &TenantId,
        lookback: Duration,
        requester: &Requester,
        now: DateTime<Utc>,
        include_reminded: bool,
    ) -> Result<Vec<UndocumentedShift>, VisitError> {
        if lookback <= Duration::zero() {
            return Err(VisitError::Validation(
                "lookback window must be positive".to_string(),
            ));
        }
        requester.ensure_can_query()?;

        let carer_filter = match requester.role.shift_scope() {
            ShiftScope::OwnOnly => requester.id.as_ref(),
            _ => None,
        };

        let since = now.checked_sub_signed(lookback).ok_or_else(|| {
            VisitError::Validation("lookback window reaches past the supported range".to_string())
        })?;
        let candidates = self
            .shifts
            .completed_between(tenant, since, now, carer_filter)?;

        let mut undocumented = Vec::new();
        for shift in candidates {
            if !can_access_shift(requester.role, requester.owns(&shift.carer_id)) {
                continue;
            }
            if !include_reminded && shift.reminder_sent {
                continue;
            }
            if self.notes.has_note_for_shift(tenant, &shift.id)? {
                continue;
            }
            let completed_at = shift.completed_at();
            undocumented.push(UndocumentedShift {
                hours_since_completion: (now - completed_at).num_hours(),
                completed_at,
                shift,
            });
        }

        undocumented.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| a.shift.id.cmp(&b.shift.id))
        });
        undocumented.truncate(self.page_size);

        debug!(
            tenant = %tenant,
            role = %requester.role,
            found = undocumented.len(),
            "missing-note scan finished"
        );
        Ok(undocumented)
    }
}
