use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::access::Requester;
use super::domain::{
    BreachId, BreachType, CarerId, ClientId, TemplateId, TenantId, ThresholdBreach,
    ThresholdRule, ThresholdRuleSet, VisitNoteId, VisitNoteRecord, VisitNoteSubmission,
};
use super::error::VisitError;
use super::repository::{
    RepositoryError, ShiftRepository, ThresholdRuleSource, VisitNoteRepository,
};

static BREACH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_breach_id() -> BreachId {
    let id = BREACH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BreachId(format!("breach-{id:06}"))
}

/// Form values arrive as JSON; numbers and numeric strings count, everything else is skipped.
fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Minimum is checked first, so a rule yields at most one breach per field.
fn classify(value: f64, rule: &ThresholdRule) -> Option<(BreachType, Option<f64>, Option<f64>)> {
    if let Some(min) = rule.min {
        if value < min {
            return Some((BreachType::BelowMin, Some(min), None));
        }
    }
    if let Some(max) = rule.max {
        if value > max {
            return Some((BreachType::AboveMax, None, Some(max)));
        }
    }
    None
}

/// Compares submitted values with their rules and snapshots every violation.
///
/// Labels and bounds are copied into the breach so later rule edits leave history intact.
pub fn evaluate(
    visit_note_id: &VisitNoteId,
    client_id: &ClientId,
    carer_id: &CarerId,
    field_values: &BTreeMap<String, Value>,
    rules: &ThresholdRuleSet,
    at: DateTime<Utc>,
) -> Vec<ThresholdBreach> {
    field_values
        .iter()
        .filter_map(|(field_id, raw)| {
            let rule = rules.get(field_id)?;
            let value = numeric_value(raw)?;
            let (breach_type, min_threshold, max_threshold) = classify(value, rule)?;
            Some(ThresholdBreach {
                id: next_breach_id(),
                visit_note_id: visit_note_id.clone(),
                client_id: client_id.clone(),
                carer_id: carer_id.clone(),
                field_id: field_id.clone(),
                field_label: rule.label.clone(),
                value,
                min_threshold,
                max_threshold,
                breach_type,
                message: rule.message.clone(),
                created_at: at,
            })
        })
        .collect()
}

/// Persists visit notes together with the breaches they produced.
pub struct ThresholdBreachDetector {
    shifts: Arc<dyn ShiftRepository>,
    notes: Arc<dyn VisitNoteRepository>,
    rules: Arc<dyn ThresholdRuleSource>,
}

impl ThresholdBreachDetector {
    pub fn new(
        shifts: Arc<dyn ShiftRepository>,
        notes: Arc<dyn VisitNoteRepository>,
        rules: Arc<dyn ThresholdRuleSource>,
    ) -> Self {
        Self {
            shifts,
            notes,
            rules,
        }
    }

    /// Record the note and its breaches as one unit of work.
    pub fn submit(
        &self,
        tenant: &TenantId,
        requester: &Requester,
        submission: VisitNoteSubmission,
        rules: &ThresholdRuleSet,
        now: DateTime<Utc>,
    ) -> Result<Vec<ThresholdBreach>, VisitError> {
        let shift = self
            .shifts
            .fetch(tenant, &submission.shift_id)?
            .ok_or_else(|| VisitError::shift_not_found(&submission.shift_id))?;

        if !requester.can_access(&shift.carer_id) {
            return Err(VisitError::Authorization(format!(
                "{} cannot document shift {}",
                requester.role, shift.id
            )));
        }

        let breaches = evaluate(
            &submission.visit_note_id,
            &shift.client_id,
            &shift.carer_id,
            &submission.field_values,
            rules,
            now,
        );

        let note = VisitNoteRecord {
            id: submission.visit_note_id,
            tenant_id: tenant.clone(),
            shift_id: shift.id,
            client_id: shift.client_id,
            carer_id: shift.carer_id,
            field_values: submission.field_values,
            submitted_at: now,
        };
        let note_id = note.id.clone();

        self.notes
            .record_submission(note, breaches.clone())
            .map_err(|err| match err {
                RepositoryError::Conflict => VisitError::StateConflict(format!(
                    "visit note {note_id} was already submitted"
                )),
                other => other.into(),
            })?;

        if breaches.is_empty() {
            info!(tenant = %tenant, note = %note_id, "visit note recorded");
        } else {
            for breach in &breaches {
                warn!(
                    tenant = %tenant,
                    note = %note_id,
                    field = %breach.field_id,
                    value = breach.value,
                    breach_type = ?breach.breach_type,
                    "threshold breach recorded"
                );
            }
        }

        Ok(breaches)
    }

    /// Same as `submit`, loading the rules from the note's form template.
    pub fn submit_with_template(
        &self,
        tenant: &TenantId,
        requester: &Requester,
        submission: VisitNoteSubmission,
        template: &TemplateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ThresholdBreach>, VisitError> {
        let rules = self
            .rules
            .rules_for_template(tenant, template)?
            .ok_or_else(|| VisitError::NotFound {
                entity: "form template",
                id: template.to_string(),
            })?;
        self.submit(tenant, requester, submission, &rules, now)
    }

    pub fn breaches_for_note(
        &self,
        tenant: &TenantId,
        note: &VisitNoteId,
    ) -> Result<Vec<ThresholdBreach>, VisitError> {
        Ok(self.notes.breaches_for_note(tenant, note)?)
    }
}
