use std::collections::BTreeMap;

use super::common::*;

use crate::workflows::visits::access::{Requester, Role};
use crate::workflows::visits::domain::{
    CarerId, ShiftId, ThresholdRuleSet, VisitNoteId, VisitNoteSubmission,
};
use crate::workflows::visits::error::VisitError;
use crate::workflows::visits::missing_notes::MissingNoteScanner;

fn document(harness: &Harness, shift: &str, note: &str) {
    harness
        .services
        .breaches
        .submit(
            &tenant(),
            &Requester::system(),
            VisitNoteSubmission {
                visit_note_id: VisitNoteId::new(note),
                shift_id: ShiftId::new(shift),
                field_values: BTreeMap::new(),
            },
            &ThresholdRuleSet::new(),
            at(18, 0),
        )
        .expect("note recorded");
}

fn coordinator() -> Requester {
    Requester::new(Role::Coordinator, Some(CarerId::new("coord-1")))
}

#[test]
fn documented_shifts_are_excluded() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness.schedule("shift-2", CARER);
    harness.complete("shift-1", at(9, 0), at(12, 0));
    harness.complete("shift-2", at(13, 0), at(16, 0));
    document(&harness, "shift-1", "note-1");

    let found = harness
        .services
        .scanner
        .find_undocumented(&tenant(), days(1), &coordinator(), at(20, 0))
        .expect("scan");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].shift.id, ShiftId::new("shift-2"));
    assert_eq!(found[0].completed_at, at(16, 0));
    assert_eq!(found[0].hours_since_completion, 4);
}

#[test]
fn shifts_completed_before_the_window_are_excluded() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness.complete("shift-1", at(9, 0), at(17, 0));

    let now = at(17, 0) + days(8);
    let found = harness
        .services
        .scanner
        .find_undocumented(&tenant(), days(7), &coordinator(), now)
        .expect("scan");

    assert!(found.is_empty());
}

#[test]
fn results_are_most_recent_first_and_capped() {
    let harness = harness();
    for (index, end_hour) in [(1, 10), (2, 14), (3, 12)] {
        let id = format!("shift-{index}");
        harness.schedule(&id, CARER);
        harness.complete(&id, at(9, 0), at(end_hour, 0));
    }
    let scanner = MissingNoteScanner::new(
        std::sync::Arc::new(harness.store.clone()),
        std::sync::Arc::new(harness.store.clone()),
        2,
    );

    let found = scanner
        .find_undocumented(&tenant(), days(1), &Requester::system(), at(20, 0))
        .expect("scan");

    let ids: Vec<&str> = found.iter().map(|item| item.shift.id.as_str()).collect();
    assert_eq!(ids, ["shift-2", "shift-3"]);
}

#[test]
fn carers_only_see_their_own_shifts() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness.schedule("shift-2", OTHER_CARER);
    harness.complete("shift-1", at(9, 0), at(12, 0));
    harness.complete("shift-2", at(9, 0), at(12, 0));

    let found = harness
        .services
        .scanner
        .find_undocumented(
            &tenant(),
            days(1),
            &Requester::new(Role::Carer, Some(carer())),
            at(20, 0),
        )
        .expect("scan");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].shift.carer_id, carer());
}

#[test]
fn carer_scope_without_id_is_rejected() {
    let harness = harness();

    let result = harness.services.scanner.find_undocumented(
        &tenant(),
        days(1),
        &Requester::new(Role::Carer, None),
        at(20, 0),
    );

    assert!(matches!(result, Err(VisitError::Authorization(_))));
}

#[test]
fn family_members_cannot_scan() {
    let harness = harness();

    let result = harness.services.scanner.find_undocumented(
        &tenant(),
        days(1),
        &Requester::new(Role::FamilyMember, Some(CarerId::new("fam-1"))),
        at(20, 0),
    );

    assert!(matches!(result, Err(VisitError::Authorization(_))));
}

#[test]
fn non_positive_lookback_is_invalid() {
    let harness = harness();

    let result = harness.services.scanner.find_undocumented(
        &tenant(),
        days(0),
        &coordinator(),
        at(20, 0),
    );

    assert!(matches!(result, Err(VisitError::Validation(_))));
}

#[test]
fn lookback_beyond_the_calendar_is_invalid() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness.complete("shift-1", at(9, 0), at(11, 0));

    let result = harness.services.scanner.find_undocumented(
        &tenant(),
        chrono::Duration::hours(5_000_000_000),
        &coordinator(),
        at(12, 0),
    );

    assert!(matches!(result, Err(VisitError::Validation(_))));
}
