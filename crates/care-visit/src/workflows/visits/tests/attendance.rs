use std::sync::Arc;

use super::common::*;

use crate::workflows::visits::domain::{
    CarerId, GeofenceEnforcement, LocationReading, LocationVerification, ShiftId, ShiftStatus,
    UnverifiedReason,
};
use crate::workflows::visits::error::VisitError;
use crate::workflows::visits::repository::AttendanceRepository;

#[test]
fn check_in_within_radius_is_verified() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(
            &tenant(),
            &ShiftId::new("shift-1"),
            &carer(),
            Some(reading_north_of_home(80.0)),
            at(9, 5),
        )
        .expect("check-in succeeds");

    assert!(!record.out_of_geofence);
    match record.check_in_verification {
        LocationVerification::Verified { distance_meters } => {
            assert!((distance_meters - 80.0).abs() < 1.0, "{distance_meters}")
        }
        other => panic!("expected verified location, got {other:?}"),
    }
    let shift = harness.shift("shift-1");
    assert_eq!(shift.status, ShiftStatus::InProgress);
    assert_eq!(shift.actual_start, Some(at(9, 5)));
}

#[test]
fn check_in_outside_radius_is_flagged_not_rejected() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(
            &tenant(),
            &ShiftId::new("shift-1"),
            &carer(),
            Some(reading_north_of_home(2_000.0)),
            at(9, 5),
        )
        .expect("fail-open check-in succeeds");

    assert!(record.out_of_geofence);
    assert!(matches!(
        record.check_in_verification,
        LocationVerification::OutsideGeofence {
            radius_meters: 150,
            ..
        }
    ));
    assert_eq!(harness.shift("shift-1").status, ShiftStatus::InProgress);
}

#[test]
fn repeated_check_in_returns_the_same_record() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");
    let attendance = &harness.services.attendance;

    let first = attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(9, 5))
        .expect("first check-in");
    let second = attendance
        .check_in(
            &tenant(),
            &shift_id,
            &carer(),
            Some(reading_north_of_home(10.0)),
            at(9, 20),
        )
        .expect("repeat check-in");

    assert_eq!(first, second);
    assert_eq!(second.check_in_time, at(9, 5));
    assert_eq!(
        harness
            .store
            .attendance_for_shift(&tenant(), &shift_id)
            .expect("reads")
            .len(),
        1
    );
}

#[test]
fn missing_location_degrades_to_unverified() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(&tenant(), &ShiftId::new("shift-1"), &carer(), None, at(9, 5))
        .expect("check-in without location succeeds");

    assert_eq!(record.check_in_location, None);
    assert_eq!(
        record.check_in_verification,
        LocationVerification::Unverified {
            reason: UnverifiedReason::LocationUnavailable
        }
    );
    assert!(!record.out_of_geofence);
}

#[test]
fn evv_disabled_skips_distance_check() {
    let harness = harness();
    harness.register_client_home();
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(
            &tenant(),
            &ShiftId::new("shift-1"),
            &carer(),
            Some(reading_north_of_home(5_000.0)),
            at(9, 5),
        )
        .expect("check-in succeeds");

    assert_eq!(
        record.check_in_verification,
        LocationVerification::Unverified {
            reason: UnverifiedReason::EvvDisabled
        }
    );
    assert!(!record.out_of_geofence);
}

#[test]
fn coordinate_lookup_failure_is_not_an_error() {
    let harness = harness_with(|stores, _| stores.clients = Arc::new(UnavailableClients));
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(
            &tenant(),
            &ShiftId::new("shift-1"),
            &carer(),
            Some(reading_north_of_home(20.0)),
            at(9, 5),
        )
        .expect("check-in succeeds");

    assert_eq!(
        record.check_in_verification,
        LocationVerification::Unverified {
            reason: UnverifiedReason::CoordinateLookupFailed
        }
    );
}

#[test]
fn enforced_mode_rejects_out_of_range_without_side_effects() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::Enforced);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");

    let result = harness.services.attendance.check_in(
        &tenant(),
        &shift_id,
        &carer(),
        Some(reading_north_of_home(2_000.0)),
        at(9, 5),
    );

    assert!(matches!(result, Err(VisitError::Validation(_))));
    assert_eq!(harness.shift("shift-1").status, ShiftStatus::Scheduled);
    assert!(harness
        .store
        .attendance_for_shift(&tenant(), &shift_id)
        .expect("reads")
        .is_empty());
}

#[test]
fn enforced_mode_requires_client_coordinate() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::Enforced);
    harness.schedule("shift-1", CARER);

    let result = harness.services.attendance.check_in(
        &tenant(),
        &ShiftId::new("shift-1"),
        &carer(),
        Some(reading_north_of_home(20.0)),
        at(9, 5),
    );

    assert!(matches!(result, Err(VisitError::Configuration(_))));
}

#[test]
fn implausible_reading_is_flagged_unverified() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);

    let record = harness
        .services
        .attendance
        .check_in(
            &tenant(),
            &ShiftId::new("shift-1"),
            &carer(),
            Some(LocationReading {
                latitude: 123.0,
                longitude: 0.0,
                accuracy_meters: None,
            }),
            at(9, 5),
        )
        .expect("check-in succeeds");

    assert_eq!(
        record.check_in_verification,
        LocationVerification::Unverified {
            reason: UnverifiedReason::InvalidReading
        }
    );
}

#[test]
fn only_the_assigned_carer_checks_in() {
    let harness = harness();
    harness.schedule("shift-1", CARER);

    let result = harness.services.attendance.check_in(
        &tenant(),
        &ShiftId::new("shift-1"),
        &CarerId::new(OTHER_CARER),
        None,
        at(9, 5),
    );

    assert!(matches!(result, Err(VisitError::Authorization(_))));
    assert_eq!(harness.shift("shift-1").status, ShiftStatus::Scheduled);
}

#[test]
fn check_out_completes_the_shift() {
    let harness = harness();
    harness.enable_evv(GeofenceEnforcement::FailOpen);
    harness.register_client_home();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");
    let attendance = &harness.services.attendance;

    attendance
        .check_in(
            &tenant(),
            &shift_id,
            &carer(),
            Some(reading_north_of_home(30.0)),
            at(9, 5),
        )
        .expect("check-in");
    let record = attendance
        .check_out(
            &tenant(),
            &shift_id,
            &carer(),
            Some(reading_north_of_home(900.0)),
            at(16, 50),
        )
        .expect("check-out");

    assert_eq!(record.check_out_time, Some(at(16, 50)));
    assert!(record.check_out_time >= Some(record.check_in_time));
    assert!(record.out_of_geofence, "check-out outside radius is flagged");
    let shift = harness.shift("shift-1");
    assert_eq!(shift.status, ShiftStatus::Completed);
    assert_eq!(shift.actual_end, Some(at(16, 50)));
}

#[test]
fn check_out_without_check_in_conflicts() {
    let harness = harness();
    harness.schedule("shift-1", CARER);

    let result = harness.services.attendance.check_out(
        &tenant(),
        &ShiftId::new("shift-1"),
        &carer(),
        None,
        at(16, 50),
    );

    assert!(matches!(result, Err(VisitError::StateConflict(_))));
}

#[test]
fn second_check_out_conflicts() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness.complete("shift-1", at(9, 5), at(16, 50));

    let result = harness.services.attendance.check_out(
        &tenant(),
        &ShiftId::new("shift-1"),
        &carer(),
        None,
        at(16, 55),
    );

    assert!(matches!(result, Err(VisitError::StateConflict(_))));
}

#[test]
fn check_out_before_check_in_conflicts() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");
    harness
        .services
        .attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(9, 5))
        .expect("check-in");

    let result = harness
        .services
        .attendance
        .check_out(&tenant(), &shift_id, &carer(), None, at(9, 0));

    assert!(matches!(result, Err(VisitError::StateConflict(_))));
    assert_eq!(harness.shift("shift-1").status, ShiftStatus::InProgress);
}

#[test]
fn overnight_visit_checks_out_on_the_next_day() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");
    harness
        .services
        .attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(22, 0))
        .expect("check-in");

    let record = harness
        .services
        .attendance
        .check_out(&tenant(), &shift_id, &carer(), None, at(22, 0) + chrono::Duration::hours(6))
        .expect("check-out after midnight");

    assert_eq!(record.date, at(22, 0).date_naive());
    assert_eq!(harness.shift("shift-1").status, ShiftStatus::Completed);
}

#[test]
fn check_in_on_cancelled_shift_conflicts() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    harness
        .services
        .lifecycle
        .cancel(
            &tenant(),
            &ShiftId::new("shift-1"),
            &crate::workflows::visits::access::Requester::system(),
            &crate::workflows::visits::domain::ActorId::system(),
            at(8, 0),
        )
        .expect("cancelled");

    let result = harness.services.attendance.check_in(
        &tenant(),
        &ShiftId::new("shift-1"),
        &carer(),
        None,
        at(9, 5),
    );

    assert!(matches!(result, Err(VisitError::StateConflict(_))));
}

#[test]
fn cancellation_during_check_out_leaves_the_record_open() {
    let harness = harness_with(|stores, store| {
        stores.attendance = Arc::new(CancellingAttendance::over(store));
    });
    harness.schedule("s-race", CARER);
    let shift_id = ShiftId::new("s-race");
    harness
        .services
        .attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(9, 0))
        .expect("check-in");

    let result = harness
        .services
        .attendance
        .check_out(&tenant(), &shift_id, &carer(), None, at(16, 0));

    assert!(matches!(result, Err(VisitError::StateConflict(_))));
    assert_eq!(harness.shift("s-race").status, ShiftStatus::Cancelled);
    let record = harness
        .store
        .open_for_shift(&tenant(), &shift_id)
        .expect("store readable")
        .expect("record still open");
    assert_eq!(record.check_out_time, None);
}

#[test]
fn check_in_on_a_later_day_returns_the_open_record() {
    let harness = harness();
    harness.schedule("shift-1", CARER);
    let shift_id = ShiftId::new("shift-1");
    let first = harness
        .services
        .attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(22, 0))
        .expect("evening check-in");

    let again = harness
        .services
        .attendance
        .check_in(&tenant(), &shift_id, &carer(), None, at(22, 0) + chrono::Duration::hours(3))
        .expect("check-in after midnight");
    assert_eq!(again.id, first.id);
    assert_eq!(again.date, at(22, 0).date_naive());

    let closed = harness
        .services
        .attendance
        .check_out(&tenant(), &shift_id, &carer(), None, at(22, 0) + chrono::Duration::hours(6))
        .expect("check-out");
    assert_eq!(closed.id, first.id);
    assert!(harness
        .store
        .open_for_shift(&tenant(), &shift_id)
        .expect("store readable")
        .is_none());
}
