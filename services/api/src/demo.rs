use crate::infra::{in_memory_services, parse_date, parse_instant, LogNotificationPublisher};
use care_visit::config::{AppConfig, ComplianceConfig};
use care_visit::error::AppError;
use care_visit::telemetry;
use care_visit::workflows::visits::{
    AttendanceRecord, CarerId, ClientId, GeoPoint, GeofenceEnforcement, LocationReading,
    MemoryNotifier, Requester, Role, ShiftAssignment, ShiftId, TenantEvvConfig, TenantId,
    ThresholdRule, ThresholdRuleSet, VisitError, VisitNoteId, VisitNoteSubmission,
};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::Args;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_TENANT: &str = "riverbend-home-care";
const CLIENT_HOME: GeoPoint = GeoPoint {
    latitude: 41.5868,
    longitude: -93.625,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Visit day to simulate (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) day: Option<NaiveDate>,
    /// Reject check-ins outside the geofence instead of flagging them.
    #[arg(long)]
    pub(crate) enforce_geofence: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Tenant whose shifts are swept
    #[arg(long)]
    pub(crate) tenant: String,
    /// JSON array of shift assignments exported from the roster
    #[arg(long)]
    pub(crate) roster: PathBuf,
    /// Sweep instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let raw = std::fs::read_to_string(&args.roster)?;
    let roster: Vec<ShiftAssignment> = serde_json::from_str(&raw)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    let tenant = TenantId::new(args.tenant);
    let (_store, services) =
        in_memory_services(config.compliance, Arc::new(LogNotificationPublisher));
    for assignment in roster {
        services.lifecycle.schedule(&tenant, assignment)?;
    }

    let as_of = args.as_of.unwrap_or_else(Utc::now);
    let report = services.sweep.sweep_missed_shifts(&tenant, as_of)?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("Sweep report unavailable: {}", err),
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let day = args.day.unwrap_or_else(|| Local::now().date_naive());
    let at = |hour: u32, minute: u32| -> Result<DateTime<Utc>, AppError> {
        day.and_hms_opt(hour, minute, 0)
            .and_then(|naive| Utc.from_local_datetime(&naive).single())
            .ok_or_else(|| {
                AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{day} {hour:02}:{minute:02} is not a valid UTC instant"),
                ))
            })
    };

    let tenant = TenantId::new(DEMO_TENANT);
    let carer = CarerId::new("carer-ada");
    let client = ClientId::new("client-204");
    let notifier = MemoryNotifier::default();
    let (store, services) = in_memory_services(
        ComplianceConfig::default(),
        Arc::new(notifier.clone()),
    );

    println!("== Tenant setup ({})", DEMO_TENANT);
    let enforcement = if args.enforce_geofence {
        GeofenceEnforcement::Enforced
    } else {
        GeofenceEnforcement::FailOpen
    };
    let evv = services.tenant_config.update(
        &tenant,
        TenantEvvConfig {
            evv_enabled: true,
            default_geofence_radius: 150,
            enforcement,
        },
    )?;
    println!(
        "  EVV enabled, radius {}m, enforcement {:?}",
        evv.default_geofence_radius, evv.enforcement
    );
    store
        .register_client_coordinate(&tenant, &client, CLIENT_HOME)
        .map_err(VisitError::from)?;

    for (id, start, end) in [("visit-am", (9, 0), (11, 0)), ("visit-pm", (14, 0), (15, 0))] {
        services.lifecycle.schedule(
            &tenant,
            ShiftAssignment {
                shift_id: ShiftId::new(id),
                carer_id: carer.clone(),
                client_id: client.clone(),
                scheduled_start: at(start.0, start.1)?,
                scheduled_end: at(end.0, end.1)?,
            },
        )?;
        println!("  Scheduled {} for {}", id, carer);
    }

    println!("\n== Morning visit");
    let morning = ShiftId::new("visit-am");
    let doorstep = LocationReading {
        latitude: CLIENT_HOME.latitude + 0.0006,
        longitude: CLIENT_HOME.longitude,
        accuracy_meters: Some(12.0),
    };
    let check_in = services
        .attendance
        .check_in(&tenant, &morning, &carer, Some(doorstep), at(9, 4)?);
    match check_in {
        Ok(record) => print_attendance("Check-in", &record),
        Err(err) => {
            println!("  Check-in rejected: {}", err);
            return Ok(());
        }
    }
    let record = services
        .attendance
        .check_out(&tenant, &morning, &carer, None, at(10, 58)?)?;
    print_attendance("Check-out", &record);

    let mut rules = ThresholdRuleSet::new();
    rules.insert(
        "bloodPressureSystolic".to_string(),
        ThresholdRule {
            min: Some(90.0),
            max: Some(180.0),
            label: "Systolic BP".to_string(),
            message: Some("Escalate to the duty nurse".to_string()),
        },
    );
    let mut field_values = BTreeMap::new();
    field_values.insert("bloodPressureSystolic".to_string(), json!(210));
    field_values.insert("mood".to_string(), json!("cheerful"));
    let breaches = services.breaches.submit(
        &tenant,
        &Requester::new(Role::Carer, Some(carer.clone())),
        VisitNoteSubmission {
            visit_note_id: VisitNoteId::new("note-am"),
            shift_id: morning.clone(),
            field_values,
        },
        &rules,
        at(11, 5)?,
    )?;
    println!("  Visit note recorded with {} breach(es)", breaches.len());
    for breach in &breaches {
        println!(
            "    - {} = {} ({:?}) {}",
            breach.field_label,
            breach.value,
            breach.breach_type,
            breach.message.as_deref().unwrap_or("")
        );
    }

    println!("\n== Evening sweep");
    let report = services.sweep.sweep_missed_shifts(&tenant, at(18, 0)?)?;
    println!(
        "  transitioned={:?} already_handled={:?} failed={}",
        report
            .transitioned
            .iter()
            .map(ShiftId::as_str)
            .collect::<Vec<_>>(),
        report
            .already_handled
            .iter()
            .map(ShiftId::as_str)
            .collect::<Vec<_>>(),
        report.failed.len()
    );
    let late = services.attendance.check_in(
        &tenant,
        &ShiftId::new("visit-pm"),
        &carer,
        Some(doorstep),
        at(18, 1)?,
    );
    if let Err(err) = late {
        println!("  Late check-in refused: {}", err);
    }

    println!("\n== Documentation compliance");
    let lookback = services.compliance.note_lookback();
    let undocumented =
        services
            .scanner
            .find_undocumented(&tenant, lookback, &Requester::system(), at(20, 0)?)?;
    println!("  Undocumented visits: {}", undocumented.len());
    let reminders = services.reminders.dispatch(&tenant, lookback, at(20, 0)?)?;
    println!(
        "  Reminders sent: {}, failed: {}",
        reminders.notified.len(),
        reminders.failed.len()
    );
    for event in notifier.events() {
        println!("    - {} -> {:?}", event.event_type, event.recipient_ids);
    }

    Ok(())
}

fn print_attendance(label: &str, record: &AttendanceRecord) {
    match serde_json::to_string_pretty(record) {
        Ok(json) => println!("  {} payload:\n{}", label, json),
        Err(err) => println!("  {} payload unavailable: {}", label, err),
    }
    if record.out_of_geofence {
        println!("  Flagged for supervisor review: outside geofence");
    }
}
