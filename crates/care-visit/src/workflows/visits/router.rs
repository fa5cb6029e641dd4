use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::access::{Requester, Role};
use super::domain::{
    ActorId, CarerId, LocationReading, ShiftAssignment, ShiftId, TemplateId, TenantEvvConfig,
    TenantId, ThresholdRuleSet, VisitNoteId, VisitNoteSubmission,
};
use super::error::VisitError;
use super::service::VisitServices;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";
pub const ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing the visit workflows over HTTP.
pub fn visit_router(services: Arc<VisitServices>) -> Router {
    Router::new()
        .route("/api/v1/shifts", post(schedule_handler))
        .route("/api/v1/shifts/:shift_id", get(shift_handler))
        .route("/api/v1/shifts/:shift_id/check-in", post(check_in_handler))
        .route("/api/v1/shifts/:shift_id/check-out", post(check_out_handler))
        .route("/api/v1/shifts/:shift_id/cancel", post(cancel_handler))
        .route("/api/v1/visit-notes", post(visit_note_handler))
        .route("/api/v1/compliance/undocumented", get(undocumented_handler))
        .route("/api/v1/reminders/missing-notes", post(reminder_handler))
        .route("/api/v1/sweeps/missed-shifts", post(sweep_handler))
        .route(
            "/api/v1/tenant/evv-config",
            get(evv_config_handler).put(update_evv_config_handler),
        )
        .with_state(services)
}

impl VisitError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VisitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            VisitError::Authorization(_) => StatusCode::FORBIDDEN,
            VisitError::NotFound { .. } => StatusCode::NOT_FOUND,
            VisitError::StateConflict(_) => StatusCode::CONFLICT,
            VisitError::Configuration(_) => StatusCode::PRECONDITION_FAILED,
            VisitError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VisitError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "visit request failed");
        }
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

/// Caller identity resolved by the upstream session layer and forwarded as headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant: TenantId,
    pub actor: ActorId,
    pub role: Role,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, VisitError> {
        let tenant = required_header(headers, TENANT_HEADER)?;
        let actor = required_header(headers, ACTOR_HEADER)?;
        let raw_role = required_header(headers, ROLE_HEADER)?;
        let role = Role::parse(raw_role)
            .ok_or_else(|| VisitError::Authorization(format!("unknown role '{raw_role}'")))?;

        Ok(Self {
            tenant: TenantId::new(tenant),
            actor: ActorId::new(actor),
            role,
        })
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.role, Some(self.carer()))
    }

    fn carer(&self) -> CarerId {
        CarerId::new(self.actor.as_str())
    }

    /// Check-in and check-out are performed by the assigned carer only.
    fn acting_carer(&self) -> Result<CarerId, VisitError> {
        if self.role != Role::Carer {
            return Err(VisitError::Authorization(format!(
                "role {} cannot record attendance",
                self.role
            )));
        }
        Ok(self.carer())
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, VisitError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| VisitError::Validation(format!("missing {name} header")))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocationPayload {
    #[serde(default)]
    location: Option<LocationReading>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisitNotePayload {
    visit_note_id: VisitNoteId,
    shift_id: ShiftId,
    #[serde(default)]
    field_values: std::collections::BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    template_id: Option<TemplateId>,
    #[serde(default)]
    rules: Option<ThresholdRuleSet>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LookbackQuery {
    lookback_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepPayload {
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
}

pub(crate) async fn schedule_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Json(assignment): Json<ShiftAssignment>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    ctx.requester().ensure_manages_schedule()?;
    let shift = services.lifecycle.schedule(&ctx.tenant, assignment)?;
    Ok((StatusCode::CREATED, Json(shift)).into_response())
}

pub(crate) async fn shift_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Path(shift_id): Path<String>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let shift = services.lifecycle.get(&ctx.tenant, &ShiftId(shift_id))?;
    if !ctx.requester().can_access(&shift.carer_id) {
        return Err(VisitError::Authorization(format!(
            "{} cannot view shift {}",
            ctx.role, shift.id
        )));
    }
    Ok((StatusCode::OK, Json(shift)).into_response())
}

pub(crate) async fn check_in_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Path(shift_id): Path<String>,
    Json(payload): Json<LocationPayload>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let carer = ctx.acting_carer()?;
    let record = services.attendance.check_in(
        &ctx.tenant,
        &ShiftId(shift_id),
        &carer,
        payload.location,
        Utc::now(),
    )?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub(crate) async fn check_out_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Path(shift_id): Path<String>,
    Json(payload): Json<LocationPayload>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let carer = ctx.acting_carer()?;
    let record = services.attendance.check_out(
        &ctx.tenant,
        &ShiftId(shift_id),
        &carer,
        payload.location,
        Utc::now(),
    )?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub(crate) async fn cancel_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Path(shift_id): Path<String>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let shift = services.lifecycle.cancel(
        &ctx.tenant,
        &ShiftId(shift_id),
        &ctx.requester(),
        &ctx.actor,
        Utc::now(),
    )?;
    Ok((StatusCode::OK, Json(shift)).into_response())
}

pub(crate) async fn visit_note_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Json(payload): Json<VisitNotePayload>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let requester = ctx.requester();
    let submission = VisitNoteSubmission {
        visit_note_id: payload.visit_note_id,
        shift_id: payload.shift_id,
        field_values: payload.field_values,
    };
    let note_id = submission.visit_note_id.clone();
    let now = Utc::now();

    let breaches = match (payload.template_id, payload.rules) {
        (Some(template), _) => services.breaches.submit_with_template(
            &ctx.tenant,
            &requester,
            submission,
            &template,
            now,
        )?,
        (None, rules) => services.breaches.submit(
            &ctx.tenant,
            &requester,
            submission,
            &rules.unwrap_or_default(),
            now,
        )?,
    };

    let payload = json!({
        "visit_note_id": note_id,
        "breaches": breaches,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

impl LookbackQuery {
    fn lookback(&self, services: &VisitServices) -> Result<Duration, VisitError> {
        match self.lookback_hours {
            Some(hours) => Duration::try_hours(hours).ok_or_else(|| {
                VisitError::Validation(format!("lookback of {hours} hours is out of range"))
            }),
            None => Ok(services.compliance.note_lookback()),
        }
    }
}

pub(crate) async fn undocumented_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Query(query): Query<LookbackQuery>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let lookback = query.lookback(&services)?;
    let shifts =
        services
            .scanner
            .find_undocumented(&ctx.tenant, lookback, &ctx.requester(), Utc::now())?;
    Ok((StatusCode::OK, Json(shifts)).into_response())
}

pub(crate) async fn reminder_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Query(query): Query<LookbackQuery>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    ctx.requester().ensure_manages_schedule()?;
    let lookback = query.lookback(&services)?;
    let report = services
        .reminders
        .dispatch(&ctx.tenant, lookback, Utc::now())?;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub(crate) async fn sweep_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Json(payload): Json<SweepPayload>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    ctx.requester().ensure_manages_schedule()?;
    let as_of = payload.as_of.unwrap_or_else(Utc::now);
    let report = services.sweep.sweep_missed_shifts(&ctx.tenant, as_of)?;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub(crate) async fn evv_config_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let config = services.tenant_config.get(&ctx.tenant)?;
    Ok((StatusCode::OK, Json(config)).into_response())
}

pub(crate) async fn update_evv_config_handler(
    State(services): State<Arc<VisitServices>>,
    headers: HeaderMap,
    Json(config): Json<TenantEvvConfig>,
) -> Result<Response, VisitError> {
    let ctx = RequestContext::from_headers(&headers)?;
    if !matches!(ctx.role, Role::Admin | Role::Manager) {
        return Err(VisitError::Authorization(format!(
            "role {} cannot change evv settings",
            ctx.role
        )));
    }
    let saved = services.tenant_config.update(&ctx.tenant, config)?;
    Ok((StatusCode::OK, Json(saved)).into_response())
}
