use crate::cli::ServeArgs;
use crate::infra::{in_memory_services, AppState, LogNotificationPublisher};
use crate::routes::with_visit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use care_visit::config::AppConfig;
use care_visit::error::AppError;
use care_visit::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply_to(&mut config.server);
    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (_store, services) = in_memory_services(
        config.compliance.clone(),
        Arc::new(LogNotificationPublisher),
    );
    let app = with_visit_routes(services)
        .layer(Extension(state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        note_lookback_hours = config.compliance.note_lookback_hours,
        "care visit service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
