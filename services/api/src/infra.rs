use care_visit::config::ComplianceConfig;
use care_visit::workflows::visits::{
    MemoryStore, Notification, NotificationPublisher, NotifyError, VisitServices,
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivery adapter for deployments without a messaging backend: notifications go to the log.
#[derive(Default, Clone)]
pub(crate) struct LogNotificationPublisher;

impl NotificationPublisher for LogNotificationPublisher {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            event_type = %notification.event_type,
            recipients = ?notification.recipient_ids,
            data = ?notification.data,
            "notification dispatched"
        );
        Ok(())
    }
}

pub(crate) fn in_memory_services(
    compliance: ComplianceConfig,
    publisher: Arc<dyn NotificationPublisher>,
) -> (MemoryStore, Arc<VisitServices>) {
    let store = MemoryStore::default();
    let services = Arc::new(VisitServices::in_memory(&store, publisher, compliance));
    (store, services)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
