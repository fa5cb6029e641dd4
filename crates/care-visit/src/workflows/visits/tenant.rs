use std::sync::Arc;

use tracing::info;

use super::domain::{
    TenantEvvConfig, TenantId, MAX_GEOFENCE_RADIUS_METERS, MIN_GEOFENCE_RADIUS_METERS,
};
use super::error::VisitError;
use super::repository::TenantConfigStore;

impl TenantEvvConfig {
    pub fn validate(&self) -> Result<(), VisitError> {
        let radius = self.default_geofence_radius;
        if !(MIN_GEOFENCE_RADIUS_METERS..=MAX_GEOFENCE_RADIUS_METERS).contains(&radius) {
            return Err(VisitError::Validation(format!(
                "geofence radius must be between {MIN_GEOFENCE_RADIUS_METERS} and \
                 {MAX_GEOFENCE_RADIUS_METERS} meters (got {radius})"
            )));
        }
        Ok(())
    }
}

/// Reads EVV settings fresh on every call; tenants can change them between requests.
pub struct TenantConfigProvider {
    store: Arc<dyn TenantConfigStore>,
}

impl TenantConfigProvider {
    pub fn new(store: Arc<dyn TenantConfigStore>) -> Self {
        Self { store }
    }

    /// Stored settings, or the defaults for tenants that never configured EVV.
    pub fn get(&self, tenant: &TenantId) -> Result<TenantEvvConfig, VisitError> {
        Ok(self.store.fetch_config(tenant)?.unwrap_or_default())
    }

    pub fn update(
        &self,
        tenant: &TenantId,
        config: TenantEvvConfig,
    ) -> Result<TenantEvvConfig, VisitError> {
        config.validate()?;
        self.store.save_config(tenant, config)?;
        info!(
            tenant = %tenant,
            evv_enabled = config.evv_enabled,
            radius = config.default_geofence_radius,
            enforcement = ?config.enforcement,
            "tenant evv settings updated"
        );
        Ok(config)
    }
}
