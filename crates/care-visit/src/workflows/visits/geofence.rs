use super::domain::{
    GeoPoint, GeofenceEnforcement, LocationReading, LocationVerification, TenantEvvConfig,
    UnverifiedReason,
};
use super::error::VisitError;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates (haversine).
pub fn haversine_distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Client coordinate as seen by the attendance service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientCoordinate {
    Known(GeoPoint),
    Missing,
    LookupFailed,
}

/// Applies the tenant's geofence policy to one reported location.
///
/// Under `FailOpen` this never fails: anything that prevents a check is reported as
/// `Unverified`, and an out-of-range location is flagged. `Enforced` turns those
/// outcomes into errors.
pub fn verify_location(
    config: &TenantEvvConfig,
    client: ClientCoordinate,
    reading: Option<&LocationReading>,
) -> Result<LocationVerification, VisitError> {
    let verdict = assess(config, client, reading);

    if config.enforcement == GeofenceEnforcement::FailOpen {
        return Ok(verdict);
    }

    match verdict {
        LocationVerification::Verified { .. } => Ok(verdict),
        LocationVerification::OutsideGeofence {
            distance_meters,
            radius_meters,
        } => Err(VisitError::Validation(format!(
            "location is {distance_meters:.0}m from the client address, beyond the \
             {radius_meters}m geofence"
        ))),
        LocationVerification::Unverified { reason } => Err(match reason {
            UnverifiedReason::EvvDisabled => VisitError::Configuration(
                "geofence enforcement requested but EVV is disabled for this tenant".to_string(),
            ),
            UnverifiedReason::ClientCoordinateMissing => VisitError::Configuration(
                "geofence enforcement requested but the client has no registered coordinate"
                    .to_string(),
            ),
            UnverifiedReason::CoordinateLookupFailed => VisitError::Configuration(
                "client coordinate could not be loaded for geofence enforcement".to_string(),
            ),
            UnverifiedReason::LocationUnavailable => {
                VisitError::Validation("a location is required for this check-in".to_string())
            }
            UnverifiedReason::InvalidReading => VisitError::Validation(
                "reported location is outside valid latitude/longitude ranges".to_string(),
            ),
        }),
    }
}

fn assess(
    config: &TenantEvvConfig,
    client: ClientCoordinate,
    reading: Option<&LocationReading>,
) -> LocationVerification {
    let unverified = |reason| LocationVerification::Unverified { reason };

    if !config.evv_enabled {
        return unverified(UnverifiedReason::EvvDisabled);
    }

    let reading = match reading {
        Some(reading) if reading.is_plausible() => reading,
        Some(_) => return unverified(UnverifiedReason::InvalidReading),
        None => return unverified(UnverifiedReason::LocationUnavailable),
    };

    let client = match client {
        ClientCoordinate::Known(point) => point,
        ClientCoordinate::Missing => return unverified(UnverifiedReason::ClientCoordinateMissing),
        ClientCoordinate::LookupFailed => {
            return unverified(UnverifiedReason::CoordinateLookupFailed)
        }
    };

    let distance_meters = haversine_distance_meters(reading.point(), client);
    let radius_meters = config.default_geofence_radius;
    if distance_meters > radius_meters as f64 {
        LocationVerification::OutsideGeofence {
            distance_meters,
            radius_meters,
        }
    } else {
        LocationVerification::Verified { distance_meters }
    }
}
