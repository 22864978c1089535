use serde::{Deserialize, Serialize};

use crate::common::types::*;

/// Create/update payload for an office geofence.
///
/// CIRCULAR needs only the centre and radius; POLYGON additionally needs
/// `polygon` as `[[lat, lon], ...]` with at least 3 vertices (centre and
/// radius are kept as a display reference).
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OfficeGeofenceRequest {
    pub name: Option<String>,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub radius_meters: f64,
    pub shape: Option<GeofenceShape>,
    pub polygon: Option<Vec<(Latitude, Longitude)>>,
}

impl OfficeGeofenceRequest {
    pub fn shape(&self) -> GeofenceShape {
        self.shape.unwrap_or(GeofenceShape::Circular)
    }

    pub fn polygon_points(&self) -> Vec<Point> {
        self.polygon
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|(lat, lon)| Point {
                lat: *lat,
                lon: *lon,
            })
            .collect()
    }
}
