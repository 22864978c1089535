use serde::{Deserialize, Serialize};

use crate::common::types::*;

/// One GPS ping. `timestamp` is the device clock; it orders batches and the
/// location trail, but never feeds dwell arithmetic or audit stamps.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateRequest {
    pub vehicle_id: VehicleId,
    pub trip_id: TripId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub speed: SpeedKmh,
    pub timestamp: TimeStamp,
}

impl LocationUpdateRequest {
    pub fn point(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// Outcome of a buffered-batch replay; failed pings are logged, not retried.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}
