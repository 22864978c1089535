/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::Serialize;
use tokio::sync::broadcast;

use crate::common::types::*;

/// Every accepted ping, published after the trip mutation commits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationBroadcast {
    pub vehicle_id: VehicleId,
    pub trip_id: TripId,
    pub vehicle_reg: String,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub speed: SpeedKmh,
    pub timestamp: TimeStamp,
    pub trip_status: TripStatus,
    pub total_distance_km: f64,
}

/// Typed geofence transitions plus the `TRIP_STARTED` / `TRIP_RESET`
/// lifecycle notifications from the admin surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceBroadcast {
    pub event_type: String,
    pub vehicle_id: VehicleId,
    pub trip_id: TripId,
    pub vehicle_reg: String,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub timestamp: TimeStamp,
}

pub const TRIP_STARTED: &str = "TRIP_STARTED";
pub const TRIP_RESET: &str = "TRIP_RESET";

/// In-process fan-out to live dashboards.
///
/// Broadcast semantics: every current subscriber sees every future message,
/// lagging subscribers lose the oldest messages instead of blocking
/// publishers, and nothing is retained for late joiners.
#[derive(Clone)]
pub struct EventBus {
    location_tx: broadcast::Sender<LocationBroadcast>,
    geofence_tx: broadcast::Sender<GeofenceBroadcast>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (location_tx, _) = broadcast::channel(capacity);
        let (geofence_tx, _) = broadcast::channel(capacity);
        Self {
            location_tx,
            geofence_tx,
        }
    }

    pub fn publish_location(&self, update: LocationBroadcast) {
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.location_tx.send(update);
    }

    pub fn publish_geofence(&self, event: GeofenceBroadcast) {
        let _ = self.geofence_tx.send(event);
    }

    pub fn subscribe_locations(&self) -> broadcast::Receiver<LocationBroadcast> {
        self.location_tx.subscribe()
    }

    pub fn subscribe_geofence_events(&self) -> broadcast::Receiver<GeofenceBroadcast> {
        self.geofence_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
