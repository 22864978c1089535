/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::{Arc, RwLock};

use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::common::geometry;

pub type VehicleId = i64;
pub type DriverId = i64;
pub type TripId = i64;
pub type PickupPointId = i64;
pub type GeofenceId = i64;
pub type EventId = i64;
pub type LocationLogId = i64;
pub type Latitude = f64;
pub type Longitude = f64;
pub type SpeedKmh = f64;
/// Wall-clock instants carry no zone; the wire format is ISO-8601 local
/// datetime (`yyyy-MM-ddTHH:mm:ss`).
pub type TimeStamp = NaiveDateTime;

#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickupStatus {
    Pending,
    Arrived,
}

#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofenceShape {
    Circular,
    Polygon,
}

/// Closed set of audit event kinds written to the event log.
///
/// `TRIP_STARTED` / `TRIP_RESET` lifecycle notifications are bus-only and do
/// not appear here.
#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofenceEventType {
    PickupArrived,
    OfficeReached,
    TripCompleted,
    GeofenceExit,
    ManualClosure,
    ManualClosureOutsideGeofence,
    AdminAlert,
    TripClosureBlockedPendingPickups,
    TripClosureBlockedMinDuration,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

#[derive(Debug, Serialize)]
pub struct APISuccess {
    result: String,
}

impl Default for APISuccess {
    fn default() -> Self {
        Self {
            result: "success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub registration_number: String,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub phone_number: String,
    pub license_number: String,
    pub vehicle_id: Option<VehicleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfficeGeofence {
    pub id: GeofenceId,
    pub name: Option<String>,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub radius_meters: f64,
    pub shape: GeofenceShape,
    /// Boundary vertices, used only when `shape` is `POLYGON`.
    pub polygon: Vec<Point>,
}

impl OfficeGeofence {
    pub fn centre(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        match self.shape {
            GeofenceShape::Circular => {
                geometry::is_within_radius(point, &self.centre(), self.radius_meters)
            }
            GeofenceShape::Polygon => geometry::is_inside_polygon(point, &self.polygon),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub trip_id: TripId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub radius_meters: f64,
    pub status: PickupStatus,
}

impl PickupPoint {
    pub fn centre(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub status: TripStatus,
    pub start_time: Option<TimeStamp>,
    pub end_time: Option<TimeStamp>,
    pub total_distance_km: f64,
    pub duration_minutes: Option<i64>,
    /// Dwell anchor: set on the first in-fence ping, cleared on exit and on
    /// every path that leaves `IN_PROGRESS`.
    pub office_entry_time: Option<TimeStamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationLog {
    pub id: LocationLogId,
    pub vehicle_id: VehicleId,
    pub trip_id: TripId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub speed: SpeedKmh,
    /// Device clock. Never used as the engine's `now`.
    pub timestamp: TimeStamp,
}

impl LocationLog {
    pub fn point(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub id: EventId,
    pub vehicle_id: VehicleId,
    pub trip_id: Option<TripId>,
    pub event_type: GeofenceEventType,
    pub latitude: Latitude,
    pub longitude: Longitude,
    /// Server clock at the moment the engine evaluated, never device time.
    pub event_timestamp: TimeStamp,
    /// Server clock at insert, stamped by the store.
    pub created_at: Option<TimeStamp>,
}

/// Source of the server clock used for dwell arithmetic and audit stamps.
///
/// `Manual` exists so tests can step time deterministically; production code
/// always runs on `System`.
#[derive(Clone)]
pub enum Clock {
    System,
    Manual(Arc<RwLock<TimeStamp>>),
}

impl Clock {
    pub fn manual(start: TimeStamp) -> Clock {
        Clock::Manual(Arc::new(RwLock::new(start)))
    }

    pub fn now(&self) -> TimeStamp {
        match self {
            Clock::System => Utc::now().naive_utc(),
            Clock::Manual(instant) => *instant.read().expect("clock lock poisoned"),
        }
    }

    /// Steps a manual clock forward; a no-op on the system clock.
    pub fn advance(&self, delta: Duration) {
        if let Clock::Manual(instant) = self {
            let mut guard = instant.write().expect("clock lock poisoned");
            *guard += delta;
        }
    }
}
