/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::common::types::*;
use crate::tools::error::AppError;

/// Persistence port for the tracking domain.
///
/// All write paths that belong to one ping (location log, trip mutation,
/// events, pickup mutation) are invoked under the per-trip lock from
/// [`TripLockRegistry`], which is this service's row-lock / transaction
/// boundary; implementations only need each individual operation to be
/// atomic. Tests inject fakes through this trait.
#[async_trait]
pub trait TrackingStorage: Send + Sync {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, AppError>;
    async fn vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>, AppError>;
    async fn create_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, AppError>;

    async fn driver_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Driver>, AppError>;
    async fn create_driver(&self, driver: Driver) -> Result<Driver, AppError>;

    async fn list_trips(&self) -> Result<Vec<Trip>, AppError>;
    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>, AppError>;
    /// Snapshot read for mutation. The caller must hold the trip's lock from
    /// [`TripLockRegistry`] until the matching [`save_trip`] completes.
    ///
    /// [`save_trip`]: TrackingStorage::save_trip
    async fn trip_for_update(&self, trip_id: TripId) -> Result<Option<Trip>, AppError>;
    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError>;
    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError>;

    async fn list_pickups(&self) -> Result<Vec<PickupPoint>, AppError>;
    async fn pickups_for_trip(&self, trip_id: TripId) -> Result<Vec<PickupPoint>, AppError>;
    async fn create_pickup(&self, pickup: PickupPoint) -> Result<PickupPoint, AppError>;
    async fn set_pickup_status(
        &self,
        pickup_id: PickupPointId,
        status: PickupStatus,
    ) -> Result<(), AppError>;

    async fn list_geofences(&self) -> Result<Vec<OfficeGeofence>, AppError>;
    async fn geofence(&self, geofence_id: GeofenceId) -> Result<Option<OfficeGeofence>, AppError>;
    async fn create_geofence(&self, geofence: OfficeGeofence) -> Result<OfficeGeofence, AppError>;
    async fn update_geofence(
        &self,
        geofence: OfficeGeofence,
    ) -> Result<Option<OfficeGeofence>, AppError>;
    async fn delete_geofence(&self, geofence_id: GeofenceId) -> Result<bool, AppError>;

    /// Insert-only ping history.
    async fn append_location(&self, log: LocationLog) -> Result<LocationLog, AppError>;
    /// Most recent log for the trip by device timestamp.
    async fn latest_location(&self, trip_id: TripId) -> Result<Option<LocationLog>, AppError>;
    async fn locations_for_trip(&self, trip_id: TripId) -> Result<Vec<LocationLog>, AppError>;
    async fn list_locations(&self) -> Result<Vec<LocationLog>, AppError>;
    async fn delete_locations_for_trip(&self, trip_id: TripId) -> Result<(), AppError>;

    /// Insert-only audit write; stamps `created_at` with the server clock.
    async fn save_event(&self, event: EventLog) -> Result<EventLog, AppError>;
    async fn exists_event(
        &self,
        trip_id: TripId,
        kind: GeofenceEventType,
    ) -> Result<bool, AppError>;
    /// Oldest first.
    async fn events_by_trip(&self, trip_id: TripId) -> Result<Vec<EventLog>, AppError>;
    /// Newest first.
    async fn events_by_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<EventLog>, AppError>;
    /// Inclusive range over `event_timestamp`, oldest first.
    async fn events_by_time_range(
        &self,
        from: TimeStamp,
        to: TimeStamp,
    ) -> Result<Vec<EventLog>, AppError>;
    async fn list_events(&self) -> Result<Vec<EventLog>, AppError>;
    async fn delete_events_for_trip(&self, trip_id: TripId) -> Result<(), AppError>;
}

/// One async mutex per trip id: the serialization point for all trip
/// mutation. Two pings against the same trip are totally ordered by
/// acquisition here; pings against different trips never contend.
#[derive(Clone, Default)]
pub struct TripLockRegistry {
    locks: Arc<Mutex<HashMap<TripId, Arc<Mutex<()>>>>>,
}

impl TripLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, trip_id: TripId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(trip_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
