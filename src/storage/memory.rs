/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::TrackingStorage;
use crate::common::types::*;
use crate::tools::error::AppError;

/// In-process storage backend.
///
/// Each table is a `RwLock`-guarded map keyed by id; ids are handed out by
/// per-table counters. Individual operations are atomic; cross-operation
/// consistency for a trip comes from the coordinator's per-trip lock.
#[derive(Default)]
pub struct MemoryStorage {
    vehicles: Arc<RwLock<HashMap<VehicleId, Vehicle>>>,
    drivers: Arc<RwLock<HashMap<DriverId, Driver>>>,
    trips: Arc<RwLock<HashMap<TripId, Trip>>>,
    pickups: Arc<RwLock<HashMap<PickupPointId, PickupPoint>>>,
    geofences: Arc<RwLock<HashMap<GeofenceId, OfficeGeofence>>>,
    locations: Arc<RwLock<Vec<LocationLog>>>,
    events: Arc<RwLock<Vec<EventLog>>>,
    next_vehicle_id: AtomicI64,
    next_driver_id: AtomicI64,
    next_trip_id: AtomicI64,
    next_pickup_id: AtomicI64,
    next_geofence_id: AtomicI64,
    next_location_id: AtomicI64,
    next_event_id: AtomicI64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl TrackingStorage for MemoryStorage {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, AppError> {
        let mut vehicles: Vec<Vehicle> = self.vehicles.read().await.values().cloned().collect();
        vehicles.sort_by_key(|vehicle| vehicle.id);
        Ok(vehicles)
    }

    async fn vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>, AppError> {
        Ok(self.vehicles.read().await.get(&vehicle_id).cloned())
    }

    async fn create_vehicle(&self, mut vehicle: Vehicle) -> Result<Vehicle, AppError> {
        vehicle.id = Self::next_id(&self.next_vehicle_id);
        self.vehicles.write().await.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn driver_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Driver>, AppError> {
        Ok(self
            .drivers
            .read()
            .await
            .values()
            .find(|driver| driver.vehicle_id == Some(vehicle_id))
            .cloned())
    }

    async fn create_driver(&self, mut driver: Driver) -> Result<Driver, AppError> {
        driver.id = Self::next_id(&self.next_driver_id);
        self.drivers.write().await.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        let mut trips: Vec<Trip> = self.trips.read().await.values().cloned().collect();
        trips.sort_by_key(|trip| trip.id);
        Ok(trips)
    }

    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>, AppError> {
        Ok(self.trips.read().await.get(&trip_id).cloned())
    }

    async fn trip_for_update(&self, trip_id: TripId) -> Result<Option<Trip>, AppError> {
        self.trip(trip_id).await
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut trips = self.trips.write().await;
        if !trips.contains_key(&trip.id) {
            return Err(AppError::StorageError(format!(
                "cannot save unknown trip {}",
                trip.id
            )));
        }
        trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn create_trip(&self, mut trip: Trip) -> Result<Trip, AppError> {
        trip.id = Self::next_id(&self.next_trip_id);
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn list_pickups(&self) -> Result<Vec<PickupPoint>, AppError> {
        let mut pickups: Vec<PickupPoint> = self.pickups.read().await.values().cloned().collect();
        pickups.sort_by_key(|pickup| pickup.id);
        Ok(pickups)
    }

    async fn pickups_for_trip(&self, trip_id: TripId) -> Result<Vec<PickupPoint>, AppError> {
        let mut pickups: Vec<PickupPoint> = self
            .pickups
            .read()
            .await
            .values()
            .filter(|pickup| pickup.trip_id == trip_id)
            .cloned()
            .collect();
        pickups.sort_by_key(|pickup| pickup.id);
        Ok(pickups)
    }

    async fn create_pickup(&self, mut pickup: PickupPoint) -> Result<PickupPoint, AppError> {
        pickup.id = Self::next_id(&self.next_pickup_id);
        self.pickups.write().await.insert(pickup.id, pickup.clone());
        Ok(pickup)
    }

    async fn set_pickup_status(
        &self,
        pickup_id: PickupPointId,
        status: PickupStatus,
    ) -> Result<(), AppError> {
        let mut pickups = self.pickups.write().await;
        match pickups.get_mut(&pickup_id) {
            Some(pickup) => {
                pickup.status = status;
                Ok(())
            }
            None => Err(AppError::StorageError(format!(
                "cannot update unknown pickup point {pickup_id}"
            ))),
        }
    }

    async fn list_geofences(&self) -> Result<Vec<OfficeGeofence>, AppError> {
        let mut geofences: Vec<OfficeGeofence> =
            self.geofences.read().await.values().cloned().collect();
        geofences.sort_by_key(|geofence| geofence.id);
        Ok(geofences)
    }

    async fn geofence(&self, geofence_id: GeofenceId) -> Result<Option<OfficeGeofence>, AppError> {
        Ok(self.geofences.read().await.get(&geofence_id).cloned())
    }

    async fn create_geofence(
        &self,
        mut geofence: OfficeGeofence,
    ) -> Result<OfficeGeofence, AppError> {
        geofence.id = Self::next_id(&self.next_geofence_id);
        self.geofences
            .write()
            .await
            .insert(geofence.id, geofence.clone());
        Ok(geofence)
    }

    async fn update_geofence(
        &self,
        geofence: OfficeGeofence,
    ) -> Result<Option<OfficeGeofence>, AppError> {
        let mut geofences = self.geofences.write().await;
        if !geofences.contains_key(&geofence.id) {
            return Ok(None);
        }
        geofences.insert(geofence.id, geofence.clone());
        Ok(Some(geofence))
    }

    async fn delete_geofence(&self, geofence_id: GeofenceId) -> Result<bool, AppError> {
        Ok(self.geofences.write().await.remove(&geofence_id).is_some())
    }

    async fn append_location(&self, mut log: LocationLog) -> Result<LocationLog, AppError> {
        log.id = Self::next_id(&self.next_location_id);
        self.locations.write().await.push(log.clone());
        Ok(log)
    }

    async fn latest_location(&self, trip_id: TripId) -> Result<Option<LocationLog>, AppError> {
        Ok(self
            .locations
            .read()
            .await
            .iter()
            .filter(|log| log.trip_id == trip_id)
            .max_by_key(|log| (log.timestamp, log.id))
            .cloned())
    }

    async fn locations_for_trip(&self, trip_id: TripId) -> Result<Vec<LocationLog>, AppError> {
        let mut logs: Vec<LocationLog> = self
            .locations
            .read()
            .await
            .iter()
            .filter(|log| log.trip_id == trip_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.timestamp, log.id));
        Ok(logs)
    }

    async fn list_locations(&self) -> Result<Vec<LocationLog>, AppError> {
        let mut logs: Vec<LocationLog> = self.locations.read().await.clone();
        logs.sort_by_key(|log| (log.timestamp, log.id));
        Ok(logs)
    }

    async fn delete_locations_for_trip(&self, trip_id: TripId) -> Result<(), AppError> {
        self.locations
            .write()
            .await
            .retain(|log| log.trip_id != trip_id);
        Ok(())
    }

    async fn save_event(&self, mut event: EventLog) -> Result<EventLog, AppError> {
        event.id = Self::next_id(&self.next_event_id);
        event.created_at = Some(Utc::now().naive_utc());
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn exists_event(
        &self,
        trip_id: TripId,
        kind: GeofenceEventType,
    ) -> Result<bool, AppError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .any(|event| event.trip_id == Some(trip_id) && event.event_type == kind))
    }

    async fn events_by_trip(&self, trip_id: TripId) -> Result<Vec<EventLog>, AppError> {
        let mut events: Vec<EventLog> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| event.trip_id == Some(trip_id))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.event_timestamp, event.id));
        Ok(events)
    }

    async fn events_by_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<EventLog>, AppError> {
        let mut events: Vec<EventLog> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| event.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| (std::cmp::Reverse(event.event_timestamp), std::cmp::Reverse(event.id)));
        Ok(events)
    }

    async fn events_by_time_range(
        &self,
        from: TimeStamp,
        to: TimeStamp,
    ) -> Result<Vec<EventLog>, AppError> {
        let mut events: Vec<EventLog> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| event.event_timestamp >= from && event.event_timestamp <= to)
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.event_timestamp, event.id));
        Ok(events)
    }

    async fn list_events(&self) -> Result<Vec<EventLog>, AppError> {
        let mut events: Vec<EventLog> = self.events.read().await.clone();
        events.sort_by_key(|event| (std::cmp::Reverse(event.event_timestamp), std::cmp::Reverse(event.id)));
        Ok(events)
    }

    async fn delete_events_for_trip(&self, trip_id: TripId) -> Result<(), AppError> {
        self.events
            .write()
            .await
            .retain(|event| event.trip_id != Some(trip_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32, minute: u32, second: u32) -> TimeStamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn event(trip_id: TripId, kind: GeofenceEventType, at: TimeStamp) -> EventLog {
        EventLog {
            id: 0,
            vehicle_id: 1,
            trip_id: Some(trip_id),
            event_type: kind,
            latitude: 12.9716,
            longitude: 77.5946,
            event_timestamp: at,
            created_at: None,
        }
    }

    fn log(trip_id: TripId, at: TimeStamp) -> LocationLog {
        LocationLog {
            id: 0,
            vehicle_id: 1,
            trip_id,
            latitude: 12.9716,
            longitude: 77.5946,
            speed: 10.0,
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn save_event_assigns_id_and_stamps_created_at() {
        let storage = MemoryStorage::new();

        let saved = storage
            .save_event(event(1, GeofenceEventType::PickupArrived, ts(8, 0, 0)))
            .await
            .expect("save failed");

        assert_eq!(saved.id, 1);
        assert!(saved.created_at.is_some());
        assert!(storage
            .exists_event(1, GeofenceEventType::PickupArrived)
            .await
            .unwrap());
        assert!(!storage
            .exists_event(1, GeofenceEventType::OfficeReached)
            .await
            .unwrap());
        assert!(!storage
            .exists_event(2, GeofenceEventType::PickupArrived)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn event_projections_are_ordered() {
        let storage = MemoryStorage::new();
        storage
            .save_event(event(1, GeofenceEventType::OfficeReached, ts(9, 0, 0)))
            .await
            .unwrap();
        storage
            .save_event(event(1, GeofenceEventType::PickupArrived, ts(8, 0, 0)))
            .await
            .unwrap();
        storage
            .save_event(event(2, GeofenceEventType::PickupArrived, ts(8, 30, 0)))
            .await
            .unwrap();

        let by_trip = storage.events_by_trip(1).await.unwrap();
        assert_eq!(
            by_trip
                .iter()
                .map(|event| event.event_type)
                .collect::<Vec<_>>(),
            vec![GeofenceEventType::PickupArrived, GeofenceEventType::OfficeReached]
        );

        let by_vehicle = storage.events_by_vehicle(1).await.unwrap();
        assert_eq!(by_vehicle.first().unwrap().event_timestamp, ts(9, 0, 0));

        let in_range = storage
            .events_by_time_range(ts(8, 0, 0), ts(8, 30, 0))
            .await
            .unwrap();
        assert_eq!(in_range.len(), 2);
    }

    #[tokio::test]
    async fn latest_location_is_by_device_timestamp() {
        let storage = MemoryStorage::new();
        storage.append_location(log(1, ts(8, 0, 10))).await.unwrap();
        storage.append_location(log(1, ts(8, 0, 30))).await.unwrap();
        storage.append_location(log(1, ts(8, 0, 20))).await.unwrap();
        storage.append_location(log(2, ts(9, 0, 0))).await.unwrap();

        let latest = storage.latest_location(1).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, ts(8, 0, 30));
    }

    #[tokio::test]
    async fn reset_deletes_are_scoped_to_the_trip() {
        let storage = MemoryStorage::new();
        storage.append_location(log(1, ts(8, 0, 0))).await.unwrap();
        storage.append_location(log(2, ts(8, 0, 0))).await.unwrap();
        storage
            .save_event(event(1, GeofenceEventType::PickupArrived, ts(8, 0, 0)))
            .await
            .unwrap();
        storage
            .save_event(event(2, GeofenceEventType::PickupArrived, ts(8, 0, 0)))
            .await
            .unwrap();

        storage.delete_locations_for_trip(1).await.unwrap();
        storage.delete_events_for_trip(1).await.unwrap();

        assert!(storage.locations_for_trip(1).await.unwrap().is_empty());
        assert!(storage.events_by_trip(1).await.unwrap().is_empty());
        assert_eq!(storage.locations_for_trip(2).await.unwrap().len(), 1);
        assert_eq!(storage.events_by_trip(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_trip_rejects_unknown_ids() {
        let storage = MemoryStorage::new();
        let trip = Trip {
            id: 99,
            vehicle_id: 1,
            status: TripStatus::Pending,
            start_time: None,
            end_time: None,
            total_distance_km: 0.0,
            duration_minutes: None,
            office_entry_time: None,
        };

        assert!(storage.save_trip(&trip).await.is_err());
    }
}
