/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::common::types::*;
use crate::storage::TrackingStorage;
use crate::tools::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct CacheConfig {
    pub ttl_minutes: u64,
    pub geofence_capacity: usize,
    pub vehicle_driver_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            geofence_capacity: 20,
            vehicle_driver_capacity: 50,
        }
    }
}

struct CacheEntry<V> {
    value: V,
    written_at: Instant,
    last_used: u64,
}

/// Write-TTL cache with LRU eviction on capacity and explicit invalidation.
///
/// Reads refresh recency but never the TTL, so a stale entry is dropped at
/// most `ttl` after it was written regardless of traffic.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    capacity: usize,
    ttl: Duration,
    tick: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            tick: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if entry.written_at.elapsed() < self.ttl => {
                entry.last_used = self.tick.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                written_at: Instant::now(),
                last_used: self.tick.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }
}

/// Read-through cache over the static tables (geofences, vehicles, drivers).
///
/// Concurrent misses may load twice; the second write wins and both callers
/// see fresh data. `evict_all` is wired to the admin reset path, geofence
/// writes call `invalidate_geofences`.
pub struct StaticDataProvider {
    storage: Arc<dyn TrackingStorage>,
    geofences: TtlCache<(), Vec<OfficeGeofence>>,
    vehicles: TtlCache<(), Vec<Vehicle>>,
    drivers: TtlCache<VehicleId, Option<Driver>>,
}

impl StaticDataProvider {
    pub fn new(storage: Arc<dyn TrackingStorage>, config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_minutes * 60);
        Self {
            storage,
            geofences: TtlCache::new(config.geofence_capacity, ttl),
            vehicles: TtlCache::new(config.vehicle_driver_capacity, ttl),
            drivers: TtlCache::new(config.vehicle_driver_capacity, ttl),
        }
    }

    pub async fn office_geofences(&self) -> Result<Vec<OfficeGeofence>, AppError> {
        if let Some(geofences) = self.geofences.get(&()) {
            return Ok(geofences);
        }
        let geofences = self.storage.list_geofences().await?;
        self.geofences.put((), geofences.clone());
        Ok(geofences)
    }

    pub async fn vehicles(&self) -> Result<Vec<Vehicle>, AppError> {
        if let Some(vehicles) = self.vehicles.get(&()) {
            return Ok(vehicles);
        }
        let vehicles = self.storage.list_vehicles().await?;
        self.vehicles.put((), vehicles.clone());
        Ok(vehicles)
    }

    pub async fn driver_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Driver>, AppError> {
        if let Some(driver) = self.drivers.get(&vehicle_id) {
            return Ok(driver);
        }
        let driver = self.storage.driver_for_vehicle(vehicle_id).await?;
        self.drivers.put(vehicle_id, driver.clone());
        Ok(driver)
    }

    pub async fn vehicle_registration(&self, vehicle_id: VehicleId) -> String {
        match self.vehicles().await {
            Ok(vehicles) => vehicles
                .into_iter()
                .find(|vehicle| vehicle.id == vehicle_id)
                .map(|vehicle| vehicle.registration_number)
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    pub fn invalidate_geofences(&self) {
        self.geofences.invalidate_all();
    }

    pub fn evict_all(&self) {
        self.geofences.invalidate_all();
        self.vehicles.invalidate_all();
        self.drivers.invalidate_all();
    }
}
