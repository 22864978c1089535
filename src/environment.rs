/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::EventBus;
use crate::common::cache::{CacheConfig, StaticDataProvider};
use crate::common::engine::GeofenceConfig;
use crate::common::types::Clock;
use crate::dispatcher::LocationDispatcher;
use crate::notifier::Notifier;
use crate::storage::{TrackingStorage, TripLockRegistry};
use crate::tools::logger::LoggerConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub logger_cfg: LoggerConfig,
    /// Worker count for the async ingress pool.
    pub workers: usize,
    pub dispatcher_queue_size: usize,
    pub bus_capacity: usize,
    pub max_batch_size: usize,
    pub max_allowed_req_size: usize,
    /// Per-request deadline in milliseconds.
    pub request_timeout: u64,
    pub geofence_cfg: GeofenceConfig,
    pub cache_cfg: CacheConfig,
    pub seed_demo_data: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn TrackingStorage>,
    pub static_data: Arc<StaticDataProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub bus: EventBus,
    pub trip_locks: TripLockRegistry,
    pub dispatcher: LocationDispatcher,
    pub clock: Clock,
    pub geofence_cfg: GeofenceConfig,
    pub max_batch_size: usize,
    pub max_allowed_req_size: usize,
    pub request_timeout: u64,
}

impl AppState {
    pub fn new(
        app_config: &AppConfig,
        storage: Arc<dyn TrackingStorage>,
        notifier: Arc<dyn Notifier>,
        dispatcher: LocationDispatcher,
        clock: Clock,
    ) -> AppState {
        let static_data = Arc::new(StaticDataProvider::new(
            storage.clone(),
            &app_config.cache_cfg,
        ));

        AppState {
            storage,
            static_data,
            notifier,
            bus: EventBus::new(app_config.bus_capacity),
            trip_locks: TripLockRegistry::new(),
            dispatcher,
            clock,
            geofence_cfg: app_config.geofence_cfg,
            max_batch_size: app_config.max_batch_size,
            max_allowed_req_size: app_config.max_allowed_req_size,
            request_timeout: app_config.request_timeout,
        }
    }
}
