/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;

use crate::common::geometry::distance_in_meters;
use crate::common::types::*;
use crate::domain::types::dashboard::{DashboardData, TripOverview};
use crate::environment::AppState;
use crate::tools::error::AppError;

/// Crawling speed makes ETAs explode; assume city pace instead.
const ETA_FLOOR_SPEED_KMH: f64 = 30.0;

/// Aggregates everything the dashboard polls for in one call. Vehicles,
/// drivers and geofences come from the static-data caches; trips, trails and
/// events are read live.
pub async fn dashboard_data(data: Data<AppState>) -> Result<DashboardData, AppError> {
    let vehicles = data.static_data.vehicles().await?;
    let office_geofences = data.static_data.office_geofences().await?;
    let pickup_points = data.storage.list_pickups().await?;
    let location_logs = data.storage.list_locations().await?;
    let events = data.storage.list_events().await?;

    let mut trips = Vec::new();
    for trip in data.storage.list_trips().await? {
        let vehicle_reg = vehicles
            .iter()
            .find(|vehicle| vehicle.id == trip.vehicle_id)
            .map(|vehicle| vehicle.registration_number.clone())
            .unwrap_or_default();
        let driver = data.static_data.driver_for_vehicle(trip.vehicle_id).await?;

        let latest_log = location_logs
            .iter()
            .filter(|log| log.trip_id == trip.id)
            .max_by_key(|log| (log.timestamp, log.id));
        let current_speed = latest_log.map(|log| log.speed).unwrap_or(0.0);

        let (eta_minutes, eta_destination) = match latest_log {
            Some(log) if trip.status == TripStatus::InProgress => {
                eta(&trip, log, &pickup_points, &office_geofences)
            }
            _ => (None, None),
        };

        trips.push(TripOverview {
            id: trip.id,
            vehicle_id: trip.vehicle_id,
            vehicle_reg,
            status: trip.status,
            start_time: trip.start_time,
            end_time: trip.end_time,
            total_distance_km: trip.total_distance_km,
            duration_minutes: trip.duration_minutes,
            driver_name: driver.as_ref().map(|driver| driver.name.clone()),
            driver_phone: driver.as_ref().map(|driver| driver.phone_number.clone()),
            driver_license: driver.as_ref().map(|driver| driver.license_number.clone()),
            current_speed,
            eta_minutes,
            eta_destination,
        });
    }

    Ok(DashboardData {
        vehicles,
        trips,
        pickup_points,
        office_geofences,
        location_logs,
        events,
    })
}

/// ETA to the first pending pickup, else to the first office geofence.
fn eta(
    trip: &Trip,
    latest: &LocationLog,
    pickups: &[PickupPoint],
    geofences: &[OfficeGeofence],
) -> (Option<i64>, Option<String>) {
    let speed_kmh = if latest.speed > 2.0 {
        latest.speed
    } else {
        ETA_FLOOR_SPEED_KMH
    };

    let pending_pickup = pickups
        .iter()
        .find(|pickup| pickup.trip_id == trip.id && pickup.status == PickupStatus::Pending);

    let (target, destination) = match pending_pickup {
        Some(pickup) => (pickup.centre(), "Pickup"),
        None => match geofences.first() {
            Some(office) => (office.centre(), "Office"),
            None => return (None, None),
        },
    };

    let distance_km = distance_in_meters(&latest.point(), &target) / 1000.0;
    let eta_minutes = (distance_km / speed_kmh * 60.0).round() as i64;
    (Some(eta_minutes), Some(destination.to_string()))
}
