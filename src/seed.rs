/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use tracing::info;

use crate::common::types::*;
use crate::storage::TrackingStorage;
use crate::tools::error::AppError;

/// Loads a small demo fleet so the service is drivable out of the box:
/// one office geofence, three vehicles with drivers, one pending trip with a
/// pickup point each. Skipped when the store already holds vehicles.
pub async fn seed_demo_fleet(storage: &dyn TrackingStorage) -> Result<(), AppError> {
    if !storage.list_vehicles().await?.is_empty() {
        info!(tag = "[Seed]", "Store already populated, skipping demo fleet");
        return Ok(());
    }

    storage
        .create_geofence(OfficeGeofence {
            id: 0,
            name: Some("Bangalore HQ".to_string()),
            latitude: 12.9716,
            longitude: 77.5946,
            radius_meters: 100.0,
            shape: GeofenceShape::Circular,
            polygon: vec![],
        })
        .await?;

    let fleet = [
        ("KA01AB1234", "Ravi Kumar", "+919800000001", "KA-2019-0001", (12.9520, 77.5750)),
        ("KA01CD5678", "Suresh Babu", "+919800000002", "KA-2020-0145", (12.9345, 77.6100)),
        ("KA01EF9012", "Manjunath", "+919800000003", "KA-2018-2210", (12.9980, 77.5570)),
    ];

    for (registration, name, phone, license, pickup) in fleet {
        let vehicle = storage
            .create_vehicle(Vehicle {
                id: 0,
                registration_number: registration.to_string(),
                status: VehicleStatus::Active,
            })
            .await?;

        storage
            .create_driver(Driver {
                id: 0,
                name: name.to_string(),
                phone_number: phone.to_string(),
                license_number: license.to_string(),
                vehicle_id: Some(vehicle.id),
            })
            .await?;

        let trip = storage
            .create_trip(Trip {
                id: 0,
                vehicle_id: vehicle.id,
                status: TripStatus::Pending,
                start_time: None,
                end_time: None,
                total_distance_km: 0.0,
                duration_minutes: None,
                office_entry_time: None,
            })
            .await?;

        storage
            .create_pickup(PickupPoint {
                id: 0,
                trip_id: trip.id,
                latitude: pickup.0,
                longitude: pickup.1,
                radius_meters: 50.0,
                status: PickupStatus::Pending,
            })
            .await?;
    }

    info!(tag = "[Seed]", "Demo fleet loaded");
    Ok(())
}
