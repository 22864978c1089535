/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use async_trait::async_trait;
use tracing::info;

use crate::common::types::*;
use crate::tools::error::AppError;

/// Side-effect port for rider/ops notifications.
///
/// The engine guarantees at-most-once invocation per logical event within a
/// process lifetime; implementations must tolerate redelivery after a
/// restart (at-least-once overall). Callers log and swallow failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn pickup_arrival(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        lat: Latitude,
        lon: Longitude,
    ) -> Result<(), AppError>;

    async fn trip_completion(&self, vehicle_id: VehicleId, trip_id: TripId)
        -> Result<(), AppError>;

    async fn admin_alert(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        reason: &str,
    ) -> Result<(), AppError>;
}

/// Logging implementation. Production wires FCM push + SMS fallback here.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn pickup_arrival(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        lat: Latitude,
        lon: Longitude,
    ) -> Result<(), AppError> {
        info!(
            tag = "[Push Notification]",
            vehicle_id, trip_id, lat, lon, "Your cab has arrived at the pickup point"
        );
        Ok(())
    }

    async fn trip_completion(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
    ) -> Result<(), AppError> {
        info!(
            tag = "[Push Notification]",
            vehicle_id, trip_id, "Trip completed, vehicle has reached the office"
        );
        Ok(())
    }

    async fn admin_alert(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        reason: &str,
    ) -> Result<(), AppError> {
        info!(
            tag = "[Admin Alert]",
            vehicle_id, trip_id, reason, "Trip closed outside office geofence, operations team notified"
        );
        Ok(())
    }
}
