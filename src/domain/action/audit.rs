/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;

use crate::common::types::*;
use crate::environment::AppState;
use crate::tools::error::AppError;

/// Full audit trail of one trip, oldest first
/// (PICKUP_ARRIVED -> OFFICE_REACHED -> TRIP_COMPLETED on a clean run).
pub async fn events_by_trip(
    data: Data<AppState>,
    trip_id: TripId,
) -> Result<Vec<EventLog>, AppError> {
    data.storage.events_by_trip(trip_id).await
}

/// Vehicle-level reporting, newest first.
pub async fn events_by_vehicle(
    data: Data<AppState>,
    vehicle_id: VehicleId,
) -> Result<Vec<EventLog>, AppError> {
    data.storage.events_by_vehicle(vehicle_id).await
}

/// SLA and billing window queries over the server-side event timestamp.
pub async fn events_by_time_range(
    data: Data<AppState>,
    from: TimeStamp,
    to: TimeStamp,
) -> Result<Vec<EventLog>, AppError> {
    if from > to {
        return Err(AppError::InvalidRequest(format!(
            "from ({from}) must not be after to ({to})"
        )));
    }
    data.storage.events_by_time_range(from, to).await
}
