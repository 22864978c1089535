/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;
use tracing::{info, warn};

use crate::bus::{GeofenceBroadcast, TRIP_RESET, TRIP_STARTED};
use crate::common::engine::{self, EngineEffect};
use crate::common::types::*;
use crate::domain::action::location::emit_audit_event;
use crate::domain::types::trip::ManualCloseRequest;
use crate::environment::AppState;
use crate::tools::error::AppError;

/// Closes an `IN_PROGRESS` trip at an operator-supplied position.
///
/// Outside the office fence the discrepancy is recorded and the operations
/// team alerted; the trip is finalized either way.
pub async fn manual_close(
    data: Data<AppState>,
    trip_id: TripId,
    request: ManualCloseRequest,
) -> Result<APISuccess, AppError> {
    let _guard = data.trip_locks.acquire(trip_id).await;

    let now = data.clock.now();
    let mut trip = data
        .storage
        .trip_for_update(trip_id)
        .await?
        .ok_or(AppError::TripNotFound(trip_id))?;

    match trip.status {
        TripStatus::Completed => return Err(AppError::TripAlreadyCompleted(trip_id)),
        TripStatus::Pending => {
            return Err(AppError::InvalidRequest(format!(
                "Trip {trip_id} has not started, nothing to close"
            )))
        }
        TripStatus::InProgress => {}
    }

    let position = Point {
        lat: request.latitude,
        lon: request.longitude,
    };
    let geofences = data.static_data.office_geofences().await?;
    let effects = engine::evaluate_manual_close(&trip, &position, &geofences, now);

    let mut outside_geofence = false;
    let mut publishes = Vec::new();
    for effect in effects {
        match effect {
            EngineEffect::EmitEvent { kind, lat, lon } => {
                if kind == GeofenceEventType::AdminAlert {
                    outside_geofence = true;
                }
                emit_audit_event(&data, trip_id, trip.vehicle_id, kind, lat, lon, now).await;
            }
            EngineEffect::CompleteTrip {
                end_time,
                duration_minutes,
            } => {
                trip.status = TripStatus::Completed;
                trip.end_time = Some(end_time);
                trip.duration_minutes = Some(duration_minutes);
                trip.office_entry_time = None;
            }
            EngineEffect::PublishGeofence(kind) => publishes.push(kind),
            // Manual closure produces no pickup or dwell effects.
            _ => {}
        }
    }

    data.storage.save_trip(&trip).await?;
    drop(_guard);

    if outside_geofence {
        let reason = request
            .reason
            .as_deref()
            .unwrap_or("Manual closure outside geofence");
        if let Err(err) = data
            .notifier
            .admin_alert(trip.vehicle_id, trip_id, reason)
            .await
        {
            warn!(tag = "[Notifier]", error = %err.message(), "Admin alert failed");
        }
    }

    let vehicle_reg = data.static_data.vehicle_registration(trip.vehicle_id).await;
    for kind in publishes {
        data.bus.publish_geofence(GeofenceBroadcast {
            event_type: kind.to_string(),
            vehicle_id: trip.vehicle_id,
            trip_id,
            vehicle_reg: vehicle_reg.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            timestamp: now,
        });
    }

    info!(
        tag = "[Manual Close]",
        trip_id, outside_geofence, "Trip manually closed"
    );

    Ok(APISuccess::default())
}

/// Moves a `PENDING` trip into `IN_PROGRESS` and stamps the start time.
pub async fn start_trip(data: Data<AppState>, trip_id: TripId) -> Result<APISuccess, AppError> {
    let _guard = data.trip_locks.acquire(trip_id).await;

    let now = data.clock.now();
    let mut trip = data
        .storage
        .trip_for_update(trip_id)
        .await?
        .ok_or(AppError::TripNotFound(trip_id))?;

    if trip.status != TripStatus::Pending {
        return Err(AppError::InvalidRequest(format!(
            "Trip {trip_id} cannot start from status {}",
            trip.status
        )));
    }

    trip.status = TripStatus::InProgress;
    trip.start_time = Some(now);
    trip.end_time = None;
    trip.duration_minutes = None;
    trip.office_entry_time = None;

    data.storage.save_trip(&trip).await?;
    drop(_guard);

    let vehicle_reg = data.static_data.vehicle_registration(trip.vehicle_id).await;
    data.bus.publish_geofence(GeofenceBroadcast {
        event_type: TRIP_STARTED.to_string(),
        vehicle_id: trip.vehicle_id,
        trip_id,
        vehicle_reg,
        latitude: 0.0,
        longitude: 0.0,
        timestamp: now,
    });

    info!(tag = "[Trip Start]", trip_id, "Trip started");

    Ok(APISuccess::default())
}

/// Puts every trip back to `PENDING`: owned location and event logs are
/// deleted, derived fields cleared, pickups reset, static caches evicted.
pub async fn reset_all(data: Data<AppState>) -> Result<APISuccess, AppError> {
    let trips = data.storage.list_trips().await?;
    if trips.is_empty() {
        return Err(AppError::InvalidRequest("No trips found".to_string()));
    }

    data.static_data.evict_all();

    let now = data.clock.now();
    for trip in trips {
        let trip_id = trip.id;
        let _guard = data.trip_locks.acquire(trip_id).await;

        let mut trip = match data.storage.trip_for_update(trip_id).await? {
            Some(trip) => trip,
            None => continue,
        };

        data.storage.delete_locations_for_trip(trip_id).await?;
        data.storage.delete_events_for_trip(trip_id).await?;

        trip.status = TripStatus::Pending;
        trip.start_time = None;
        trip.end_time = None;
        trip.total_distance_km = 0.0;
        trip.duration_minutes = None;
        trip.office_entry_time = None;
        data.storage.save_trip(&trip).await?;

        for pickup in data.storage.pickups_for_trip(trip_id).await? {
            data.storage
                .set_pickup_status(pickup.id, PickupStatus::Pending)
                .await?;
        }
        drop(_guard);

        let vehicle_reg = data.static_data.vehicle_registration(trip.vehicle_id).await;
        data.bus.publish_geofence(GeofenceBroadcast {
            event_type: TRIP_RESET.to_string(),
            vehicle_id: trip.vehicle_id,
            trip_id,
            vehicle_reg,
            latitude: 0.0,
            longitude: 0.0,
            timestamp: now,
        });

        info!(tag = "[Reset]", trip_id, "Trip reset to PENDING");
    }

    Ok(APISuccess::default())
}
