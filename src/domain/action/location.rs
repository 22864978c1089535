/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;
use tracing::{error, info, warn};

use crate::bus::{GeofenceBroadcast, LocationBroadcast};
use crate::common::engine::{self, EngineEffect};
use crate::common::geometry::distance_in_meters;
use crate::common::types::*;
use crate::domain::types::location::{BatchSummary, LocationUpdateRequest};
use crate::environment::AppState;
use crate::tools::error::AppError;
use crate::tools::prometheus::GEOFENCE_EVENTS;

/// Deferred side effects, fired only after the trip mutation is committed
/// and the per-trip lock released.
enum PostCommitEffect {
    NotifyPickup { lat: Latitude, lon: Longitude },
    NotifyCompletion,
    PublishGeofence(GeofenceEventType),
}

/// Processes one GPS ping end to end.
///
/// The per-trip lock spans the read-evaluate-apply sequence, so concurrent
/// pings against one trip are totally ordered and the engine's idempotency
/// guards see committed state. Audit writes are best-effort: a failed event
/// insert is logged and swallowed so the operational state machine still
/// advances.
pub async fn process_location_update(
    data: Data<AppState>,
    request: LocationUpdateRequest,
) -> Result<APISuccess, AppError> {
    let trip_id = request.trip_id;

    // Previous log is read before the critical section, like the ping itself
    // it is device-time ordered and only feeds the distance increment.
    let prev_location = data.storage.latest_location(trip_id).await?;

    let _guard = data.trip_locks.acquire(trip_id).await;

    let now = data.clock.now();
    let mut trip = data
        .storage
        .trip_for_update(trip_id)
        .await?
        .ok_or(AppError::TripNotFound(trip_id))?;

    data.storage
        .append_location(LocationLog {
            id: 0,
            vehicle_id: request.vehicle_id,
            trip_id,
            latitude: request.latitude,
            longitude: request.longitude,
            speed: request.speed,
            timestamp: request.timestamp,
        })
        .await?;

    if let Some(prev) = prev_location {
        let increment_km = distance_in_meters(&prev.point(), &request.point()) / 1000.0;
        trip.total_distance_km += increment_km;
    }

    let pickups = data.storage.pickups_for_trip(trip_id).await?;
    let geofences = data.static_data.office_geofences().await?;
    let office_reached_logged = data
        .storage
        .exists_event(trip_id, GeofenceEventType::OfficeReached)
        .await?;

    let effects = engine::evaluate(
        &trip,
        &request.point(),
        request.speed,
        &pickups,
        &geofences,
        office_reached_logged,
        now,
        &data.geofence_cfg,
    );

    let mut post_commit = Vec::new();
    for effect in effects {
        apply_effect(&data, &mut trip, &request, now, effect, &mut post_commit).await?;
    }

    data.storage.save_trip(&trip).await?;
    drop(_guard);

    info!(
        tag = "[Location Update]",
        trip_id,
        vehicle_id = request.vehicle_id,
        speed = request.speed,
        trip_status = %trip.status,
        "Processed location update"
    );

    fire_post_commit(&data, &trip, &request, now, post_commit).await;

    Ok(APISuccess::default())
}

async fn apply_effect(
    data: &Data<AppState>,
    trip: &mut Trip,
    request: &LocationUpdateRequest,
    now: TimeStamp,
    effect: EngineEffect,
    post_commit: &mut Vec<PostCommitEffect>,
) -> Result<(), AppError> {
    match effect {
        EngineEffect::MarkPickupArrived(pickup_id) => {
            data.storage
                .set_pickup_status(pickup_id, PickupStatus::Arrived)
                .await?;
        }
        EngineEffect::EmitEvent { kind, lat, lon } => {
            emit_audit_event(data, trip.id, request.vehicle_id, kind, lat, lon, now).await;
        }
        EngineEffect::SetOfficeEntry(entry_time) => {
            trip.office_entry_time = entry_time;
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
        EngineEffect::NotifyPickup { lat, lon } => {
            post_commit.push(PostCommitEffect::NotifyPickup { lat, lon });
        }
        EngineEffect::NotifyCompletion => {
            post_commit.push(PostCommitEffect::NotifyCompletion);
        }
        EngineEffect::PublishGeofence(kind) => {
            post_commit.push(PostCommitEffect::PublishGeofence(kind));
        }
    }
    Ok(())
}

/// Audit inserts never fail the ping: losing an audit row must not stop the
/// state machine, operators catch the loss through monitoring.
pub(crate) async fn emit_audit_event(
    data: &Data<AppState>,
    trip_id: TripId,
    vehicle_id: VehicleId,
    kind: GeofenceEventType,
    lat: Latitude,
    lon: Longitude,
    now: TimeStamp,
) {
    let label = kind.to_string();
    GEOFENCE_EVENTS.with_label_values(&[label.as_str()]).inc();

    let event = EventLog {
        id: 0,
        vehicle_id,
        trip_id: Some(trip_id),
        event_type: kind,
        latitude: lat,
        longitude: lon,
        event_timestamp: now,
        created_at: None,
    };
    if let Err(err) = data.storage.save_event(event).await {
        error!(
            tag = "[Audit]",
            trip_id,
            event_type = %kind,
            error = %err.message(),
            "Audit event write failed, continuing without it"
        );
    }
}

async fn fire_post_commit(
    data: &Data<AppState>,
    trip: &Trip,
    request: &LocationUpdateRequest,
    now: TimeStamp,
    effects: Vec<PostCommitEffect>,
) {
    let vehicle_reg = data.static_data.vehicle_registration(trip.vehicle_id).await;

    for effect in effects {
        match effect {
            PostCommitEffect::NotifyPickup { lat, lon } => {
                if let Err(err) = data
                    .notifier
                    .pickup_arrival(request.vehicle_id, trip.id, lat, lon)
                    .await
                {
                    warn!(tag = "[Notifier]", error = %err.message(), "Pickup notification failed");
                }
            }
            PostCommitEffect::NotifyCompletion => {
                if let Err(err) = data
                    .notifier
                    .trip_completion(request.vehicle_id, trip.id)
                    .await
                {
                    warn!(tag = "[Notifier]", error = %err.message(), "Completion notification failed");
                }
            }
            PostCommitEffect::PublishGeofence(kind) => {
                data.bus.publish_geofence(GeofenceBroadcast {
                    event_type: kind.to_string(),
                    vehicle_id: request.vehicle_id,
                    trip_id: trip.id,
                    vehicle_reg: vehicle_reg.clone(),
                    latitude: request.latitude,
                    longitude: request.longitude,
                    timestamp: now,
                });
            }
        }
    }

    data.bus.publish_location(LocationBroadcast {
        vehicle_id: request.vehicle_id,
        trip_id: trip.id,
        vehicle_reg,
        latitude: request.latitude,
        longitude: request.longitude,
        speed: request.speed,
        timestamp: request.timestamp,
        trip_status: trip.status,
        total_distance_km: trip.total_distance_km,
    });
}

/// Replays a buffered batch from a device that was offline.
///
/// The batch is applied oldest-first by device timestamp (ties keep input
/// order) on the calling task; one bad ping is logged and skipped so the
/// rest of the trail still lands.
pub async fn process_batch(
    data: Data<AppState>,
    mut requests: Vec<LocationUpdateRequest>,
) -> Result<BatchSummary, AppError> {
    if requests.is_empty() {
        return Err(AppError::InvalidRequest(
            "Batch is empty, nothing to process".to_string(),
        ));
    }
    if requests.len() > data.max_batch_size {
        return Err(AppError::BatchSizeExceeded(
            requests.len(),
            data.max_batch_size,
        ));
    }

    requests.sort_by_key(|request| request.timestamp);

    let total = requests.len();
    let mut processed = 0;
    let mut failed = 0;
    for request in requests {
        let trip_id = request.trip_id;
        let device_ts = request.timestamp;
        match process_location_update(data.clone(), request).await {
            Ok(_) => processed += 1,
            Err(err) => {
                error!(
                    tag = "[Batch Sync]",
                    trip_id,
                    device_ts = %device_ts,
                    error = %err.message(),
                    "Batch ping failed, continuing with the rest"
                );
                failed += 1;
            }
        }
    }

    info!(
        tag = "[Batch Sync]",
        total, processed, failed, "Batch sync complete"
    );

    Ok(BatchSummary {
        total,
        processed,
        failed,
    })
}
