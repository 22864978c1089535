/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use serde::{Deserialize, Serialize};

use crate::common::geometry::is_within_radius;
use crate::common::types::*;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct GeofenceConfig {
    /// Continuous in-fence time required before auto-closure, in seconds.
    pub dwell_time_seconds: i64,
    /// Auto-closure requires speed strictly below this, in km/h.
    pub speed_threshold_kmh: f64,
    /// Auto-closure requires the trip to be at least this old; 0 disables.
    pub min_trip_duration_seconds: i64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            dwell_time_seconds: 30,
            speed_threshold_kmh: 5.0,
            min_trip_duration_seconds: 0,
        }
    }
}

/// One step of the ordered mutation plan produced by an evaluation.
///
/// The engine never touches the store or the outside world; the coordinator
/// applies these in order inside the per-trip critical section, deferring the
/// `Notify*`/`Publish*` effects until after commit.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEffect {
    MarkPickupArrived(PickupPointId),
    EmitEvent {
        kind: GeofenceEventType,
        lat: Latitude,
        lon: Longitude,
    },
    SetOfficeEntry(Option<TimeStamp>),
    CompleteTrip {
        end_time: TimeStamp,
        duration_minutes: i64,
    },
    NotifyPickup {
        lat: Latitude,
        lon: Longitude,
    },
    NotifyCompletion,
    PublishGeofence(GeofenceEventType),
}

/// Evaluates one ping against a trip's pickups and the office geofences.
///
/// Pickup effects come first (in pickup id order), then the office pass.
/// `office_reached_logged` is the store's `exists_event(trip, OFFICE_REACHED)`
/// answer, read under the same per-trip lock; it is the last guard before the
/// closure effects. `now` is the server clock — device timestamps never enter
/// dwell arithmetic.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    trip: &Trip,
    ping: &Point,
    speed: SpeedKmh,
    pickups: &[PickupPoint],
    geofences: &[OfficeGeofence],
    office_reached_logged: bool,
    now: TimeStamp,
    config: &GeofenceConfig,
) -> Vec<EngineEffect> {
    let mut effects = Vec::new();
    evaluate_pickups(ping, pickups, &mut effects);
    evaluate_office(
        trip,
        ping,
        speed,
        pickups,
        geofences,
        office_reached_logged,
        now,
        config,
        &mut effects,
    );
    effects
}

fn evaluate_pickups(ping: &Point, pickups: &[PickupPoint], effects: &mut Vec<EngineEffect>) {
    let mut pending: Vec<&PickupPoint> = pickups
        .iter()
        .filter(|pickup| pickup.status == PickupStatus::Pending)
        .collect();
    pending.sort_by_key(|pickup| pickup.id);

    for pickup in pending {
        if is_within_radius(ping, &pickup.centre(), pickup.radius_meters) {
            effects.push(EngineEffect::MarkPickupArrived(pickup.id));
            effects.push(EngineEffect::EmitEvent {
                kind: GeofenceEventType::PickupArrived,
                lat: ping.lat,
                lon: ping.lon,
            });
            effects.push(EngineEffect::NotifyPickup {
                lat: ping.lat,
                lon: ping.lon,
            });
            effects.push(EngineEffect::PublishGeofence(GeofenceEventType::PickupArrived));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate_office(
    trip: &Trip,
    ping: &Point,
    speed: SpeedKmh,
    pickups: &[PickupPoint],
    geofences: &[OfficeGeofence],
    office_reached_logged: bool,
    now: TimeStamp,
    config: &GeofenceConfig,
    effects: &mut Vec<EngineEffect>,
) {
    // First containment match in enumeration order; overlap is allowed.
    let inside = geofences.iter().any(|geofence| geofence.contains(ping));

    if !inside {
        // GPS-drift defence: leaving the fence throws away accumulated dwell.
        if trip.office_entry_time.is_some() && trip.status == TripStatus::InProgress {
            effects.push(EngineEffect::SetOfficeEntry(None));
            effects.push(EngineEffect::EmitEvent {
                kind: GeofenceEventType::GeofenceExit,
                lat: ping.lat,
                lon: ping.lon,
            });
        }
        return;
    }

    if trip.status != TripStatus::InProgress {
        return;
    }

    let entry_time = match trip.office_entry_time {
        None => {
            // Anchor dwell; closure is decided on a later ping.
            effects.push(EngineEffect::SetOfficeEntry(Some(now)));
            return;
        }
        Some(entry_time) => entry_time,
    };

    let dwell_seconds = (now - entry_time).num_seconds();
    if dwell_seconds < config.dwell_time_seconds {
        return;
    }

    // Drive-through defence: threshold itself does not close.
    if speed >= config.speed_threshold_kmh {
        return;
    }

    if pickups
        .iter()
        .any(|pickup| pickup.status != PickupStatus::Arrived)
    {
        effects.push(EngineEffect::EmitEvent {
            kind: GeofenceEventType::TripClosureBlockedPendingPickups,
            lat: ping.lat,
            lon: ping.lon,
        });
        return;
    }

    if config.min_trip_duration_seconds > 0 {
        let trip_age = trip
            .start_time
            .map(|start| (now - start).num_seconds())
            .unwrap_or(0);
        if trip_age < config.min_trip_duration_seconds {
            effects.push(EngineEffect::EmitEvent {
                kind: GeofenceEventType::TripClosureBlockedMinDuration,
                lat: ping.lat,
                lon: ping.lon,
            });
            return;
        }
    }

    if office_reached_logged {
        return;
    }

    let duration_minutes = trip
        .start_time
        .map(|start| (now - start).num_minutes())
        .unwrap_or(0);

    effects.push(EngineEffect::EmitEvent {
        kind: GeofenceEventType::OfficeReached,
        lat: ping.lat,
        lon: ping.lon,
    });
    effects.push(EngineEffect::CompleteTrip {
        end_time: now,
        duration_minutes,
    });
    effects.push(EngineEffect::EmitEvent {
        kind: GeofenceEventType::TripCompleted,
        lat: ping.lat,
        lon: ping.lon,
    });
    effects.push(EngineEffect::NotifyCompletion);
    effects.push(EngineEffect::PublishGeofence(GeofenceEventType::TripCompleted));
}

/// Manual-closure plan. The caller has already verified the trip is
/// `IN_PROGRESS`; outside the fence the discrepancy is logged and an admin
/// alert is fired alongside.
pub fn evaluate_manual_close(
    trip: &Trip,
    position: &Point,
    geofences: &[OfficeGeofence],
    now: TimeStamp,
) -> Vec<EngineEffect> {
    let mut effects = Vec::new();
    let inside = geofences.iter().any(|geofence| geofence.contains(position));

    if inside {
        effects.push(EngineEffect::EmitEvent {
            kind: GeofenceEventType::ManualClosure,
            lat: position.lat,
            lon: position.lon,
        });
        effects.push(EngineEffect::PublishGeofence(GeofenceEventType::ManualClosure));
    } else {
        effects.push(EngineEffect::EmitEvent {
            kind: GeofenceEventType::ManualClosureOutsideGeofence,
            lat: position.lat,
            lon: position.lon,
        });
        effects.push(EngineEffect::EmitEvent {
            kind: GeofenceEventType::AdminAlert,
            lat: position.lat,
            lon: position.lon,
        });
        effects.push(EngineEffect::PublishGeofence(
            GeofenceEventType::ManualClosureOutsideGeofence,
        ));
    }

    let duration_minutes = trip
        .start_time
        .map(|start| (now - start).num_minutes())
        .unwrap_or(0);
    effects.push(EngineEffect::CompleteTrip {
        end_time: now,
        duration_minutes,
    });

    effects
}
