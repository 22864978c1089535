/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::sync::{Arc, Mutex};

use actix_web::web::Data;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use vehicle_tracking_service::{
    bus::TRIP_STARTED,
    common::{
        cache::CacheConfig,
        engine::GeofenceConfig,
        types::*,
    },
    dispatcher::{run_workers, LocationDispatcher},
    domain::{
        action::{audit, geofence, location, trip},
        types::{
            geofence::OfficeGeofenceRequest,
            location::LocationUpdateRequest,
            trip::ManualCloseRequest,
        },
    },
    environment::{AppConfig, AppState},
    notifier::Notifier,
    storage::{memory::MemoryStorage, TrackingStorage},
    tools::{
        error::AppError,
        logger::{LogLevel, LoggerConfig},
    },
};

const OFFICE_LAT: f64 = 12.9716;
const OFFICE_LON: f64 = 77.5946;
const PICKUP_LAT: f64 = 12.9520;
const PICKUP_LON: f64 = 77.5750;

fn t0() -> TimeStamp {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        logger_cfg: LoggerConfig {
            level: LogLevel::ERROR,
            log_to_file: false,
        },
        workers: 2,
        dispatcher_queue_size: 16,
        bus_capacity: 64,
        max_batch_size: 100,
        max_allowed_req_size: 512_000,
        request_timeout: 6_000,
        geofence_cfg: GeofenceConfig::default(),
        cache_cfg: CacheConfig::default(),
        seed_demo_data: false,
    }
}

#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn pickup_arrival(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        _lat: Latitude,
        _lon: Longitude,
    ) -> Result<(), AppError> {
        self.record(format!("pickup:{vehicle_id}:{trip_id}"));
        Ok(())
    }

    async fn trip_completion(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
    ) -> Result<(), AppError> {
        self.record(format!("completion:{vehicle_id}:{trip_id}"));
        Ok(())
    }

    async fn admin_alert(
        &self,
        vehicle_id: VehicleId,
        trip_id: TripId,
        reason: &str,
    ) -> Result<(), AppError> {
        self.record(format!("alert:{vehicle_id}:{trip_id}:{reason}"));
        Ok(())
    }
}

struct Harness {
    data: Data<AppState>,
    storage: Arc<MemoryStorage>,
    notifier: Arc<RecordingNotifier>,
    clock: Clock,
}

fn harness_with(storage: Arc<dyn TrackingStorage>, raw: Arc<MemoryStorage>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Clock::manual(t0());
    let (dispatcher, _receiver) = LocationDispatcher::channel(16);
    let state = AppState::new(
        &test_config(),
        storage,
        notifier.clone(),
        dispatcher,
        clock.clone(),
    );
    Harness {
        data: Data::new(state),
        storage: raw,
        notifier,
        clock,
    }
}

fn harness() -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    harness_with(storage.clone(), storage)
}

async fn office_geofence(harness: &Harness) -> OfficeGeofence {
    harness
        .storage
        .create_geofence(OfficeGeofence {
            id: 0,
            name: Some("Bangalore HQ".to_string()),
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            radius_meters: 100.0,
            shape: GeofenceShape::Circular,
            polygon: vec![],
        })
        .await
        .unwrap()
}

async fn in_progress_trip(harness: &Harness) -> Trip {
    let vehicle = harness
        .storage
        .create_vehicle(Vehicle {
            id: 0,
            registration_number: "KA01AB1234".to_string(),
            status: VehicleStatus::Active,
        })
        .await
        .unwrap();

    let mut trip = harness
        .storage
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
        .await
        .unwrap();

    trip.status = TripStatus::InProgress;
    trip.start_time = Some(harness.clock.now());
    harness.storage.save_trip(&trip).await.unwrap();
    trip
}

async fn pickup_for(harness: &Harness, trip_id: TripId, lat: f64, lon: f64) -> PickupPoint {
    harness
        .storage
        .create_pickup(PickupPoint {
            id: 0,
            trip_id,
            latitude: lat,
            longitude: lon,
            radius_meters: 50.0,
            status: PickupStatus::Pending,
        })
        .await
        .unwrap()
}

fn ping(trip: &Trip, lat: f64, lon: f64, speed: f64, device_ts: TimeStamp) -> LocationUpdateRequest {
    LocationUpdateRequest {
        vehicle_id: trip.vehicle_id,
        trip_id: trip.id,
        latitude: lat,
        longitude: lon,
        speed,
        timestamp: device_ts,
    }
}

async fn audit_kinds(harness: &Harness, trip_id: TripId) -> Vec<GeofenceEventType> {
    harness
        .storage
        .events_by_trip(trip_id)
        .await
        .unwrap()
        .into_iter()
        .map(|event| event.event_type)
        .collect()
}

async fn drive(harness: &Harness, request: LocationUpdateRequest) {
    location::process_location_update(harness.data.clone(), request)
        .await
        .unwrap();
}

// ── S1: pickup then auto-close ─────────────────────────────────────────────

#[tokio::test]
async fn pickup_then_dwell_closes_the_trip() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;
    let pickup = pickup_for(&harness, trip.id, PICKUP_LAT, PICKUP_LON).await;

    harness.clock.advance(Duration::seconds(1));
    drive(&harness, ping(&trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(1))).await;

    harness.clock.advance(Duration::seconds(9));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10))).await;

    harness.clock.advance(Duration::seconds(35));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(45))).await;

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![
            GeofenceEventType::PickupArrived,
            GeofenceEventType::OfficeReached,
            GeofenceEventType::TripCompleted,
        ]
    );

    let closed = harness.storage.trip(trip.id).await.unwrap().unwrap();
    assert_eq!(closed.status, TripStatus::Completed);
    assert_eq!(closed.end_time, Some(t0() + Duration::seconds(45)));
    assert_eq!(closed.duration_minutes, Some(0));
    assert_eq!(closed.office_entry_time, None);
    assert!(closed.total_distance_km > 2.5);

    let pickup = harness
        .storage
        .pickups_for_trip(trip.id)
        .await
        .unwrap()
        .into_iter()
        .find(|candidate| candidate.id == pickup.id)
        .unwrap();
    assert_eq!(pickup.status, PickupStatus::Arrived);

    assert_eq!(
        harness.notifier.calls(),
        vec![
            format!("pickup:{}:{}", trip.vehicle_id, trip.id),
            format!("completion:{}:{}", trip.vehicle_id, trip.id),
        ]
    );
}

// ── S2: drive-through at speed never closes ────────────────────────────────

#[tokio::test]
async fn high_speed_blocks_auto_close() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    harness.clock.advance(Duration::seconds(10));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 20.0, t0() + Duration::seconds(10))).await;

    let entry_anchor = harness
        .storage
        .trip(trip.id)
        .await
        .unwrap()
        .unwrap()
        .office_entry_time;
    assert_eq!(entry_anchor, Some(t0() + Duration::seconds(10)));

    harness.clock.advance(Duration::seconds(35));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 20.0, t0() + Duration::seconds(45))).await;

    assert_eq!(audit_kinds(&harness, trip.id).await, vec![]);

    let current = harness.storage.trip(trip.id).await.unwrap().unwrap();
    assert_eq!(current.status, TripStatus::InProgress);
    assert_eq!(current.office_entry_time, entry_anchor);
}

// ── S3: GPS drift resets the dwell anchor ──────────────────────────────────

#[tokio::test]
async fn drift_outside_resets_dwell() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    harness.clock.advance(Duration::seconds(10));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10))).await;

    harness.clock.advance(Duration::seconds(10));
    drive(&harness, ping(&trip, 12.9800, 77.6050, 2.0, t0() + Duration::seconds(20))).await;

    harness.clock.advance(Duration::seconds(30));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(50))).await;

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![GeofenceEventType::GeofenceExit]
    );

    let current = harness.storage.trip(trip.id).await.unwrap().unwrap();
    assert_eq!(current.status, TripStatus::InProgress);
    // Dwell anchors fresh on the third ping.
    assert_eq!(current.office_entry_time, Some(t0() + Duration::seconds(50)));
}

// ── S4: multi-stop gate ────────────────────────────────────────────────────

#[tokio::test]
async fn pending_second_pickup_blocks_closure() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;
    pickup_for(&harness, trip.id, PICKUP_LAT, PICKUP_LON).await;
    pickup_for(&harness, trip.id, 12.9345, 77.6100).await;

    // Arrive at the first pickup only.
    harness.clock.advance(Duration::seconds(5));
    drive(&harness, ping(&trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(5))).await;

    harness.clock.advance(Duration::seconds(5));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10))).await;

    harness.clock.advance(Duration::seconds(40));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(50))).await;

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![
            GeofenceEventType::PickupArrived,
            GeofenceEventType::TripClosureBlockedPendingPickups,
        ]
    );
    assert_eq!(
        harness.storage.trip(trip.id).await.unwrap().unwrap().status,
        TripStatus::InProgress
    );
}

// ── S5: manual close outside the fence ─────────────────────────────────────

#[tokio::test]
async fn manual_close_outside_alerts_admin() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    harness.clock.advance(Duration::seconds(300));
    trip::manual_close(
        harness.data.clone(),
        trip.id,
        ManualCloseRequest {
            latitude: 12.9000,
            longitude: 77.5000,
            reason: Some("shift end".to_string()),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![
            GeofenceEventType::ManualClosureOutsideGeofence,
            GeofenceEventType::AdminAlert,
        ]
    );

    let closed = harness.storage.trip(trip.id).await.unwrap().unwrap();
    assert_eq!(closed.status, TripStatus::Completed);
    assert_eq!(closed.duration_minutes, Some(5));
    assert_eq!(closed.office_entry_time, None);

    assert_eq!(
        harness.notifier.calls(),
        vec![format!("alert:{}:{}:shift end", trip.vehicle_id, trip.id)]
    );
}

#[tokio::test]
async fn manual_close_inside_is_clean() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    trip::manual_close(
        harness.data.clone(),
        trip.id,
        ManualCloseRequest {
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            reason: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![GeofenceEventType::ManualClosure]
    );
    assert!(harness.notifier.calls().is_empty());
}

#[tokio::test]
async fn manual_close_twice_fails_terminal() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    let request = ManualCloseRequest {
        latitude: OFFICE_LAT,
        longitude: OFFICE_LON,
        reason: None,
    };
    trip::manual_close(harness.data.clone(), trip.id, request.clone())
        .await
        .unwrap();

    let err = trip::manual_close(harness.data.clone(), trip.id, request)
        .await
        .expect_err("second close must fail");
    assert!(matches!(err, AppError::TripAlreadyCompleted(_)));
}

// ── S6: concurrent duplicate closure pings ─────────────────────────────────

#[tokio::test]
async fn concurrent_duplicate_pings_close_exactly_once() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    harness.clock.advance(Duration::seconds(10));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10))).await;
    harness.clock.advance(Duration::seconds(40));

    let closing = ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(50));
    let task_a = {
        let data = harness.data.clone();
        let request = closing.clone();
        tokio::spawn(async move { location::process_location_update(data, request).await })
    };
    let task_b = {
        let data = harness.data.clone();
        let request = closing.clone();
        tokio::spawn(async move { location::process_location_update(data, request).await })
    };

    task_a.await.unwrap().unwrap();
    task_b.await.unwrap().unwrap();

    let kinds = audit_kinds(&harness, trip.id).await;
    assert_eq!(
        kinds
            .iter()
            .filter(|kind| **kind == GeofenceEventType::OfficeReached)
            .count(),
        1
    );
    assert_eq!(
        kinds
            .iter()
            .filter(|kind| **kind == GeofenceEventType::TripCompleted)
            .count(),
        1
    );
    assert_eq!(
        harness
            .notifier
            .calls()
            .iter()
            .filter(|call| call.starts_with("completion"))
            .count(),
        1
    );
}

// ── Idempotency laws ───────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_pickup_pings_fire_once() {
    let harness = harness();
    let trip = in_progress_trip(&harness).await;
    pickup_for(&harness, trip.id, PICKUP_LAT, PICKUP_LON).await;

    for round in 1..=3i64 {
        harness.clock.advance(Duration::seconds(5));
        drive(
            &harness,
            ping(&trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(5 * round)),
        )
        .await;
    }

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![GeofenceEventType::PickupArrived]
    );
    assert_eq!(
        harness
            .notifier
            .calls()
            .iter()
            .filter(|call| call.starts_with("pickup"))
            .count(),
        1
    );
}

#[tokio::test]
async fn repeated_closing_pings_complete_once() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;

    harness.clock.advance(Duration::seconds(10));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10))).await;

    for round in 0..3i64 {
        harness.clock.advance(Duration::seconds(40));
        drive(
            &harness,
            ping(
                &trip,
                OFFICE_LAT,
                OFFICE_LON,
                2.0,
                t0() + Duration::seconds(50 + 40 * round),
            ),
        )
        .await;
    }

    assert_eq!(
        audit_kinds(&harness, trip.id).await,
        vec![GeofenceEventType::OfficeReached, GeofenceEventType::TripCompleted]
    );
}

// ── Batch path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_is_equivalent_to_sorted_sync_replay() {
    // Batch harness: pings submitted out of order.
    let batched = harness();
    office_geofence(&batched).await;
    let batched_trip = in_progress_trip(&batched).await;
    pickup_for(&batched, batched_trip.id, PICKUP_LAT, PICKUP_LON).await;

    batched.clock.advance(Duration::seconds(60));
    let requests = vec![
        ping(&batched_trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(45)),
        ping(&batched_trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(1)),
        ping(&batched_trip, OFFICE_LAT, OFFICE_LON, 2.0, t0() + Duration::seconds(10)),
    ];
    let summary = location::process_batch(batched.data.clone(), requests.clone())
        .await
        .unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 0);

    // Sync harness: same pings pre-sorted by device timestamp.
    let synced = harness();
    office_geofence(&synced).await;
    let synced_trip = in_progress_trip(&synced).await;
    pickup_for(&synced, synced_trip.id, PICKUP_LAT, PICKUP_LON).await;

    synced.clock.advance(Duration::seconds(60));
    let mut sorted = requests
        .into_iter()
        .map(|mut request| {
            request.trip_id = synced_trip.id;
            request.vehicle_id = synced_trip.vehicle_id;
            request
        })
        .collect::<Vec<_>>();
    sorted.sort_by_key(|request| request.timestamp);
    for request in sorted {
        drive(&synced, request).await;
    }

    assert_eq!(
        audit_kinds(&batched, batched_trip.id).await,
        audit_kinds(&synced, synced_trip.id).await
    );

    let batched_result = batched.storage.trip(batched_trip.id).await.unwrap().unwrap();
    let synced_result = synced.storage.trip(synced_trip.id).await.unwrap().unwrap();
    assert_eq!(batched_result.status, synced_result.status);
    assert!((batched_result.total_distance_km - synced_result.total_distance_km).abs() < 1e-9);
}

#[tokio::test]
async fn empty_and_oversized_batches_are_rejected() {
    let harness = harness();
    let trip = in_progress_trip(&harness).await;

    let err = location::process_batch(harness.data.clone(), vec![])
        .await
        .expect_err("empty batch must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let oversized = (0..101i64)
        .map(|i| ping(&trip, OFFICE_LAT, OFFICE_LON, 10.0, t0() + Duration::seconds(i)))
        .collect();
    let err = location::process_batch(harness.data.clone(), oversized)
        .await
        .expect_err("oversized batch must fail");
    assert!(matches!(err, AppError::BatchSizeExceeded(101, 100)));
}

#[tokio::test]
async fn batch_continues_past_a_bad_ping() {
    let harness = harness();
    let trip = in_progress_trip(&harness).await;

    let mut bad = ping(&trip, OFFICE_LAT, OFFICE_LON, 10.0, t0() + Duration::seconds(1));
    bad.trip_id = 9999;
    let good = ping(&trip, OFFICE_LAT, OFFICE_LON, 10.0, t0() + Duration::seconds(2));

    let summary = location::process_batch(harness.data.clone(), vec![bad, good])
        .await
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        harness
            .storage
            .locations_for_trip(trip.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

// ── Async dispatch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn worker_pool_drains_queued_pings() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Clock::manual(t0());
    let (dispatcher, receiver) = LocationDispatcher::channel(16);
    let state = AppState::new(
        &test_config(),
        storage.clone(),
        notifier,
        dispatcher.clone(),
        clock.clone(),
    );
    let data = Data::new(state);

    let harness = Harness {
        data: data.clone(),
        storage: storage.clone(),
        notifier: Arc::new(RecordingNotifier::default()),
        clock,
    };
    let trip = in_progress_trip(&harness).await;

    tokio::spawn(run_workers(data.clone(), receiver, 2));

    dispatcher
        .try_submit(ping(&trip, OFFICE_LAT, OFFICE_LON, 10.0, t0() + Duration::seconds(1)))
        .unwrap();

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    loop {
        if !storage.locations_for_trip(trip.id).await.unwrap().is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker pool never processed the ping"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
}

// ── Trip lifecycle admin paths ─────────────────────────────────────────────

#[tokio::test]
async fn start_trip_stamps_and_publishes() {
    let harness = harness();
    let vehicle = harness
        .storage
        .create_vehicle(Vehicle {
            id: 0,
            registration_number: "KA01CD5678".to_string(),
            status: VehicleStatus::Active,
        })
        .await
        .unwrap();
    let pending = harness
        .storage
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
        .await
        .unwrap();

    let mut events = harness.data.bus.subscribe_geofence_events();
    trip::start_trip(harness.data.clone(), pending.id)
        .await
        .unwrap();

    let started = harness.storage.trip(pending.id).await.unwrap().unwrap();
    assert_eq!(started.status, TripStatus::InProgress);
    assert_eq!(started.start_time, Some(t0()));

    let broadcast = events.try_recv().unwrap();
    assert_eq!(broadcast.event_type, TRIP_STARTED);
    assert_eq!(broadcast.trip_id, pending.id);

    let err = trip::start_trip(harness.data.clone(), pending.id)
        .await
        .expect_err("starting twice must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[tokio::test]
async fn reset_restores_pending_and_empties_logs() {
    let harness = harness();
    office_geofence(&harness).await;
    let trip = in_progress_trip(&harness).await;
    let pickup = pickup_for(&harness, trip.id, PICKUP_LAT, PICKUP_LON).await;

    harness.clock.advance(Duration::seconds(5));
    drive(&harness, ping(&trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(5))).await;

    trip::reset_all(harness.data.clone()).await.unwrap();

    let reset = harness.storage.trip(trip.id).await.unwrap().unwrap();
    assert_eq!(reset.status, TripStatus::Pending);
    assert_eq!(reset.start_time, None);
    assert_eq!(reset.total_distance_km, 0.0);
    assert!(harness
        .storage
        .locations_for_trip(trip.id)
        .await
        .unwrap()
        .is_empty());
    assert!(harness.storage.events_by_trip(trip.id).await.unwrap().is_empty());
    assert_eq!(
        harness
            .storage
            .pickups_for_trip(trip.id)
            .await
            .unwrap()
            .into_iter()
            .find(|candidate| candidate.id == pickup.id)
            .unwrap()
            .status,
        PickupStatus::Pending
    );
}

#[tokio::test]
async fn reset_with_no_trips_fails() {
    let harness = harness();
    let err = trip::reset_all(harness.data.clone())
        .await
        .expect_err("reset without trips must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

// ── Audit queries ──────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_projections_and_range_validation() {
    let harness = harness();
    let trip = in_progress_trip(&harness).await;
    pickup_for(&harness, trip.id, PICKUP_LAT, PICKUP_LON).await;

    harness.clock.advance(Duration::seconds(5));
    drive(&harness, ping(&trip, PICKUP_LAT, PICKUP_LON, 10.0, t0() + Duration::seconds(5))).await;

    let by_trip = audit::events_by_trip(harness.data.clone(), trip.id)
        .await
        .unwrap();
    assert_eq!(by_trip.len(), 1);
    assert_eq!(by_trip[0].event_type, GeofenceEventType::PickupArrived);
    assert_eq!(by_trip[0].event_timestamp, t0() + Duration::seconds(5));
    assert!(by_trip[0].created_at.is_some());

    let by_vehicle = audit::events_by_vehicle(harness.data.clone(), trip.vehicle_id)
        .await
        .unwrap();
    assert_eq!(by_vehicle.len(), 1);

    let in_range = audit::events_by_time_range(
        harness.data.clone(),
        t0(),
        t0() + Duration::seconds(10),
    )
    .await
    .unwrap();
    assert_eq!(in_range.len(), 1);

    let out_of_range = audit::events_by_time_range(
        harness.data.clone(),
        t0() + Duration::seconds(6),
        t0() + Duration::seconds(10),
    )
    .await
    .unwrap();
    assert!(out_of_range.is_empty());

    let err = audit::events_by_time_range(
        harness.data.clone(),
        t0() + Duration::seconds(10),
        t0(),
    )
    .await
    .expect_err("inverted range must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

// ── Geofence admin ─────────────────────────────────────────────────────────

#[tokio::test]
async fn geofence_crud_validates_and_invalidates_cache() {
    let harness = harness();

    let err = geofence::create(
        harness.data.clone(),
        OfficeGeofenceRequest {
            name: None,
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            radius_meters: 0.0,
            shape: None,
            polygon: None,
        },
    )
    .await
    .expect_err("non-positive radius must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let err = geofence::create(
        harness.data.clone(),
        OfficeGeofenceRequest {
            name: None,
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            radius_meters: 100.0,
            shape: Some(GeofenceShape::Polygon),
            polygon: Some(vec![(12.970, 77.593), (12.972, 77.593)]),
        },
    )
    .await
    .expect_err("two-vertex polygon must fail");
    assert!(matches!(err, AppError::InvalidRequest(_)));

    // Prime the cache with the empty geofence table, then create: the write
    // must invalidate so the engine sees the new fence immediately.
    assert!(harness.data.static_data.office_geofences().await.unwrap().is_empty());
    let created = geofence::create(
        harness.data.clone(),
        OfficeGeofenceRequest {
            name: Some("Bangalore HQ".to_string()),
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            radius_meters: 100.0,
            shape: None,
            polygon: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        harness.data.static_data.office_geofences().await.unwrap().len(),
        1
    );

    let updated = geofence::update(
        harness.data.clone(),
        created.id,
        OfficeGeofenceRequest {
            name: Some("Bangalore HQ".to_string()),
            latitude: OFFICE_LAT,
            longitude: OFFICE_LON,
            radius_meters: 250.0,
            shape: None,
            polygon: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.radius_meters, 250.0);

    geofence::delete(harness.data.clone(), created.id)
        .await
        .unwrap();
    let err = geofence::get(harness.data.clone(), created.id)
        .await
        .expect_err("deleted geofence must be gone");
    assert!(matches!(err, AppError::GeofenceNotFound(_)));
}

// ── Error paths and best-effort audit ──────────────────────────────────────

#[tokio::test]
async fn unknown_trip_is_not_found() {
    let harness = harness();
    let request = LocationUpdateRequest {
        vehicle_id: 1,
        trip_id: 404,
        latitude: OFFICE_LAT,
        longitude: OFFICE_LON,
        speed: 10.0,
        timestamp: t0(),
    };

    let err = location::process_location_update(harness.data.clone(), request)
        .await
        .expect_err("unknown trip must fail");
    assert!(matches!(err, AppError::TripNotFound(404)));
}

/// Fake store whose audit inserts always fail; everything else delegates.
struct FailingAuditStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl TrackingStorage for FailingAuditStorage {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, AppError> {
        self.inner.list_vehicles().await
    }
    async fn vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>, AppError> {
        self.inner.vehicle(vehicle_id).await
    }
    async fn create_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, AppError> {
        self.inner.create_vehicle(vehicle).await
    }
    async fn driver_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Driver>, AppError> {
        self.inner.driver_for_vehicle(vehicle_id).await
    }
    async fn create_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        self.inner.create_driver(driver).await
    }
    async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        self.inner.list_trips().await
    }
    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>, AppError> {
        self.inner.trip(trip_id).await
    }
    async fn trip_for_update(&self, trip_id: TripId) -> Result<Option<Trip>, AppError> {
        self.inner.trip_for_update(trip_id).await
    }
    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError> {
        self.inner.save_trip(trip).await
    }
    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        self.inner.create_trip(trip).await
    }
    async fn list_pickups(&self) -> Result<Vec<PickupPoint>, AppError> {
        self.inner.list_pickups().await
    }
    async fn pickups_for_trip(&self, trip_id: TripId) -> Result<Vec<PickupPoint>, AppError> {
        self.inner.pickups_for_trip(trip_id).await
    }
    async fn create_pickup(&self, pickup: PickupPoint) -> Result<PickupPoint, AppError> {
        self.inner.create_pickup(pickup).await
    }
    async fn set_pickup_status(
        &self,
        pickup_id: PickupPointId,
        status: PickupStatus,
    ) -> Result<(), AppError> {
        self.inner.set_pickup_status(pickup_id, status).await
    }
    async fn list_geofences(&self) -> Result<Vec<OfficeGeofence>, AppError> {
        self.inner.list_geofences().await
    }
    async fn geofence(&self, geofence_id: GeofenceId) -> Result<Option<OfficeGeofence>, AppError> {
        self.inner.geofence(geofence_id).await
    }
    async fn create_geofence(&self, geofence: OfficeGeofence) -> Result<OfficeGeofence, AppError> {
        self.inner.create_geofence(geofence).await
    }
    async fn update_geofence(
        &self,
        geofence: OfficeGeofence,
    ) -> Result<Option<OfficeGeofence>, AppError> {
        self.inner.update_geofence(geofence).await
    }
    async fn delete_geofence(&self, geofence_id: GeofenceId) -> Result<bool, AppError> {
        self.inner.delete_geofence(geofence_id).await
    }
    async fn append_location(&self, log: LocationLog) -> Result<LocationLog, AppError> {
        self.inner.append_location(log).await
    }
    async fn latest_location(&self, trip_id: TripId) -> Result<Option<LocationLog>, AppError> {
        self.inner.latest_location(trip_id).await
    }
    async fn locations_for_trip(&self, trip_id: TripId) -> Result<Vec<LocationLog>, AppError> {
        self.inner.locations_for_trip(trip_id).await
    }
    async fn list_locations(&self) -> Result<Vec<LocationLog>, AppError> {
        self.inner.list_locations().await
    }
    async fn delete_locations_for_trip(&self, trip_id: TripId) -> Result<(), AppError> {
        self.inner.delete_locations_for_trip(trip_id).await
    }
    async fn save_event(&self, _event: EventLog) -> Result<EventLog, AppError> {
        Err(AppError::StorageError("audit table unavailable".to_string()))
    }
    async fn exists_event(
        &self,
        trip_id: TripId,
        kind: GeofenceEventType,
    ) -> Result<bool, AppError> {
        self.inner.exists_event(trip_id, kind).await
    }
    async fn events_by_trip(&self, trip_id: TripId) -> Result<Vec<EventLog>, AppError> {
        self.inner.events_by_trip(trip_id).await
    }
    async fn events_by_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<EventLog>, AppError> {
        self.inner.events_by_vehicle(vehicle_id).await
    }
    async fn events_by_time_range(
        &self,
        from: TimeStamp,
        to: TimeStamp,
    ) -> Result<Vec<EventLog>, AppError> {
        self.inner.events_by_time_range(from, to).await
    }
    async fn list_events(&self) -> Result<Vec<EventLog>, AppError> {
        self.inner.list_events().await
    }
    async fn delete_events_for_trip(&self, trip_id: TripId) -> Result<(), AppError> {
        self.inner.delete_events_for_trip(trip_id).await
    }
}

#[tokio::test]
async fn audit_write_failure_does_not_block_the_trip() {
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Clock::manual(t0());
    let (dispatcher, _receiver) = LocationDispatcher::channel(16);
    let storage = Arc::new(FailingAuditStorage {
        inner: MemoryStorage::new(),
    });
    let state = AppState::new(
        &test_config(),
        storage.clone(),
        notifier.clone(),
        dispatcher,
        clock.clone(),
    );
    let data = Data::new(state);

    let vehicle = storage
        .create_vehicle(Vehicle {
            id: 0,
            registration_number: "KA01AB1234".to_string(),
            status: VehicleStatus::Active,
        })
        .await
        .unwrap();
    let mut trip = storage
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
        .await
        .unwrap();
    trip.status = TripStatus::InProgress;
    trip.start_time = Some(clock.now());
    storage.save_trip(&trip).await.unwrap();
    storage
        .create_pickup(PickupPoint {
            id: 0,
            trip_id: trip.id,
            latitude: PICKUP_LAT,
            longitude: PICKUP_LON,
            radius_meters: 50.0,
            status: PickupStatus::Pending,
        })
        .await
        .unwrap();

    location::process_location_update(
        data,
        LocationUpdateRequest {
            vehicle_id: vehicle.id,
            trip_id: trip.id,
            latitude: PICKUP_LAT,
            longitude: PICKUP_LON,
            speed: 10.0,
            timestamp: t0() + Duration::seconds(1),
        },
    )
    .await
    .expect("ping must survive the audit failure");

    // Operational state advanced, the audit row is the only loss.
    assert_eq!(
        storage.pickups_for_trip(trip.id).await.unwrap()[0].status,
        PickupStatus::Arrived
    );
    assert_eq!(storage.locations_for_trip(trip.id).await.unwrap().len(), 1);
    assert!(storage.events_by_trip(trip.id).await.unwrap().is_empty());
    assert_eq!(notifier.calls().len(), 1);
}

// ── Live bus ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_accepted_ping_is_broadcast_after_commit() {
    let harness = harness();
    let trip = in_progress_trip(&harness).await;

    let mut updates = harness.data.bus.subscribe_locations();

    harness.clock.advance(Duration::seconds(5));
    drive(&harness, ping(&trip, OFFICE_LAT, OFFICE_LON, 12.5, t0() + Duration::seconds(5))).await;

    let update = updates.try_recv().unwrap();
    assert_eq!(update.trip_id, trip.id);
    assert_eq!(update.vehicle_reg, "KA01AB1234");
    assert_eq!(update.speed, 12.5);
    assert_eq!(update.trip_status, TripStatus::InProgress);
}
