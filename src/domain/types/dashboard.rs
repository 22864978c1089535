use serde::Serialize;

use crate::common::types::*;

/// Everything the dashboard needs in one poll.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub vehicles: Vec<Vehicle>,
    pub trips: Vec<TripOverview>,
    pub pickup_points: Vec<PickupPoint>,
    pub office_geofences: Vec<OfficeGeofence>,
    pub location_logs: Vec<LocationLog>,
    pub events: Vec<EventLog>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TripOverview {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub vehicle_reg: String,
    pub status: TripStatus,
    pub start_time: Option<TimeStamp>,
    pub end_time: Option<TimeStamp>,
    pub total_distance_km: f64,
    pub duration_minutes: Option<i64>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_license: Option<String>,
    pub current_speed: SpeedKmh,
    pub eta_minutes: Option<i64>,
    pub eta_destination: Option<String>,
}
