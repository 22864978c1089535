use actix_web::{
    get,
    web::{Data, Json, Path, Query},
};
use serde::Deserialize;

use crate::common::types::*;
use crate::domain::action::audit;
use crate::environment::AppState;
use crate::tools::error::AppError;

#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    from: TimeStamp,
    to: TimeStamp,
}

#[get("/audit/trip/{trip_id}")]
pub async fn events_by_trip(
    data: Data<AppState>,
    path: Path<TripId>,
) -> Result<Json<Vec<EventLog>>, AppError> {
    Ok(Json(audit::events_by_trip(data, path.into_inner()).await?))
}

#[get("/audit/vehicle/{vehicle_id}")]
pub async fn events_by_vehicle(
    data: Data<AppState>,
    path: Path<VehicleId>,
) -> Result<Json<Vec<EventLog>>, AppError> {
    Ok(Json(audit::events_by_vehicle(data, path.into_inner()).await?))
}

#[get("/audit/events")]
pub async fn events_by_time_range(
    data: Data<AppState>,
    query: Query<TimeRangeQuery>,
) -> Result<Json<Vec<EventLog>>, AppError> {
    let TimeRangeQuery { from, to } = query.into_inner();
    Ok(Json(audit::events_by_time_range(data, from, to).await?))
}
