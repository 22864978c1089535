use actix_web::{
    get, post,
    web::{Data, Json, Path},
};

use crate::common::types::*;
use crate::domain::{
    action::{dashboard, trip},
    types::dashboard::DashboardData,
};
use crate::environment::AppState;
use crate::tools::error::AppError;

#[get("/dashboard/data")]
pub async fn dashboard_data(data: Data<AppState>) -> Result<Json<DashboardData>, AppError> {
    Ok(Json(dashboard::dashboard_data(data).await?))
}

#[post("/dashboard/start-trip/{trip_id}")]
pub async fn start_trip(
    data: Data<AppState>,
    path: Path<TripId>,
) -> Result<Json<APISuccess>, AppError> {
    Ok(Json(trip::start_trip(data, path.into_inner()).await?))
}

#[post("/dashboard/reset")]
pub async fn reset(data: Data<AppState>) -> Result<Json<APISuccess>, AppError> {
    Ok(Json(trip::reset_all(data).await?))
}
