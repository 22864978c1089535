use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    HttpResponse,
};

use crate::common::types::*;
use crate::domain::{action::geofence, types::geofence::OfficeGeofenceRequest};
use crate::environment::AppState;
use crate::tools::error::AppError;

#[get("/geofences")]
pub async fn list(data: Data<AppState>) -> Result<Json<Vec<OfficeGeofence>>, AppError> {
    Ok(Json(geofence::list(data).await?))
}

#[get("/geofences/{geofence_id}")]
pub async fn get(
    data: Data<AppState>,
    path: Path<GeofenceId>,
) -> Result<Json<OfficeGeofence>, AppError> {
    Ok(Json(geofence::get(data, path.into_inner()).await?))
}

#[post("/geofences")]
pub async fn create(
    data: Data<AppState>,
    param_obj: Json<OfficeGeofenceRequest>,
) -> Result<HttpResponse, AppError> {
    let created = geofence::create(data, param_obj.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[put("/geofences/{geofence_id}")]
pub async fn update(
    data: Data<AppState>,
    path: Path<GeofenceId>,
    param_obj: Json<OfficeGeofenceRequest>,
) -> Result<Json<OfficeGeofence>, AppError> {
    Ok(Json(
        geofence::update(data, path.into_inner(), param_obj.into_inner()).await?,
    ))
}

#[delete("/geofences/{geofence_id}")]
pub async fn delete(
    data: Data<AppState>,
    path: Path<GeofenceId>,
) -> Result<Json<APISuccess>, AppError> {
    Ok(Json(geofence::delete(data, path.into_inner()).await?))
}
