use actix_web::{
    post,
    web::{Data, Json, Path},
    HttpResponse,
};
use tracing::info;

use crate::common::types::*;
use crate::domain::{
    action::{location, trip},
    types::{
        location::{BatchSummary, LocationUpdateRequest},
        trip::ManualCloseRequest,
    },
};
use crate::environment::AppState;
use crate::tools::error::AppError;

#[post("/location/update")]
pub async fn update_location(
    data: Data<AppState>,
    param_obj: Json<LocationUpdateRequest>,
) -> Result<Json<APISuccess>, AppError> {
    let request = param_obj.into_inner();
    Ok(Json(location::process_location_update(data, request).await?))
}

/// 202-style ingestion: the ping is queued for the worker pool, or processed
/// inline when the queue is saturated. Either way it is never dropped.
#[post("/location/update/async")]
pub async fn update_location_async(
    data: Data<AppState>,
    param_obj: Json<LocationUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let request = param_obj.into_inner();

    if let Err(request) = data.dispatcher.try_submit(request) {
        info!(
            tag = "[Async Ingress]",
            trip_id = request.trip_id,
            "Queue saturated, running update on the caller"
        );
        location::process_location_update(data, request).await?;
    }

    Ok(HttpResponse::Accepted().json(APISuccess::default()))
}

#[post("/location/batch")]
pub async fn batch_update(
    data: Data<AppState>,
    param_obj: Json<Vec<LocationUpdateRequest>>,
) -> Result<Json<BatchSummary>, AppError> {
    let requests = param_obj.into_inner();
    Ok(Json(location::process_batch(data, requests).await?))
}

#[post("/trip/{trip_id}/manual-close")]
pub async fn manual_close(
    data: Data<AppState>,
    path: Path<TripId>,
    param_obj: Json<ManualCloseRequest>,
) -> Result<Json<APISuccess>, AppError> {
    let trip_id = path.into_inner();
    Ok(Json(trip::manual_close(data, trip_id, param_obj.into_inner()).await?))
}
