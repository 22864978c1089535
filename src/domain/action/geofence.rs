/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;
use tracing::info;

use crate::common::types::*;
use crate::domain::types::geofence::OfficeGeofenceRequest;
use crate::environment::AppState;
use crate::tools::error::AppError;

fn validate(request: &OfficeGeofenceRequest) -> Result<(), AppError> {
    if request.radius_meters <= 0.0 {
        return Err(AppError::InvalidRequest(
            "radiusMeters must be positive".to_string(),
        ));
    }
    if request.shape() == GeofenceShape::Polygon && request.polygon_points().len() < 3 {
        return Err(AppError::InvalidRequest(
            "polygon must have at least 3 vertices".to_string(),
        ));
    }
    Ok(())
}

pub async fn list(data: Data<AppState>) -> Result<Vec<OfficeGeofence>, AppError> {
    data.storage.list_geofences().await
}

pub async fn get(
    data: Data<AppState>,
    geofence_id: GeofenceId,
) -> Result<OfficeGeofence, AppError> {
    data.storage
        .geofence(geofence_id)
        .await?
        .ok_or(AppError::GeofenceNotFound(geofence_id))
}

pub async fn create(
    data: Data<AppState>,
    request: OfficeGeofenceRequest,
) -> Result<OfficeGeofence, AppError> {
    validate(&request)?;

    let geofence = data
        .storage
        .create_geofence(OfficeGeofence {
            id: 0,
            name: request.name.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: request.radius_meters,
            shape: request.shape(),
            polygon: request.polygon_points(),
        })
        .await?;

    data.static_data.invalidate_geofences();
    info!(
        tag = "[Geofence]",
        geofence_id = geofence.id,
        shape = %geofence.shape,
        "Office geofence created"
    );
    Ok(geofence)
}

pub async fn update(
    data: Data<AppState>,
    geofence_id: GeofenceId,
    request: OfficeGeofenceRequest,
) -> Result<OfficeGeofence, AppError> {
    validate(&request)?;

    let updated = data
        .storage
        .update_geofence(OfficeGeofence {
            id: geofence_id,
            name: request.name.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: request.radius_meters,
            shape: request.shape(),
            polygon: request.polygon_points(),
        })
        .await?
        .ok_or(AppError::GeofenceNotFound(geofence_id))?;

    data.static_data.invalidate_geofences();
    info!(tag = "[Geofence]", geofence_id, "Office geofence updated");
    Ok(updated)
}

pub async fn delete(data: Data<AppState>, geofence_id: GeofenceId) -> Result<APISuccess, AppError> {
    if !data.storage.delete_geofence(geofence_id).await? {
        return Err(AppError::GeofenceNotFound(geofence_id));
    }

    data.static_data.invalidate_geofences();
    info!(tag = "[Geofence]", geofence_id, "Office geofence deleted");
    Ok(APISuccess::default())
}
