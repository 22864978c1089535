/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};

use crate::common::types::{GeofenceId, TripId};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    error_message: String,
    pub error_code: String,
}

#[derive(Debug, Serialize, thiserror::Error)]
pub enum AppError {
    #[error("INTERNAL_ERROR")]
    InternalError(String),
    #[error("INVALID_REQUEST")]
    InvalidRequest(String),
    #[error("TRIP_NOT_FOUND")]
    TripNotFound(TripId),
    #[error("GEOFENCE_NOT_FOUND")]
    GeofenceNotFound(GeofenceId),
    #[error("TRIP_ALREADY_COMPLETED")]
    TripAlreadyCompleted(TripId),
    #[error("BATCH_SIZE_EXCEEDED")]
    BatchSizeExceeded(usize, usize),
    #[error("STORAGE_ERROR")]
    StorageError(String),
    #[error("LARGE_PAYLOAD_SIZE")]
    LargePayloadSize(usize, usize),
    #[error("REQUEST_TIMEOUT")]
    RequestTimeout,
}

impl AppError {
    fn error_message(&self) -> ErrorBody {
        ErrorBody {
            error_message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::TripNotFound(trip_id) => {
                format!("Trip not found : TripId - {trip_id}")
            }
            AppError::GeofenceNotFound(geofence_id) => {
                format!("Office geofence not found : GeofenceId - {geofence_id}")
            }
            AppError::TripAlreadyCompleted(trip_id) => {
                format!("Trip is already completed : TripId - {trip_id}")
            }
            AppError::BatchSizeExceeded(size, limit) => {
                format!("Batch size ({size}) greater than allowed maximum limit : ({limit}). Split into smaller batches.")
            }
            AppError::StorageError(err) => err.to_string(),
            AppError::LargePayloadSize(length, limit) => {
                format!("Content length ({length} Bytes) greater than allowed maximum limit : ({limit} Bytes)")
            }
            AppError::RequestTimeout => "Request Timeout".to_string(),
        }
    }

    fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::TripNotFound(_) => "TRIP_NOT_FOUND",
            AppError::GeofenceNotFound(_) => "GEOFENCE_NOT_FOUND",
            AppError::TripAlreadyCompleted(_) => "TRIP_ALREADY_COMPLETED",
            AppError::BatchSizeExceeded(_, _) => "BATCH_SIZE_EXCEEDED",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::LargePayloadSize(_, _) => "LARGE_PAYLOAD_SIZE",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
        }
        .to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_message())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TripNotFound(_) => StatusCode::NOT_FOUND,
            AppError::GeofenceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TripAlreadyCompleted(_) => StatusCode::BAD_REQUEST,
            AppError::BatchSizeExceeded(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LargePayloadSize(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}
