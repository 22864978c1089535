use actix_web::{get, web::Json};

use crate::common::types::APISuccess;

#[get("/healthcheck")]
pub async fn health_check() -> Json<APISuccess> {
    Json(APISuccess::default())
}
