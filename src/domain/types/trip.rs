use serde::{Deserialize, Serialize};

use crate::common::types::*;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ManualCloseRequest {
    pub latitude: Latitude,
    pub longitude: Longitude,
    /// Optional reason, forwarded into the admin alert.
    pub reason: Option<String>,
}
