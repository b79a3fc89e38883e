//! Store model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// A physical location visited by technicians
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i32,
    /// Unique store code
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    /// Username of the technician in charge of this store
    pub ts_assigned: Option<String>,
}

/// Create store request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStore {
    #[validate(length(min = 1, max = 64, message = "Store code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 120, message = "Store name is required"))]
    pub name: String,
    pub location: Option<String>,
    pub ts_assigned: Option<String>,
}

/// Update store request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStore {
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub location: Option<String>,
    pub ts_assigned: Option<String>,
}
