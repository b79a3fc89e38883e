//! Asset ledger models

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::calendar;
use crate::error::AppError;

/// Lifecycle state of an asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetStatus {
    #[default]
    Active,
    InRepair,
    Retired,
    Lost,
    Disposed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::InRepair => "in_repair",
            AssetStatus::Retired => "retired",
            AssetStatus::Lost => "lost",
            AssetStatus::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AssetStatus::Active),
            "in_repair" | "in-repair" | "repair" => Ok(AssetStatus::InRepair),
            "retired" => Ok(AssetStatus::Retired),
            "lost" => Ok(AssetStatus::Lost),
            "disposed" => Ok(AssetStatus::Disposed),
            other => Err(AppError::Validation(format!("Invalid asset status: {}", other))),
        }
    }
}

impl TryFrom<String> for AssetStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetStatus> for String {
    fn from(value: AssetStatus) -> Self {
        value.as_str().to_string()
    }
}

text_enum_sqlx!(AssetStatus);

/// A tracked piece of hardware
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i32,
    pub asset_code: String,
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub store_id: Option<i32>,
    /// Store name at the time of the last update
    pub store_name: Option<String>,
    #[schema(value_type = String, example = "active")]
    pub status: AssetStatus,
    pub purchase_date: Option<NaiveDate>,
    /// Age in months as reported when the purchase date was unknown
    pub age_snapshot_months: Option<i32>,
    pub last_maintenance_date: Option<NaiveDateTime>,
    /// Row position on the last maintenance form
    pub last_maintenance_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Age in whole months: from the purchase date when known, else the recorded snapshot
    pub fn age_months(&self, today: NaiveDate) -> Option<i32> {
        match self.purchase_date {
            Some(purchased) => Some(calendar::months_between(purchased, today).max(0)),
            None => self.age_snapshot_months,
        }
    }
}

/// Whether an asset of the given age counts as old (threshold inclusive)
pub fn is_old(age_months: Option<i32>, threshold_years: i32) -> bool {
    age_months.is_some_and(|age| age >= threshold_years * 12)
}

/// Purchase date estimated from a reported age, pinned to the first of the month
pub fn estimate_purchase_date(
    maintenance_date: Option<NaiveDateTime>,
    age_months: Option<i32>,
) -> Option<NaiveDate> {
    let (date, months) = (maintenance_date?, age_months?);
    if months < 0 {
        return None;
    }
    calendar::first_of_month_before(date.date(), months)
}

/// Repair / note entry of an asset
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetHistory {
    pub id: i32,
    pub asset_id: i32,
    pub date: NaiveDate,
    pub note: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Latest history entry of an asset, fetched in batch
#[derive(Debug, Clone, FromRow)]
pub struct LatestHistory {
    pub asset_id: i32,
    pub date: NaiveDate,
    pub note: String,
}

/// Asset with its derived fields, as returned by the listing
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetListEntry {
    #[serde(flatten)]
    pub asset: Asset,
    pub age_months: Option<i32>,
    pub is_old: bool,
    pub last_history_date: Option<NaiveDate>,
    pub last_history_note: Option<String>,
}

/// Asset count of one store
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreAssetCount {
    pub store_id: i32,
    pub count: i64,
}

/// Merge input derived from one maintenance item
#[derive(Debug, Clone, Default)]
pub struct AssetUpsert {
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub maintenance_date: Option<NaiveDateTime>,
    pub age_months_input: Option<i32>,
    pub status: Option<AssetStatus>,
    pub maintenance_order: Option<i32>,
}

/// Query parameters for asset listing
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuery {
    /// Search in name, category, serial number, store name and asset code
    pub q: Option<String>,
    pub store_id: Option<i32>,
    pub category: Option<String>,
    pub status: Option<String>,
    /// Only assets at or above the age threshold
    pub old_only: Option<bool>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for per-store counts
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetCountQuery {
    /// Comma separated store ids
    pub store_ids: Option<String>,
}

/// Create asset request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAsset {
    #[validate(length(max = 64))]
    pub asset_code: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Asset name is required"))]
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub status: Option<String>,
    /// Purchase date (YYYY-MM-DD)
    pub purchase_date: Option<String>,
    pub age_snapshot_months: Option<i32>,
}

/// Update asset request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAsset {
    #[validate(length(min = 1, max = 64))]
    pub asset_code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub status: Option<String>,
    pub purchase_date: Option<String>,
    pub age_snapshot_months: Option<i32>,
}

/// Create history entry request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetHistory {
    /// Entry date (YYYY-MM-DD); today when absent
    pub date: Option<String>,
    #[validate(length(min = 1, message = "Note is required"))]
    pub note: String,
    pub created_by: Option<String>,
}

/// Update history entry request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetHistory {
    pub date: Option<String>,
    #[validate(length(min = 1))]
    pub note: Option<String>,
}
