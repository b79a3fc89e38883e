//! Maintenance reports and their details document

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::asset::AssetStatus;

/// How long an approved fix request stays open
pub const FIX_REQUEST_WINDOW_MINUTES: i64 = 60;

/// History note used when a repaired item carries no note of its own
pub const DEFAULT_REPAIR_NOTE: &str = "Perbaikan (form maintenance)";

const FIX_REQUEST_TYPE: &str = "fix_request";

/// Maintenance status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaintenanceStatus {
    #[default]
    Submitted,
    Approved,
    Rejected,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Submitted => "submitted",
            MaintenanceStatus::Approved => "approved",
            MaintenanceStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MaintenanceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "submitted" => Ok(MaintenanceStatus::Submitted),
            "approved" => Ok(MaintenanceStatus::Approved),
            "rejected" => Ok(MaintenanceStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "Invalid maintenance status: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for MaintenanceStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MaintenanceStatus> for String {
    fn from(value: MaintenanceStatus) -> Self {
        value.as_str().to_string()
    }
}

text_enum_sqlx!(MaintenanceStatus);

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// One hardware line of a maintenance form.
///
/// Forms are produced by several client versions, so keys are read leniently:
/// `hardware` or `name`, `sn` or `serialNumber`, numeric or textual `no`.
/// Unknown keys (`lokasi`, `panduan`, `keterangan`, ...) are carried through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceItem {
    /// Row number on the paper form
    pub no: Option<i32>,
    pub hardware: Option<String>,
    pub serial_number: Option<String>,
    /// Condition: "baik" (good) or "tidak" (faulty)
    pub kondisi: Option<String>,
    /// Age in months
    pub usia: Option<i32>,
    pub repair_date: Option<String>,
    pub repair_note: Option<String>,
    pub extra: Map<String, Value>,
}

const ITEM_KEYS: [&str; 9] = [
    "no",
    "hardware",
    "name",
    "sn",
    "serialNumber",
    "kondisi",
    "usia",
    "repairDate",
    "repairNote",
];

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn row_number(value: Option<&Value>) -> Option<i32> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 1.0).then(|| n as i32)
}

impl MaintenanceItem {
    /// Read one item; anything that is not a JSON object is ignored
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let extra = obj
            .iter()
            .filter(|(k, _)| !ITEM_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            no: row_number(obj.get("no")),
            hardware: text_field(obj, "hardware").or_else(|| text_field(obj, "name")),
            serial_number: text_field(obj, "sn").or_else(|| text_field(obj, "serialNumber")),
            kondisi: text_field(obj, "kondisi"),
            usia: obj
                .get("usia")
                .and_then(Value::as_f64)
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i32),
            repair_date: text_field(obj, "repairDate"),
            repair_note: text_field(obj, "repairNote"),
            extra,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                obj.insert(key.to_string(), v);
            }
        };
        put("no", self.no.map(Value::from));
        put("hardware", self.hardware.clone().map(Value::from));
        put("sn", self.serial_number.clone().map(Value::from));
        put("kondisi", self.kondisi.clone().map(Value::from));
        put("usia", self.usia.map(Value::from));
        put("repairDate", self.repair_date.clone().map(Value::from));
        put("repairNote", self.repair_note.clone().map(Value::from));
        Value::Object(obj)
    }

    /// Asset status implied by the reported condition
    pub fn asset_status(&self) -> Option<AssetStatus> {
        match self.kondisi.as_deref().map(|k| k.trim().to_lowercase()).as_deref() {
            Some("tidak") => Some(AssetStatus::InRepair),
            Some("baik") => Some(AssetStatus::Active),
            _ => None,
        }
    }

    /// Only items with both a hardware name and a serial number feed the asset ledger
    pub fn is_trackable(&self) -> bool {
        self.hardware.is_some() && self.serial_number.is_some()
    }

    pub fn has_repair(&self) -> bool {
        self.repair_date.is_some() || self.repair_note.is_some()
    }
}

// ---------------------------------------------------------------------------
// Details document
// ---------------------------------------------------------------------------

/// Variant of a maintenance report
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailsKind {
    /// Regular scheduled visit
    #[default]
    WorkOrder,
    /// Ad-hoc repair ticket; approval opens a time-boxed window
    FixRequest {
        approved_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Parsed `details` document of a maintenance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetails", into = "RawDetails")]
pub struct MaintenanceDetails {
    pub items: Vec<MaintenanceItem>,
    /// Signature payloads, kept opaque
    pub signature: Option<Value>,
    /// Set whenever the content is revised
    pub fixed_at: Option<DateTime<Utc>>,
    pub kind: DetailsKind,
    /// Other top-level keys written by clients
    pub extra: Map<String, Value>,
}

/// Wire shape of the details document
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetails {
    #[serde(default)]
    items: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approved_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fixed_at: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Typed timestamp; values that do not parse stay in `extra` under `key`
fn take_timestamp(
    value: Option<Value>,
    key: &str,
    extra: &mut Map<String, Value>,
) -> Option<DateTime<Utc>> {
    let value = value?;
    let parsed = timestamp(&value);
    if parsed.is_none() {
        extra.insert(key.to_string(), value);
    }
    parsed
}

/// Keep a parked raw value unless a typed one replaces it
fn put_timestamp(
    value: Option<DateTime<Utc>>,
    key: &str,
    extra: &mut Map<String, Value>,
) -> Option<Value> {
    let value = timestamp_value(value);
    if value.is_some() {
        extra.remove(key);
    }
    value
}

fn timestamp_value(value: Option<DateTime<Utc>>) -> Option<Value> {
    value.map(|dt| Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
}

impl From<RawDetails> for MaintenanceDetails {
    fn from(raw: RawDetails) -> Self {
        let items = raw
            .items
            .as_array()
            .map(|arr| arr.iter().filter_map(MaintenanceItem::from_value).collect())
            .unwrap_or_default();

        let mut extra = raw.extra;
        let kind = match raw.kind {
            Some(Value::String(ref t)) if t == FIX_REQUEST_TYPE => DetailsKind::FixRequest {
                approved_at: take_timestamp(raw.approved_at, "approvedAt", &mut extra),
                expires_at: take_timestamp(raw.expires_at, "expiresAt", &mut extra),
            },
            other => {
                if let Some(t) = other {
                    extra.insert("type".to_string(), t);
                }
                if let Some(v) = raw.approved_at {
                    extra.insert("approvedAt".to_string(), v);
                }
                if let Some(v) = raw.expires_at {
                    extra.insert("expiresAt".to_string(), v);
                }
                DetailsKind::WorkOrder
            }
        };
        let fixed_at = take_timestamp(raw.fixed_at, "fixedAt", &mut extra);

        Self {
            items,
            signature: raw.signature,
            fixed_at,
            kind,
            extra,
        }
    }
}

impl From<MaintenanceDetails> for RawDetails {
    fn from(details: MaintenanceDetails) -> Self {
        let mut extra = details.extra;
        let (kind, approved_at, expires_at) = match details.kind {
            DetailsKind::WorkOrder => (extra.remove("type"), None, None),
            DetailsKind::FixRequest {
                approved_at,
                expires_at,
            } => {
                extra.remove("type");
                (
                    Some(Value::String(FIX_REQUEST_TYPE.to_string())),
                    put_timestamp(approved_at, "approvedAt", &mut extra),
                    put_timestamp(expires_at, "expiresAt", &mut extra),
                )
            }
        };
        let fixed_at = put_timestamp(details.fixed_at, "fixedAt", &mut extra);

        Self {
            items: Value::Array(details.items.iter().map(MaintenanceItem::to_value).collect()),
            signature: details.signature,
            kind,
            approved_at,
            expires_at,
            fixed_at,
            extra,
        }
    }
}

impl MaintenanceDetails {
    /// Parse a client payload, given either as a JSON object or as a string holding one
    pub fn from_payload(payload: &Value) -> AppResult<Self> {
        let parsed;
        let doc = match payload {
            Value::String(s) => {
                parsed = serde_json::from_str::<Value>(s)
                    .map_err(|e| AppError::Validation(format!("Invalid details JSON: {}", e)))?;
                &parsed
            }
            other => other,
        };
        if !doc.is_object() {
            return Err(AppError::Validation(
                "details must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(doc.clone())
            .map_err(|e| AppError::Validation(format!("Invalid details: {}", e)))
    }

    pub fn is_fix_request(&self) -> bool {
        matches!(self.kind, DetailsKind::FixRequest { .. })
    }

    /// Open the repair window of a fix request; no-op for work orders
    pub fn open_fix_window(&mut self, now: DateTime<Utc>) {
        if let DetailsKind::FixRequest {
            approved_at,
            expires_at,
        } = &mut self.kind
        {
            *approved_at = Some(now);
            *expires_at = Some(now + Duration::minutes(FIX_REQUEST_WINDOW_MINUTES));
        }
    }

    /// Reject forms that list the same serial number twice (case-insensitive)
    pub fn check_duplicate_serials(&self) -> AppResult<()> {
        let mut rows: IndexMap<String, Vec<i32>> = IndexMap::new();
        for item in &self.items {
            let Some(serial) = item.serial_number.as_deref() else {
                continue;
            };
            let entry = rows.entry(serial.to_lowercase()).or_default();
            let row = item.no.unwrap_or(entry.len() as i32 + 1);
            entry.push(row);
        }

        let duplicates: Vec<String> = rows
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(serial, rows)| {
                let list: Vec<String> = rows.iter().map(i32::to_string).collect();
                format!("{} (baris {})", serial, list.join(", "))
            })
            .collect();

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "Terdapat SN duplikat dalam form maintenance: {}",
                duplicates.join("; ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Database row of a maintenance
#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceRow {
    pub id: i32,
    pub title: String,
    pub details: sqlx::types::Json<MaintenanceDetails>,
    pub date: NaiveDateTime,
    pub store_name: Option<String>,
    pub technician: Option<String>,
    pub store_id: Option<i32>,
    pub status: MaintenanceStatus,
    pub submitted_by: Option<String>,
    pub approved_by: Option<String>,
    pub schedule_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A submitted service report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub id: i32,
    pub title: String,
    #[schema(value_type = Object)]
    pub details: MaintenanceDetails,
    pub date: NaiveDateTime,
    pub store_name: Option<String>,
    pub technician: Option<String>,
    pub store_id: Option<i32>,
    #[schema(value_type = String, example = "submitted")]
    pub status: MaintenanceStatus,
    pub submitted_by: Option<String>,
    pub approved_by: Option<String>,
    pub schedule_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MaintenanceRow> for Maintenance {
    fn from(row: MaintenanceRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            details: row.details.0,
            date: row.date,
            store_name: row.store_name,
            technician: row.technician,
            store_id: row.store_id,
            status: row.status,
            submitted_by: row.submitted_by,
            approved_by: row.approved_by,
            schedule_id: row.schedule_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields of a maintenance about to be inserted
#[derive(Debug, Clone)]
pub struct NewMaintenance {
    pub title: String,
    pub details: MaintenanceDetails,
    pub date: NaiveDateTime,
    pub store_name: Option<String>,
    pub technician: Option<String>,
    pub store_id: Option<i32>,
    pub submitted_by: Option<String>,
    pub schedule_id: Option<i32>,
}

/// Create maintenance request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaintenance {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    /// Visit date; replaced by the schedule date when `scheduleId` is set
    pub date: Option<String>,
    #[validate(length(max = 120))]
    pub store_name: Option<String>,
    pub store_id: Option<i32>,
    #[validate(length(max = 120))]
    pub technician: Option<String>,
    pub schedule_id: Option<i32>,
    /// Details document, as an object or a JSON string
    #[schema(value_type = Object)]
    pub details: Option<Value>,
}

/// Content update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaintenance {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[schema(value_type = Object)]
    pub details: Option<Value>,
    pub date: Option<String>,
    #[validate(length(max = 120))]
    pub store_name: Option<String>,
    #[validate(length(max = 120))]
    pub technician: Option<String>,
    pub store_id: Option<i32>,
}

/// Approve / reject request
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub approved_by: Option<String>,
}

/// Query parameters for maintenance listing
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceQuery {
    pub status: Option<String>,
    pub store_id: Option<i32>,
    pub submitted_by: Option<String>,
}

/// Yearly sequence of a maintenance within its store, for report numbering
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceResponse {
    pub id: i32,
    pub sequence: Option<i64>,
    pub store_name: Option<String>,
}
