//! Schedule models (planned maintenance visits)

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

/// Schedule status.
///
/// Clients historically sent free text; every spelling of "done" maps onto
/// `Completed` and both spellings of "cancelled" onto `Cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleStatus {
    #[default]
    Scheduled,
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Approved => "approved",
            ScheduleStatus::Rejected => "rejected",
            ScheduleStatus::Completed => "complete",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled schedules are closed for work
    pub fn is_inactive(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }

    /// Canonical strings of the inactive set, for SQL filters
    pub fn inactive_values() -> Vec<String> {
        vec![
            ScheduleStatus::Completed.as_str().to_string(),
            ScheduleStatus::Cancelled.as_str().to_string(),
        ]
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" | "active" | "open" => Ok(ScheduleStatus::Scheduled),
            "pending" => Ok(ScheduleStatus::Pending),
            "approved" => Ok(ScheduleStatus::Approved),
            "rejected" => Ok(ScheduleStatus::Rejected),
            "done" | "completed" | "complete" | "complate" | "selesai" => {
                Ok(ScheduleStatus::Completed)
            }
            "cancelled" | "canceled" => Ok(ScheduleStatus::Cancelled),
            other => Err(AppError::Validation(format!("Invalid schedule status: {}", other))),
        }
    }
}

impl TryFrom<String> for ScheduleStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleStatus> for String {
    fn from(value: ScheduleStatus) -> Self {
        value.as_str().to_string()
    }
}

text_enum_sqlx!(ScheduleStatus);

/// A planned maintenance visit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: i32,
    pub title: String,
    /// Visit day, stored at 12:00 local time
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    #[schema(value_type = String, example = "scheduled")]
    pub status: ScheduleStatus,
    /// Username of the assigned technician
    pub assigned_ts: Option<String>,
    pub store_id: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Field values written by a checked insert or update
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub status: ScheduleStatus,
    pub assigned_ts: Option<String>,
    pub store_id: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Schedule> for ScheduleDraft {
    fn from(s: Schedule) -> Self {
        Self {
            title: s.title,
            start: s.start,
            end: s.end,
            status: s.status,
            assigned_ts: s.assigned_ts,
            store_id: s.store_id,
            completed_at: s.completed_at,
        }
    }
}

/// Create schedule request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchedule {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    /// Visit date (`YYYY-MM-DD` or a timestamp; only the local day is kept)
    pub start: String,
    pub end: Option<String>,
    pub store_id: Option<i32>,
    pub assigned_ts: Option<String>,
    pub status: Option<String>,
}

/// Partial schedule update
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchedule {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub status: Option<String>,
    pub assigned_ts: Option<String>,
    pub store_id: Option<i32>,
}

/// Reschedule request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub start: String,
}

/// Query parameters for schedule listing
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    /// Filter by status (any accepted spelling)
    pub status: Option<String>,
    /// Filter by assigned technician
    pub assigned_ts: Option<String>,
    pub store_id: Option<i32>,
}
