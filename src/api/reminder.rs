//! Manual hooks of the reminder sweep, guarded by a shared key

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

const KEY_HEADER: &str = "x-internal-key";

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TickQuery {
    /// Ignore the hour windows (dedup still applies)
    pub force: Option<String>,
    /// Return the sweep report
    pub debug: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TestQuery {
    pub msg: Option<String>,
    /// Attach an "Open App" button
    pub btn: Option<String>,
    pub key: Option<String>,
}

/// `1`, `true` and `yes` switch a flag on
fn flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// The header wins over the query parameter; an empty configured key rejects everything
fn authorized(expected: &str, headers: &HeaderMap, query_key: Option<&str>) -> bool {
    if expected.is_empty() {
        return false;
    }
    let provided = headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query_key);
    provided == Some(expected)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "ok": false, "error": "unauthorized" })),
    )
        .into_response()
}

/// Run one sweep now
#[utoipa::path(
    get,
    path = "/reminder/tick",
    tag = "reminder",
    params(TickQuery),
    responses(
        (status = 200, description = "Sweep ran; `info` holds the report in debug mode"),
        (status = 401, description = "Missing or wrong key"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn tick(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    Query(query): Query<TickQuery>,
) -> Response {
    if !authorized(&state.config.reminder.internal_key, &headers, query.key.as_deref()) {
        return unauthorized();
    }

    let report = state.services.reminder.tick(flag(query.force.as_deref())).await;
    if flag(query.debug.as_deref()) {
        Json(json!({ "ok": true, "info": report })).into_response()
    } else {
        Json(json!({ "ok": true })).into_response()
    }
}

/// Send a test message to the group
#[utoipa::path(
    get,
    path = "/reminder/test",
    tag = "reminder",
    params(TestQuery),
    responses(
        (status = 200, description = "`ok` tells whether the message was accepted"),
        (status = 401, description = "Missing or wrong key")
    )
)]
pub async fn test_message(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    Query(query): Query<TestQuery>,
) -> Response {
    if !authorized(&state.config.reminder.internal_key, &headers, query.key.as_deref()) {
        return unauthorized();
    }

    let message = query
        .msg
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Test notification");

    match state
        .services
        .reminder
        .send_test(message, flag(query.btn.as_deref()))
        .await
    {
        Some(ok) => Json(json!({ "ok": ok })).into_response(),
        None => Json(json!({ "ok": false, "error": "telegram-disabled" })).into_response(),
    }
}
