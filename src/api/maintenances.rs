//! Maintenance report endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::maintenance::{
        CreateMaintenance, Maintenance, MaintenanceQuery, MaintenanceStatus, SequenceResponse,
        StatusChange, UpdateMaintenance,
    },
};

use super::AuthenticatedUser;

/// List reports, newest visit first
#[utoipa::path(
    get,
    path = "/maintenances",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(MaintenanceQuery),
    responses(
        (status = 200, description = "Maintenance reports", body = Vec<Maintenance>)
    )
)]
pub async fn list_maintenances(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MaintenanceQuery>,
) -> AppResult<Json<Vec<Maintenance>>> {
    let list = state.services.maintenances.list(&query).await?;
    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/maintenances/{id}",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance ID")),
    responses(
        (status = 200, description = "Maintenance report", body = Maintenance),
        (status = 404, description = "Maintenance not found")
    )
)]
pub async fn get_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Maintenance>> {
    let m = state.services.maintenances.get_by_id(id).await?;
    Ok(Json(m))
}

/// Submit a report; a linked schedule must belong to the caller and be due today
#[utoipa::path(
    post,
    path = "/maintenances",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    request_body = CreateMaintenance,
    responses(
        (status = 201, description = "Report submitted", body = Maintenance),
        (status = 400, description = "Invalid input, store mismatch or duplicate serial numbers"),
        (status = 403, description = "Schedule closed, assigned to another technician or not due today"),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn create_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateMaintenance>,
) -> AppResult<(StatusCode, Json<Maintenance>)> {
    data.validate()?;

    let m = state
        .services
        .maintenances
        .create(&data, &claims.username)
        .await?;
    Ok((StatusCode::CREATED, Json(m)))
}

/// Revise the content of a report
#[utoipa::path(
    put,
    path = "/maintenances/{id}",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance ID")),
    request_body = UpdateMaintenance,
    responses(
        (status = 200, description = "Report updated", body = Maintenance),
        (status = 400, description = "Invalid details or duplicate serial numbers"),
        (status = 404, description = "Maintenance not found")
    )
)]
pub async fn update_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateMaintenance>,
) -> AppResult<Json<Maintenance>> {
    data.validate()?;

    let m = state.services.maintenances.update_content(id, &data).await?;
    Ok(Json(m))
}

/// Position of the report among its store's reports of the same year
#[utoipa::path(
    get,
    path = "/maintenances/{id}/sequence",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance ID")),
    responses(
        (status = 200, description = "Yearly sequence", body = SequenceResponse),
        (status = 404, description = "Maintenance not found")
    )
)]
pub async fn maintenance_sequence(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<SequenceResponse>> {
    let service = &state.services.maintenances;
    let m = service.get_by_id(id).await?;
    let sequence = service.yearly_sequence(&m).await?;
    let store_name = service.store_name_for(&m).await?;

    Ok(Json(SequenceResponse {
        id: m.id,
        sequence,
        store_name,
    }))
}

/// Approve a report
#[utoipa::path(
    put,
    path = "/maintenances/{id}/approve",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance ID")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Report approved", body = Maintenance),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Maintenance not found")
    )
)]
pub async fn approve_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<StatusChange>>,
) -> AppResult<Json<Maintenance>> {
    change_status(state, claims, id, MaintenanceStatus::Approved, body).await
}

/// Reject a report
#[utoipa::path(
    put,
    path = "/maintenances/{id}/reject",
    tag = "maintenances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance ID")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Report rejected", body = Maintenance),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Maintenance not found")
    )
)]
pub async fn reject_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<StatusChange>>,
) -> AppResult<Json<Maintenance>> {
    change_status(state, claims, id, MaintenanceStatus::Rejected, body).await
}

async fn change_status(
    state: crate::AppState,
    claims: crate::models::user::UserClaims,
    id: i32,
    status: MaintenanceStatus,
    body: Option<Json<StatusChange>>,
) -> AppResult<Json<Maintenance>> {
    claims.require_admin()?;

    let approved_by = body
        .and_then(|Json(change)| change.approved_by)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| claims.username.clone());

    let m = state
        .services
        .maintenances
        .update_status(id, status, Some(&approved_by))
        .await?;
    Ok(Json(m))
}
