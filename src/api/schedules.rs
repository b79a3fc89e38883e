//! Schedule endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::schedule::{
        CreateSchedule, RescheduleRequest, Schedule, ScheduleQuery, ScheduleStatus, UpdateSchedule,
    },
};

use super::AuthenticatedUser;

/// List schedules, ordered by day
#[utoipa::path(
    get,
    path = "/schedules",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedules", body = Vec<Schedule>),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_schedules(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<Vec<Schedule>>> {
    let schedules = state.services.schedules.list(&query).await?;
    Ok(Json(schedules))
}

/// Active schedules in the next thirty days
#[utoipa::path(
    get,
    path = "/schedules/upcoming",
    tag = "schedules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Upcoming schedules", body = Vec<Schedule>)
    )
)]
pub async fn upcoming_schedules(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Schedule>>> {
    let schedules = state.services.schedules.upcoming().await?;
    Ok(Json(schedules))
}

/// Active schedules whose day has passed
#[utoipa::path(
    get,
    path = "/schedules/overdue",
    tag = "schedules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue schedules", body = Vec<Schedule>)
    )
)]
pub async fn overdue_schedules(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Schedule>>> {
    let schedules = state.services.schedules.overdue().await?;
    Ok(Json(schedules))
}

/// Schedules waiting for an administrator decision
#[utoipa::path(
    get,
    path = "/schedules/pending",
    tag = "schedules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending schedules", body = Vec<Schedule>)
    )
)]
pub async fn pending_schedules(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Schedule>>> {
    let schedules = state
        .services
        .schedules
        .list_by_status(ScheduleStatus::Pending)
        .await?;
    Ok(Json(schedules))
}

#[utoipa::path(
    get,
    path = "/schedules/{id}",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule", body = Schedule),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn get_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Schedule>> {
    let schedule = state.services.schedules.get_by_id(id).await?;
    Ok(Json(schedule))
}

/// Plan a visit
#[utoipa::path(
    post,
    path = "/schedules",
    tag = "schedules",
    security(("bearer_auth" = [])),
    request_body = CreateSchedule,
    responses(
        (status = 201, description = "Schedule created", body = Schedule),
        (status = 400, description = "Missing store or invalid date"),
        (status = 409, description = "Technician or store already booked that day")
    )
)]
pub async fn create_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateSchedule>,
) -> AppResult<(StatusCode, Json<Schedule>)> {
    claims.require_admin()?;
    data.validate()?;

    let schedule = state.services.schedules.create(&data).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Partial update; closing sets the completion time, reopening clears it
#[utoipa::path(
    put,
    path = "/schedules/{id}",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    request_body = UpdateSchedule,
    responses(
        (status = 200, description = "Schedule updated", body = Schedule),
        (status = 404, description = "Schedule not found"),
        (status = 409, description = "Technician or store already booked that day")
    )
)]
pub async fn update_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateSchedule>,
) -> AppResult<Json<Schedule>> {
    claims.require_admin()?;
    data.validate()?;

    let schedule = state.services.schedules.update(id, &data).await?;
    Ok(Json(schedule))
}

/// Move a visit to another day and reopen it
#[utoipa::path(
    put,
    path = "/schedules/{id}/reschedule",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Schedule moved", body = Schedule),
        (status = 404, description = "Schedule not found"),
        (status = 409, description = "Technician or store already booked that day")
    )
)]
pub async fn reschedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<RescheduleRequest>,
) -> AppResult<Json<Schedule>> {
    claims.require_admin()?;
    let schedule = state.services.schedules.reschedule(id, &data.start).await?;
    Ok(Json(schedule))
}

/// Approve a planned visit
#[utoipa::path(
    put,
    path = "/schedules/{id}/approve",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule approved", body = Schedule),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn approve_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Schedule>> {
    claims.require_admin()?;
    let schedule = state
        .services
        .schedules
        .set_status(id, ScheduleStatus::Approved)
        .await?;
    Ok(Json(schedule))
}

/// Reject a planned visit
#[utoipa::path(
    put,
    path = "/schedules/{id}/reject",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule rejected", body = Schedule),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn reject_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Schedule>> {
    claims.require_admin()?;
    let schedule = state
        .services
        .schedules
        .set_status(id, ScheduleStatus::Rejected)
        .await?;
    Ok(Json(schedule))
}

#[utoipa::path(
    delete,
    path = "/schedules/{id}",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 204, description = "Schedule deleted"),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn delete_schedule(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.schedules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
