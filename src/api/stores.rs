//! Store directory endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::store::{CreateStore, Store, UpdateStore},
};

use super::AuthenticatedUser;

/// List all stores
#[utoipa::path(
    get,
    path = "/stores",
    tag = "stores",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stores ordered by name", body = Vec<Store>)
    )
)]
pub async fn list_stores(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Store>>> {
    let stores = state.services.stores.list().await?;
    Ok(Json(stores))
}

/// Stores assigned to the caller
#[utoipa::path(
    get,
    path = "/stores/mine",
    tag = "stores",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stores assigned to the current technician", body = Vec<Store>)
    )
)]
pub async fn my_stores(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Store>>> {
    let stores = state.services.stores.list_assigned_to(&claims.username).await?;
    Ok(Json(stores))
}

#[utoipa::path(
    get,
    path = "/stores/{id}",
    tag = "stores",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Store", body = Store),
        (status = 404, description = "Store not found")
    )
)]
pub async fn get_store(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Store>> {
    let store = state.services.stores.get_by_id(id).await?;
    Ok(Json(store))
}

/// Register a store
#[utoipa::path(
    post,
    path = "/stores",
    tag = "stores",
    security(("bearer_auth" = [])),
    request_body = CreateStore,
    responses(
        (status = 201, description = "Store created", body = Store),
        (status = 409, description = "Store code already exists")
    )
)]
pub async fn create_store(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateStore>,
) -> AppResult<(StatusCode, Json<Store>)> {
    claims.require_staff()?;
    data.validate()?;

    let store = state.services.stores.create(&data).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

#[utoipa::path(
    put,
    path = "/stores/{id}",
    tag = "stores",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Store ID")),
    request_body = UpdateStore,
    responses(
        (status = 200, description = "Store updated", body = Store),
        (status = 404, description = "Store not found")
    )
)]
pub async fn update_store(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateStore>,
) -> AppResult<Json<Store>> {
    claims.require_admin()?;
    data.validate()?;

    let store = state.services.stores.update(id, &data).await?;
    Ok(Json(store))
}

#[utoipa::path(
    delete,
    path = "/stores/{id}",
    tag = "stores",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Store ID")),
    responses(
        (status = 204, description = "Store deleted"),
        (status = 404, description = "Store not found")
    )
)]
pub async fn delete_store(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.stores.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
