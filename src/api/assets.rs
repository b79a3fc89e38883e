//! Asset ledger endpoints

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::asset::{
        Asset, AssetCountQuery, AssetHistory, AssetListEntry, AssetQuery, CreateAsset,
        CreateAssetHistory, UpdateAsset, UpdateAssetHistory,
    },
};

use super::AuthenticatedUser;

/// List assets with derived age; technicians only see their stores
#[utoipa::path(
    get,
    path = "/assets",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(AssetQuery),
    responses(
        (status = 200, description = "Assets", body = Vec<AssetListEntry>)
    )
)]
pub async fn list_assets(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AssetQuery>,
) -> AppResult<Json<Vec<AssetListEntry>>> {
    let assets = state.services.assets.list(&query, &claims).await?;
    Ok(Json(assets))
}

/// Asset count per store, keyed by store id
#[utoipa::path(
    get,
    path = "/assets/counts",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(AssetCountQuery),
    responses(
        (status = 200, description = "Counts keyed by store id", body = BTreeMap<String, i64>)
    )
)]
pub async fn asset_counts(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AssetCountQuery>,
) -> AppResult<Json<BTreeMap<i32, i64>>> {
    let counts = state.services.assets.count_by_store(&query, &claims).await?;
    Ok(Json(counts))
}

#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn get_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Asset>> {
    let asset = state.services.assets.get_by_id(id).await?;
    Ok(Json(asset))
}

#[utoipa::path(
    post,
    path = "/assets",
    tag = "assets",
    security(("bearer_auth" = [])),
    request_body = CreateAsset,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 409, description = "Asset code already exists")
    )
)]
pub async fn create_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateAsset>,
) -> AppResult<(StatusCode, Json<Asset>)> {
    claims.require_admin()?;
    data.validate()?;

    let asset = state.services.assets.create(&data).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

#[utoipa::path(
    put,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    request_body = UpdateAsset,
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn update_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateAsset>,
) -> AppResult<Json<Asset>> {
    claims.require_admin()?;
    data.validate()?;

    let asset = state.services.assets.update(id, &data).await?;
    Ok(Json(asset))
}

#[utoipa::path(
    delete,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset and its history deleted"),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn delete_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.assets.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Repair history, newest first
#[utoipa::path(
    get,
    path = "/assets/{id}/history",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "History entries", body = Vec<AssetHistory>),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn list_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<AssetHistory>>> {
    let history = state.services.assets.list_history(id).await?;
    Ok(Json(history))
}

#[utoipa::path(
    post,
    path = "/assets/{id}/history",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    request_body = CreateAssetHistory,
    responses(
        (status = 201, description = "History entry added", body = AssetHistory),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn add_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateAssetHistory>,
) -> AppResult<(StatusCode, Json<AssetHistory>)> {
    data.validate()?;

    let entry = state
        .services
        .assets
        .add_history(id, &data, &claims.username)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    put,
    path = "/assets/{id}/history/{hid}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Asset ID"),
        ("hid" = i32, Path, description = "History entry ID")
    ),
    request_body = UpdateAssetHistory,
    responses(
        (status = 200, description = "History entry updated", body = AssetHistory),
        (status = 404, description = "History entry not found")
    )
)]
pub async fn update_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((id, hid)): Path<(i32, i32)>,
    Json(data): Json<UpdateAssetHistory>,
) -> AppResult<Json<AssetHistory>> {
    data.validate()?;

    let entry = state.services.assets.update_history(id, hid, &data).await?;
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/assets/{id}/history/{hid}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Asset ID"),
        ("hid" = i32, Path, description = "History entry ID")
    ),
    responses(
        (status = 204, description = "History entry deleted"),
        (status = 404, description = "History entry not found")
    )
)]
pub async fn delete_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((id, hid)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    state.services.assets.delete_history(id, hid).await?;
    Ok(StatusCode::NO_CONTENT)
}
