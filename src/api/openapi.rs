//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{assets, auth, health, maintenances, reminder, schedules, stores, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Maintrack API",
        version = "1.0.0",
        description = "Store maintenance tracking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Users
        users::list_users,
        users::create_user,
        // Stores
        stores::list_stores,
        stores::my_stores,
        stores::get_store,
        stores::create_store,
        stores::update_store,
        stores::delete_store,
        // Schedules
        schedules::list_schedules,
        schedules::upcoming_schedules,
        schedules::overdue_schedules,
        schedules::pending_schedules,
        schedules::get_schedule,
        schedules::create_schedule,
        schedules::update_schedule,
        schedules::reschedule,
        schedules::approve_schedule,
        schedules::reject_schedule,
        schedules::delete_schedule,
        // Maintenances
        maintenances::list_maintenances,
        maintenances::get_maintenance,
        maintenances::create_maintenance,
        maintenances::update_maintenance,
        maintenances::maintenance_sequence,
        maintenances::approve_maintenance,
        maintenances::reject_maintenance,
        // Assets
        assets::list_assets,
        assets::asset_counts,
        assets::get_asset,
        assets::create_asset,
        assets::update_asset,
        assets::delete_asset,
        assets::list_history,
        assets::add_history,
        assets::update_history,
        assets::delete_history,
        // Reminder hooks
        reminder::tick,
        reminder::test_message,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Users
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::CreateUser,
            // Stores
            crate::models::store::Store,
            crate::models::store::CreateStore,
            crate::models::store::UpdateStore,
            // Schedules
            crate::models::schedule::Schedule,
            crate::models::schedule::CreateSchedule,
            crate::models::schedule::UpdateSchedule,
            crate::models::schedule::RescheduleRequest,
            // Maintenances
            crate::models::maintenance::Maintenance,
            crate::models::maintenance::CreateMaintenance,
            crate::models::maintenance::UpdateMaintenance,
            crate::models::maintenance::StatusChange,
            crate::models::maintenance::SequenceResponse,
            // Assets
            crate::models::asset::Asset,
            crate::models::asset::AssetListEntry,
            crate::models::asset::AssetHistory,
            crate::models::asset::CreateAsset,
            crate::models::asset::UpdateAsset,
            crate::models::asset::CreateAssetHistory,
            crate::models::asset::UpdateAssetHistory,
            // Reminder
            crate::services::reminder::TickReport,
            crate::services::reminder::ReminderAttempt,
            crate::services::reminder::AutoApproveReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "stores", description = "Store directory"),
        (name = "schedules", description = "Planned maintenance visits"),
        (name = "maintenances", description = "Maintenance reports and approval"),
        (name = "assets", description = "Asset ledger and repair history"),
        (name = "reminder", description = "Reminder sweep hooks")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
