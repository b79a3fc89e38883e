//! Maintrack Server - store maintenance tracking
//!
//! REST API server plus the periodic reminder sweep.

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maintrack_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{redis::RedisService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config.logging);

    tracing::info!("Starting Maintrack Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    // Reminder dedup degrades to "always send" when Redis is down, so startup does not require it
    let redis_service = RedisService::new(&config.redis.url).await?;

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config, redis_service);

    services.users.ensure_admin().await?;

    if config.telegram.is_enabled() {
        tracing::info!("Telegram notifications enabled");
    } else {
        tracing::warn!("Telegram not configured, reminders will not be sent");
    }
    services.reminder.clone().spawn();

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state)?;

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("maintrack_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Per-IP limit shared by login and the reminder hooks
    let governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(state.config.reminder.rate_limit_per_second.max(1))
            .burst_size(state.config.reminder.rate_limit_burst.max(1))
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    let limited = Router::new()
        .route("/auth/login", post(api::auth::login))
        .route("/reminder/tick", get(api::reminder::tick))
        .route("/reminder/test", get(api::reminder::test_message))
        .layer(GovernorLayer { config: governor });

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/me", get(api::auth::me))
        // Users
        .route("/users", get(api::users::list_users).post(api::users::create_user))
        // Stores
        .route("/stores", get(api::stores::list_stores).post(api::stores::create_store))
        .route("/stores/mine", get(api::stores::my_stores))
        .route(
            "/stores/:id",
            get(api::stores::get_store)
                .put(api::stores::update_store)
                .delete(api::stores::delete_store),
        )
        // Schedules
        .route(
            "/schedules",
            get(api::schedules::list_schedules).post(api::schedules::create_schedule),
        )
        .route("/schedules/upcoming", get(api::schedules::upcoming_schedules))
        .route("/schedules/overdue", get(api::schedules::overdue_schedules))
        .route("/schedules/pending", get(api::schedules::pending_schedules))
        .route(
            "/schedules/:id",
            get(api::schedules::get_schedule)
                .put(api::schedules::update_schedule)
                .delete(api::schedules::delete_schedule),
        )
        .route("/schedules/:id/reschedule", put(api::schedules::reschedule))
        .route("/schedules/:id/approve", put(api::schedules::approve_schedule))
        .route("/schedules/:id/reject", put(api::schedules::reject_schedule))
        // Maintenances
        .route(
            "/maintenances",
            get(api::maintenances::list_maintenances).post(api::maintenances::create_maintenance),
        )
        .route(
            "/maintenances/:id",
            get(api::maintenances::get_maintenance).put(api::maintenances::update_maintenance),
        )
        .route("/maintenances/:id/sequence", get(api::maintenances::maintenance_sequence))
        .route("/maintenances/:id/approve", put(api::maintenances::approve_maintenance))
        .route("/maintenances/:id/reject", put(api::maintenances::reject_maintenance))
        // Assets
        .route("/assets", get(api::assets::list_assets).post(api::assets::create_asset))
        .route("/assets/counts", get(api::assets::asset_counts))
        .route(
            "/assets/:id",
            get(api::assets::get_asset)
                .put(api::assets::update_asset)
                .delete(api::assets::delete_asset),
        )
        .route(
            "/assets/:id/history",
            get(api::assets::list_history).post(api::assets::add_history),
        )
        .route(
            "/assets/:id/history/:hid",
            put(api::assets::update_history).delete(api::assets::delete_history),
        )
        .merge(limited)
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Ok(Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
