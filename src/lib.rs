//! Maintrack - Store Maintenance Tracking
//!
//! REST JSON server for planning technician visits to stores, collecting
//! maintenance reports, keeping an asset ledger in sync with them, and
//! reminding technicians of their upcoming visits.

use std::sync::Arc;

pub mod api;
pub mod calendar;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
