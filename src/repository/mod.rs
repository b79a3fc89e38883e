//! Repository layer for database operations

pub mod assets;
pub mod maintenances;
pub mod schedules;
pub mod stores;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub stores: stores::StoresRepository,
    pub schedules: schedules::SchedulesRepository,
    pub maintenances: maintenances::MaintenancesRepository,
    pub assets: assets::AssetsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            stores: stores::StoresRepository::new(pool.clone()),
            schedules: schedules::SchedulesRepository::new(pool.clone()),
            maintenances: maintenances::MaintenancesRepository::new(pool.clone()),
            assets: assets::AssetsRepository::new(pool.clone()),
            pool,
        }
    }
}
