//! Business logic services

pub mod assets;
pub mod maintenances;
pub mod redis;
pub mod reminder;
pub mod schedules;
pub mod stores;
pub mod telegram;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

use maintenances::{DisabledScheduleMatcher, ScheduleMatcher, TieredScheduleMatcher};
use reminder::ReminderDispatcher;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub stores: stores::StoresService,
    pub schedules: schedules::SchedulesService,
    pub assets: assets::AssetsService,
    pub maintenances: maintenances::MaintenancesService,
    pub reminder: reminder::ReminderService,
    pub redis: redis::RedisService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, redis_service: redis::RedisService) -> Self {
        let assets = assets::AssetsService::new(repository.clone(), config.assets.clone());

        let matcher: Arc<dyn ScheduleMatcher> = if config.maintenance.schedule_fallback {
            Arc::new(TieredScheduleMatcher::new(repository.clone()))
        } else {
            Arc::new(DisabledScheduleMatcher)
        };
        let maintenances =
            maintenances::MaintenancesService::new(repository.clone(), assets.clone(), matcher);

        let dispatcher = if config.telegram.is_enabled() {
            Some(ReminderDispatcher::new(
                Arc::new(telegram::TelegramNotifier::new(&config.telegram)),
                Arc::new(redis_service.clone()),
                &config.telegram,
                config.reminder.clone(),
            ))
        } else {
            None
        };
        let reminder = reminder::ReminderService::new(
            repository.clone(),
            maintenances.clone(),
            dispatcher,
            config.reminder.clone(),
            &config.telegram,
        );

        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            stores: stores::StoresService::new(repository.clone()),
            schedules: schedules::SchedulesService::new(repository),
            assets,
            maintenances,
            reminder,
            redis: redis_service,
        }
    }
}
