use crate::config::settings::AppConfig;
use crate::infrastructure::db::DbPool;
use crate::infrastructure::queue::RabbitMqService;
use crate::infrastructure::storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub queue: RabbitMqService,
    pub storage: StorageService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        queue: RabbitMqService,
        storage: StorageService,
    ) -> Self {
        Self {
            config,
            db,
            queue,
            storage,
        }
    }
}
