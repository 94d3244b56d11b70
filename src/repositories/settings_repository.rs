use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::entities::settings;
use crate::errors::ServiceError;
use crate::models::DeliverySettings;
use crate::repositories::SettingsRepository;

#[derive(Debug, Clone)]
pub struct SeaOrmSettingsRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSettingsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsRepository for SeaOrmSettingsRepository {
    async fn get(&self) -> Result<Option<DeliverySettings>, ServiceError> {
        let model = settings::Entity::find_by_id(settings::SINGLETON_ID)
            .one(&*self.db)
            .await?;
        Ok(model.map(Into::into))
    }
}
