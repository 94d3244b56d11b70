use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{profile, profile_location};
use crate::errors::ServiceError;
use crate::models::{Profile, ProfileLocation};
use crate::repositories::ProfileRepository;

/// Read-only view over profiles; profile CRUD is owned elsewhere.
#[derive(Debug, Clone)]
pub struct SeaOrmProfileRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmProfileRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepository for SeaOrmProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ServiceError> {
        let model = profile::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        let model = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<ProfileLocation>, ServiceError> {
        let model = profile_location::Entity::find_by_id(id)
            .one(&*self.db)
            .await?;
        Ok(model.map(Into::into))
    }
}
