use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub eta: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::order_token::Entity")]
    OrderToken,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::order_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderToken.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

impl Model {
    /// Joins the order row with its item rows (already sorted by position).
    pub fn into_domain(self, items: Vec<super::order_item::Model>) -> Result<Order, ServiceError> {
        let status = self.status.parse::<OrderStatus>().map_err(|_| {
            ServiceError::InternalError(format!(
                "order {} has unknown status {}",
                self.id, self.status
            ))
        })?;

        Ok(Order {
            id: self.id,
            profile_id: self.profile_id,
            user_id: self.user_id,
            status,
            status_message: self.status_message,
            eta: self.eta,
            items: items.into_iter().map(Into::into).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
