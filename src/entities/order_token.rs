use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ClaimToken;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    #[sea_orm(unique)]
    pub token: String,
    pub phone_number: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ClaimToken {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            token: model.token,
            phone_number: model.phone_number,
            claimed_at: model.claimed_at,
            claimed_by_user_id: model.claimed_by_user_id,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}
