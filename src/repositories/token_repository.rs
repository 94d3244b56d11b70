use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order_token;
use crate::errors::ServiceError;
use crate::models::{ClaimToken, NewClaimToken};
use crate::repositories::ClaimTokenRepository;

#[derive(Debug, Clone)]
pub struct SeaOrmClaimTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmClaimTokenRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClaimTokenRepository for SeaOrmClaimTokenRepository {
    async fn create(&self, token: NewClaimToken) -> Result<ClaimToken, ServiceError> {
        let model = order_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(token.order_id),
            token: Set(token.token),
            phone_number: Set(token.phone_number),
            claimed_at: Set(None),
            claimed_by_user_id: Set(None),
            expires_at: Set(token.expires_at),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(model.into())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, ServiceError> {
        let model = order_token::Entity::find()
            .filter(order_token::Column::Token.eq(token))
            .one(&*self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ClaimToken>, ServiceError> {
        let model = order_token::Entity::find()
            .filter(order_token::Column::OrderId.eq(order_id))
            .order_by_desc(order_token::Column::CreatedAt)
            .one(&*self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn mark_claimed(
        &self,
        id: Uuid,
        user_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = order_token::Entity::update_many()
            .col_expr(order_token::Column::ClaimedAt, Expr::value(claimed_at))
            .col_expr(
                order_token::Column::ClaimedByUserId,
                Expr::value(user_id.to_owned()),
            )
            .filter(order_token::Column::Id.eq(id))
            .filter(order_token::Column::ClaimedAt.is_null())
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
