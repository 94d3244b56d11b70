use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::transaction;
use crate::errors::ServiceError;
use crate::models::{round_money, NewTransaction, Transaction};
use crate::repositories::TransactionRepository;

#[derive(Debug, Clone)]
pub struct SeaOrmTransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn insert(&self, new: NewTransaction) -> Result<Transaction, ServiceError> {
        let model = transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(new.order_id),
            user_id: Set(new.user_id),
            profile_id: Set(new.profile_id),
            amount: Set(round_money(new.amount)),
            currency: Set(new.currency),
            status: Set(new.status),
            payment_id: Set(new.payment_id),
            gateway_payment_id: Set(new.gateway_payment_id),
            collector_id: Set(new.collector_id),
            description: Set(new.description),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(model.into())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, ServiceError> {
        let models = transaction::Entity::find()
            .filter(transaction::Column::OrderId.eq(order_id))
            .order_by_asc(transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}
