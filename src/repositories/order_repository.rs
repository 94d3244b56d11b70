use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::models::{NewOrder, Order, OrderChanges, OrderStatus};
use crate::repositories::OrderRepository;

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct SeaOrmOrderRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn load(&self, model: order::Model) -> Result<Order, ServiceError> {
        let items = model
            .find_related(order_item::Entity)
            .order_by_asc(order_item::Column::Position)
            .all(&*self.db)
            .await?;
        model.into_domain(items)
    }
}

fn to_db_int(value: u32, field: &str) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::ValidationError(format!("{} is out of range", field)))
}

#[async_trait]
impl OrderRepository for SeaOrmOrderRepository {
    async fn create(&self, new_order: NewOrder) -> Result<Order, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            profile_id: Set(new_order.profile_id),
            user_id: Set(new_order.user_id),
            status: Set(OrderStatus::Created.to_string()),
            status_message: Set(None),
            eta: Set(new_order.eta),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for (position, item) in new_order.items.into_iter().enumerate() {
            let weight_grams = item
                .weight_grams
                .map(|grams| to_db_int(grams, "weight_grams"))
                .transpose()?;
            let row = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                position: Set(position as i32),
                name: Set(item.name),
                unit_price: Set(item.unit_price),
                quantity: Set(to_db_int(item.quantity, "quantity")?),
                weight_grams: Set(weight_grams),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(row);
        }

        txn.commit().await?;
        debug!(order_id = %order_id, items = items.len(), "order persisted");

        order_model.into_domain(items)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        match order::Entity::find_by_id(id).one(&*self.db).await? {
            Some(model) => self.load(model).await.map(Some),
            None => Ok(None),
        }
    }

    async fn assign_user(&self, id: Uuid, user_id: &str) -> Result<bool, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::UserId, Expr::value(user_id.to_owned()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(order::Column::UserId.is_null())
                    .add(order::Column::UserId.eq(user_id)),
            )
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn assign_profile(&self, id: Uuid, profile_id: Uuid) -> Result<(), ServiceError> {
        order::Entity::update_many()
            .col_expr(order::Column::ProfileId, Expr::value(profile_id))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn update_status_if_current(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<bool, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(new.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::Status.eq(expected.as_ref()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn update(&self, id: Uuid, changes: OrderChanges) -> Result<Option<Order>, ServiceError> {
        let Some(model) = order::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return self.load(model).await.map(Some);
        }

        let mut active: order::ActiveModel = model.into();
        if let Some(status) = changes.status {
            active.status = Set(status.to_string());
        }
        if let Some(eta) = changes.eta {
            active.eta = Set(eta);
        }
        if let Some(message) = changes.status_message {
            active.status_message = Set(Some(message));
        }

        let updated = active.update(&*self.db).await?;
        self.load(updated).await.map(Some)
    }
}
