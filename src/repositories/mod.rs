use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    ClaimToken, DeliverySettings, NewClaimToken, NewOrder, NewTransaction, Order, OrderChanges,
    OrderStatus, Profile, ProfileLocation, Transaction,
};

pub mod memory;
pub mod order_repository;
pub mod profile_repository;
pub mod settings_repository;
pub mod token_repository;
pub mod transaction_repository;

pub use memory::InMemoryStore;
pub use order_repository::SeaOrmOrderRepository;
pub use profile_repository::SeaOrmProfileRepository;
pub use settings_repository::SeaOrmSettingsRepository;
pub use token_repository::SeaOrmClaimTokenRepository;
pub use transaction_repository::SeaOrmTransactionRepository;

/// Orders and their item rows.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order and all of its items atomically.
    async fn create(&self, order: NewOrder) -> Result<Order, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError>;

    /// Sets the order's user only when it is unset or already equal to `user_id`.
    /// Returns `false` when another user owns the order (or it does not exist).
    async fn assign_user(&self, id: Uuid, user_id: &str) -> Result<bool, ServiceError>;

    async fn assign_profile(&self, id: Uuid, profile_id: Uuid) -> Result<(), ServiceError>;

    /// Single conditional write: applies `new` only while the stored status
    /// equals `expected`. Returns whether the row changed.
    async fn update_status_if_current(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<bool, ServiceError>;

    /// Unconditional partial update. `None` when the order does not exist.
    async fn update(&self, id: Uuid, changes: OrderChanges) -> Result<Option<Order>, ServiceError>;
}

#[async_trait]
pub trait ClaimTokenRepository: Send + Sync {
    async fn create(&self, token: NewClaimToken) -> Result<ClaimToken, ServiceError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, ServiceError>;

    /// Most recent token issued for an order.
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ClaimToken>, ServiceError>;

    /// Records the claim only if the token is still unclaimed.
    async fn mark_claimed(
        &self,
        id: Uuid,
        user_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ServiceError>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, ServiceError>;

    async fn find_location(&self, id: Uuid) -> Result<Option<ProfileLocation>, ServiceError>;
}

/// Append-only payment ledger.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: NewTransaction) -> Result<Transaction, ServiceError>;

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, ServiceError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// The stored settings row, if an operator has saved one.
    async fn get(&self) -> Result<Option<DeliverySettings>, ServiceError>;

    /// Stored settings or the built-in defaults.
    async fn effective(&self) -> Result<DeliverySettings, ServiceError> {
        Ok(self.get().await?.unwrap_or_default())
    }
}

/// Bundle of repository handles shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub tokens: Arc<dyn ClaimTokenRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repositories {
    pub fn sea_orm(db: Arc<DatabaseConnection>) -> Self {
        Self {
            orders: Arc::new(SeaOrmOrderRepository::new(db.clone())),
            tokens: Arc::new(SeaOrmClaimTokenRepository::new(db.clone())),
            profiles: Arc::new(SeaOrmProfileRepository::new(db.clone())),
            transactions: Arc::new(SeaOrmTransactionRepository::new(db.clone())),
            settings: Arc::new(SeaOrmSettingsRepository::new(db)),
        }
    }

    /// All repositories backed by one shared in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            orders: store.clone(),
            tokens: store.clone(),
            profiles: store.clone(),
            transactions: store.clone(),
            settings: store,
        }
    }
}
