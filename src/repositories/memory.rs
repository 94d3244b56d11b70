use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::entities::settings::SINGLETON_ID;
use crate::errors::ServiceError;
use crate::models::{
    round_money, ClaimToken, DeliverySettings, NewClaimToken, NewOrder, NewTransaction, Order,
    OrderChanges, OrderStatus, Profile, ProfileLocation, Transaction,
};
use crate::repositories::{
    ClaimTokenRepository, OrderRepository, ProfileRepository, SettingsRepository,
    TransactionRepository,
};

/// Process-local storage implementing every repository trait.
///
/// Conditional writes run under the map's shard lock (`get_mut`), which gives
/// the same compare-and-set guarantee as the SQL `UPDATE ... WHERE` variants.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    tokens: DashMap<Uuid, ClaimToken>,
    profiles: DashMap<Uuid, Profile>,
    locations: DashMap<Uuid, ProfileLocation>,
    transactions: DashMap<Uuid, Transaction>,
    settings: DashMap<i32, DeliverySettings>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id, profile);
    }

    pub fn insert_location(&self, location: ProfileLocation) {
        self.locations.insert(location.id, location);
    }

    pub fn put_settings(&self, settings: DeliverySettings) {
        self.settings.insert(SINGLETON_ID, settings);
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create(&self, new_order: NewOrder) -> Result<Order, ServiceError> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            profile_id: new_order.profile_id,
            user_id: new_order.user_id,
            status: OrderStatus::Created,
            status_message: None,
            eta: new_order.eta,
            items: new_order.items,
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn assign_user(&self, id: Uuid, user_id: &str) -> Result<bool, ServiceError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        match order.user_id.as_deref() {
            Some(existing) if existing != user_id => Ok(false),
            _ => {
                order.user_id = Some(user_id.to_owned());
                order.updated_at = Utc::now();
                Ok(true)
            }
        }
    }

    async fn assign_profile(&self, id: Uuid, profile_id: Uuid) -> Result<(), ServiceError> {
        if let Some(mut order) = self.orders.get_mut(&id) {
            order.profile_id = Some(profile_id);
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_status_if_current(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<bool, ServiceError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != expected {
            return Ok(false);
        }
        order.status = new;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn update(&self, id: Uuid, changes: OrderChanges) -> Result<Option<Order>, ServiceError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(order.clone()));
        }
        if let Some(status) = changes.status {
            order.status = status;
        }
        if let Some(eta) = changes.eta {
            order.eta = eta;
        }
        if let Some(message) = changes.status_message {
            order.status_message = Some(message);
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl ClaimTokenRepository for InMemoryStore {
    async fn create(&self, new_token: NewClaimToken) -> Result<ClaimToken, ServiceError> {
        let token = ClaimToken {
            id: Uuid::new_v4(),
            order_id: new_token.order_id,
            token: new_token.token,
            phone_number: new_token.phone_number,
            claimed_at: None,
            claimed_by_user_id: None,
            expires_at: new_token.expires_at,
            created_at: Utc::now(),
        };
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, ServiceError> {
        Ok(self
            .tokens
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ClaimToken>, ServiceError> {
        Ok(self
            .tokens
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .max_by_key(|entry| entry.created_at)
            .map(|entry| entry.value().clone()))
    }

    async fn mark_claimed(
        &self,
        id: Uuid,
        user_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let Some(mut token) = self.tokens.get_mut(&id) else {
            return Ok(false);
        };
        if token.claimed_at.is_some() {
            return Ok(false);
        }
        token.claimed_at = Some(claimed_at);
        token.claimed_by_user_id = Some(user_id.to_owned());
        Ok(true)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ServiceError> {
        Ok(self.profiles.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        Ok(self
            .profiles
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<ProfileLocation>, ServiceError> {
        Ok(self.locations.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert(&self, new: NewTransaction) -> Result<Transaction, ServiceError> {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            order_id: new.order_id,
            user_id: new.user_id,
            profile_id: new.profile_id,
            amount: round_money(new.amount),
            currency: new.currency,
            status: new.status,
            payment_id: new.payment_id,
            gateway_payment_id: new.gateway_payment_id,
            collector_id: new.collector_id,
            description: new.description,
            created_at: Utc::now(),
        };
        self.transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Transaction>, ServiceError> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn get(&self) -> Result<Option<DeliverySettings>, ServiceError> {
        Ok(self
            .settings
            .get(&SINGLETON_ID)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn status_update_applies_only_from_expected_state() {
        let store = InMemoryStore::new();
        let order = OrderRepository::create(&store, NewOrder::default())
            .await
            .unwrap();

        let first = store
            .update_status_if_current(order.id, OrderStatus::Created, OrderStatus::Confirmed)
            .await
            .unwrap();
        let second = store
            .update_status_if_current(order.id, OrderStatus::Created, OrderStatus::Confirmed)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn assign_user_refuses_a_different_owner() {
        let store = InMemoryStore::new();
        let order = OrderRepository::create(&store, NewOrder::default())
            .await
            .unwrap();

        assert!(store.assign_user(order.id, "alice").await.unwrap());
        assert!(store.assign_user(order.id, "alice").await.unwrap());
        assert!(!store.assign_user(order.id, "bob").await.unwrap());

        let stored = OrderRepository::find_by_id(&store, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn tokens_are_claimed_once() {
        let store = InMemoryStore::new();
        let token = ClaimTokenRepository::create(
            &store,
            NewClaimToken {
                order_id: Uuid::new_v4(),
                token: "secret".into(),
                phone_number: None,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        assert!(store.mark_claimed(token.id, "alice", Utc::now()).await.unwrap());
        assert!(!store.mark_claimed(token.id, "bob", Utc::now()).await.unwrap());

        let stored = store.find_by_token("secret").await.unwrap().unwrap();
        assert!(stored.is_claimed_by("alice"));
    }
}
