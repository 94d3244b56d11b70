use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{ClaimToken, Order, OrderStatus},
    notifications::{NotificationDispatcher, OrderEvent},
    repositories::Repositories,
};

/// Snapshot returned once a claim succeeds (or is repeated by the same user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub order_id: Uuid,
    pub user_id: String,
    pub profile_id: Option<Uuid>,
    pub status: OrderStatus,
    pub eta: String,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimResult {
    fn from_order(order: &Order, user_id: &str, claimed_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id,
            user_id: user_id.to_string(),
            profile_id: order.profile_id,
            status: order.status,
            eta: order.eta.clone(),
            claimed_at,
        }
    }
}

/// Attaches anonymous orders to the user holding their claim token.
#[derive(Clone)]
pub struct ClaimService {
    repos: Repositories,
    dispatcher: NotificationDispatcher,
}

impl ClaimService {
    pub fn new(repos: Repositories, dispatcher: NotificationDispatcher) -> Self {
        Self { repos, dispatcher }
    }

    /// Consumes `token` on behalf of `user_id`.
    ///
    /// Repeating a successful claim with the same user returns the order's
    /// current state; any other user gets `AlreadyClaimed`. An expired token
    /// fails before anything is written.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn claim(&self, token: &str, user_id: &str) -> Result<ClaimResult, ServiceError> {
        let now = Utc::now();
        let claim_token = self
            .repos
            .tokens
            .find_by_token(token)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        if claim_token.is_expired_at(now) {
            info!(order_id = %claim_token.order_id, "claim rejected, token expired");
            return Err(ServiceError::TokenExpired);
        }

        if claim_token.is_claimed() {
            return self.repeat_claim(&claim_token, user_id, now).await;
        }

        let order = self.load_order(claim_token.order_id).await?;
        if order.user_id.as_deref().is_some_and(|owner| owner != user_id) {
            return Err(ServiceError::OrderAlreadyAssigned);
        }

        if !self.repos.orders.assign_user(order.id, user_id).await? {
            // lost the race against another claimant
            return Err(ServiceError::OrderAlreadyAssigned);
        }

        self.attach_profile(order.id, user_id).await;

        let mut claimed_at = now;
        if !self
            .repos
            .tokens
            .mark_claimed(claim_token.id, user_id, claimed_at)
            .await?
        {
            // a concurrent claim marked it first; fine only if it was us
            let current = self
                .repos
                .tokens
                .find_by_token(token)
                .await?
                .ok_or(ServiceError::TokenNotFound)?;
            if !current.is_claimed_by(user_id) {
                return Err(ServiceError::AlreadyClaimed);
            }
            claimed_at = current.claimed_at.unwrap_or(claimed_at);
        }

        let order = self.load_order(order.id).await?;
        let result = ClaimResult::from_order(&order, user_id, claimed_at);

        counter!("delivery_orders.claims.completed", 1);
        info!(order_id = %order.id, "order claimed");

        self.dispatcher.publish(OrderEvent::OrderClaimed {
            order_id: result.order_id,
            user_id: result.user_id.clone(),
            profile_id: result.profile_id,
            status: result.status,
            eta: result.eta.clone(),
            claimed_at: result.claimed_at,
        });

        Ok(result)
    }

    async fn repeat_claim(
        &self,
        claim_token: &ClaimToken,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimResult, ServiceError> {
        if !claim_token.is_claimed_by(user_id) {
            counter!("delivery_orders.claims.conflicts", 1);
            return Err(ServiceError::AlreadyClaimed);
        }

        let order = self.load_order(claim_token.order_id).await?;
        info!(order_id = %order.id, "repeated claim by the same user");
        Ok(ClaimResult::from_order(
            &order,
            user_id,
            claim_token.claimed_at.unwrap_or(now),
        ))
    }

    /// Best effort: a user without a profile can still claim.
    async fn attach_profile(&self, order_id: Uuid, user_id: &str) {
        match self.repos.profiles.find_by_user_id(user_id).await {
            Ok(Some(profile)) => {
                if let Err(e) = self.repos.orders.assign_profile(order_id, profile.id).await {
                    warn!(order_id = %order_id, error = %e, "failed to attach profile to claimed order");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "profile lookup failed during claim");
            }
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.repos
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewClaimToken, NewOrder, Profile};
    use crate::repositories::{ClaimTokenRepository, InMemoryStore};
    use assert_matches::assert_matches;
    use chrono::Duration;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: ClaimService,
        events: tokio::sync::mpsc::Receiver<OrderEvent>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let (dispatcher, events) = NotificationDispatcher::channel(16);
        let service = ClaimService::new(Repositories::in_memory(store.clone()), dispatcher);
        Fixture {
            store,
            service,
            events,
        }
    }

    async fn seed(store: &InMemoryStore, expires_in: Duration) -> (Order, ClaimToken) {
        use crate::repositories::OrderRepository;

        let order = OrderRepository::create(
            store,
            NewOrder {
                eta: "30m".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let token = ClaimTokenRepository::create(
            store,
            NewClaimToken {
                order_id: order.id,
                token: ClaimToken::generate_secret(),
                phone_number: Some("+5491100000000".into()),
                expires_at: Utc::now() + expires_in,
            },
        )
        .await
        .unwrap();
        (order, token)
    }

    #[tokio::test]
    async fn claim_assigns_user_profile_and_publishes() {
        let mut fx = fixture();
        let (order, token) = seed(&fx.store, Duration::hours(1)).await;
        let profile_id = Uuid::new_v4();
        fx.store.insert_profile(Profile {
            id: profile_id,
            user_id: "alice".into(),
            phone_number: "+5491100000000".into(),
            location_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        let result = fx.service.claim(&token.token, "alice").await.unwrap();

        assert_eq!(result.order_id, order.id);
        assert_eq!(result.user_id, "alice");
        assert_eq!(result.profile_id, Some(profile_id));
        assert_eq!(result.status, OrderStatus::Created);

        let event = fx.events.try_recv().unwrap();
        assert_matches!(event, OrderEvent::OrderClaimed { order_id, .. } if order_id == order.id);
    }

    #[tokio::test]
    async fn expired_token_fails_without_writes() {
        let fx = fixture();
        let (order, token) = seed(&fx.store, Duration::seconds(-1)).await;

        let err = fx.service.claim(&token.token, "alice").await.unwrap_err();
        assert_matches!(err, ServiceError::TokenExpired);

        use crate::repositories::OrderRepository;
        let stored = OrderRepository::find_by_id(fx.store.as_ref(), order.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.user_id.is_none());
        let stored_token = fx.store.find_by_token(&token.token).await.unwrap().unwrap();
        assert!(!stored_token.is_claimed());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let fx = fixture();
        assert_matches!(
            fx.service.claim("nope", "alice").await,
            Err(ServiceError::TokenNotFound)
        );
    }

    #[tokio::test]
    async fn same_user_reclaim_is_idempotent_other_user_conflicts() {
        let fx = fixture();
        let (_, token) = seed(&fx.store, Duration::hours(1)).await;

        let first = fx.service.claim(&token.token, "alice").await.unwrap();
        let again = fx.service.claim(&token.token, "alice").await.unwrap();
        assert_eq!(first.order_id, again.order_id);
        assert_eq!(first.claimed_at, again.claimed_at);

        assert_matches!(
            fx.service.claim(&token.token, "bob").await,
            Err(ServiceError::AlreadyClaimed)
        );
    }

    #[tokio::test]
    async fn order_owned_by_someone_else_cannot_be_claimed() {
        let fx = fixture();
        let (order, token) = seed(&fx.store, Duration::hours(1)).await;
        use crate::repositories::OrderRepository;
        assert!(fx.store.assign_user(order.id, "carol").await.unwrap());

        assert_matches!(
            fx.service.claim(&token.token, "alice").await,
            Err(ServiceError::OrderAlreadyAssigned)
        );
    }

    #[tokio::test]
    async fn retry_heals_user_assigned_but_token_unmarked() {
        let fx = fixture();
        let (order, token) = seed(&fx.store, Duration::hours(1)).await;
        use crate::repositories::OrderRepository;
        // simulates a crash between assigning the user and marking the token
        assert!(fx.store.assign_user(order.id, "alice").await.unwrap());

        let result = fx.service.claim(&token.token, "alice").await.unwrap();
        assert_eq!(result.user_id, "alice");

        let stored = fx.store.find_by_token(&token.token).await.unwrap().unwrap();
        assert!(stored.is_claimed_by("alice"));
    }

    /// Token store whose conditional mark always loses to an earlier claim by
    /// the same user.
    struct ConcurrentlyClaimedTokens {
        store: Arc<InMemoryStore>,
        earlier: DateTime<Utc>,
    }

    #[async_trait::async_trait]
    impl ClaimTokenRepository for ConcurrentlyClaimedTokens {
        async fn create(&self, token: NewClaimToken) -> Result<ClaimToken, ServiceError> {
            ClaimTokenRepository::create(self.store.as_ref(), token).await
        }

        async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, ServiceError> {
            self.store.find_by_token(token).await
        }

        async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ClaimToken>, ServiceError> {
            self.store.find_by_order(order_id).await
        }

        async fn mark_claimed(
            &self,
            id: Uuid,
            user_id: &str,
            _claimed_at: DateTime<Utc>,
        ) -> Result<bool, ServiceError> {
            assert!(self.store.mark_claimed(id, user_id, self.earlier).await?);
            Ok(false)
        }
    }

    #[tokio::test]
    async fn losing_the_mark_to_the_same_user_reports_stored_claim_time() {
        let store = Arc::new(InMemoryStore::new());
        let (order, token) = seed(&store, Duration::hours(1)).await;
        let earlier = Utc::now() - Duration::seconds(5);
        let mut repos = Repositories::in_memory(store.clone());
        repos.tokens = Arc::new(ConcurrentlyClaimedTokens {
            store: store.clone(),
            earlier,
        });
        let (dispatcher, mut events) = NotificationDispatcher::channel(4);
        let service = ClaimService::new(repos, dispatcher);

        let result = service.claim(&token.token, "alice").await.unwrap();
        assert_eq!(result.claimed_at, earlier);
        assert_matches!(
            events.try_recv().unwrap(),
            OrderEvent::OrderClaimed { claimed_at, .. } if claimed_at == earlier
        );

        let stored = store.find_by_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.id, token.id);
        assert_eq!(stored.claimed_at, Some(earlier));
    }
}
