use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    gateway::{ChargeRequest, IdentityProvider, PaymentGateway, PreferenceItem, PreferenceRequest},
    models::{
        round_money, transaction::STATUS_REJECTED, NewTransaction, Order, OrderStatus, Profile,
        ProfileLocation,
    },
    notifications::{NotificationDispatcher, OrderEvent},
    repositories::Repositories,
    services::pricing::compute_order_total,
};

/// Domain used for synthesized payer addresses when the identity service
/// cannot provide a real one.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "customers.invalid";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub order_id: Uuid,
    pub status: OrderStatus,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub payment_id: String,
    pub gateway_payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub init_point: String,
    pub sandbox_init_point: String,
}

/// Charges saved payment methods and creates hosted checkout links.
#[derive(Clone)]
pub struct PaymentService {
    repos: Repositories,
    gateway: Arc<dyn PaymentGateway>,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: NotificationDispatcher,
    config: Arc<AppConfig>,
}

impl PaymentService {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: NotificationDispatcher,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repos,
            gateway,
            identity,
            dispatcher,
            config,
        }
    }

    /// Charges the caller's saved payment method for the order total and
    /// confirms the order.
    ///
    /// Every gateway answer is written to the ledger, rejected ones included;
    /// a rejected charge then fails the call.
    #[instrument(skip(self, auth_token, security_code), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn pay_for_order(
        &self,
        order_id: Uuid,
        user_id: &str,
        auth_token: &str,
        security_code: Option<String>,
    ) -> Result<PaymentOutcome, ServiceError> {
        let order = self.payable_order(order_id, user_id).await?;

        let profile = match order.profile_id {
            Some(_) => self.find_profile(&order).await?,
            None => self.heal_profile(&order).await?,
        }
        .ok_or(ServiceError::ProfileNotFound)?;

        if !self.gateway.has_payment_method(&profile.user_id).await? {
            return Err(ServiceError::PaymentFailed(
                "user has no saved payment method".to_string(),
            ));
        }

        let settings = self.repos.settings.effective().await?;
        let location = self.find_location(&profile).await;
        let total = compute_order_total(&order, &settings, location.as_ref())?;
        if total <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "order total must be greater than zero".to_string(),
            ));
        }

        let payer_email = self.resolve_payer_email(&profile.user_id, auth_token).await;
        let description = format!("Payment for order {}", order.id);

        let charge = self
            .gateway
            .charge_saved_method(ChargeRequest {
                payer_id: profile.user_id.clone(),
                amount: total,
                description: description.clone(),
                external_reference: order.id.to_string(),
                payer_email,
                collector_id: settings.collector_id.clone(),
                security_code,
            })
            .await?;
        counter!("delivery_orders.charges.attempted", 1);
        info!(
            payment_id = %charge.payment_id,
            gateway_payment_id = %charge.gateway_payment_id,
            status = %charge.status,
            %total,
            "saved-method charge processed"
        );

        let ledger_entry = NewTransaction {
            order_id: order.id,
            user_id: profile.user_id.clone(),
            profile_id: Some(profile.id),
            amount: total,
            currency: self.config.currency.clone(),
            status: charge.status.clone(),
            payment_id: Some(charge.payment_id.clone()),
            gateway_payment_id: Some(charge.gateway_payment_id.clone()),
            collector_id: settings.collector_id.clone(),
            description: Some(description),
        };
        if let Err(e) = self.repos.transactions.insert(ledger_entry).await {
            error!(error = %e, "failed to record charge in the ledger");
        }

        if charge.status.eq_ignore_ascii_case(STATUS_REJECTED) {
            counter!("delivery_orders.charges.rejected", 1);
            return Err(ServiceError::PaymentFailed(
                "payment was rejected by the gateway".to_string(),
            ));
        }

        if self
            .repos
            .orders
            .update_status_if_current(order.id, OrderStatus::Created, OrderStatus::Confirmed)
            .await?
        {
            self.dispatcher.publish(OrderEvent::OrderUpdated {
                order_id: order.id,
                status: OrderStatus::Confirmed,
                eta: order.eta.clone(),
            });
        } else {
            warn!("order left CREATED while the charge was in flight");
        }
        counter!("delivery_orders.charges.confirmed", 1);

        Ok(PaymentOutcome {
            order_id: order.id,
            status: OrderStatus::Confirmed,
            amount: total,
            payment_id: charge.payment_id,
            gateway_payment_id: charge.gateway_payment_id,
        })
    }

    /// Creates a hosted checkout preference for the order. Nothing is
    /// written locally; confirmation arrives through the payment webhook.
    #[instrument(skip(self, auth_token), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn create_payment_link(
        &self,
        order_id: Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<PaymentLink, ServiceError> {
        let order = self.payable_order(order_id, user_id).await?;

        let profile = match order.profile_id {
            Some(_) => self.find_profile(&order).await?,
            None => self.repos.profiles.find_by_user_id(user_id).await?,
        };
        let location = match &profile {
            Some(profile) => self.find_location(profile).await,
            None => None,
        };

        let settings = self.repos.settings.effective().await?;
        let total = compute_order_total(&order, &settings, location.as_ref())?;
        if total <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "order total must be greater than zero".to_string(),
            ));
        }

        let payer_identity = profile
            .as_ref()
            .map(|p| p.user_id.as_str())
            .unwrap_or(user_id);
        let payer_email = self.resolve_payer_email(payer_identity, auth_token).await;

        let order_url = format!(
            "{}/order/{}",
            self.config.frontend_url.trim_end_matches('/'),
            order.id
        );
        let preference = self
            .gateway
            .create_checkout_preference(PreferenceRequest {
                items: self.preference_items(&order, total),
                payer_email,
                external_reference: order.id.to_string(),
                success_url: order_url.clone(),
                failure_url: order_url.clone(),
                pending_url: order_url,
                notification_url: self.config.notification_url(),
            })
            .await?;

        info!(preference_id = %preference.preference_id, %total, "checkout preference created");
        Ok(PaymentLink {
            init_point: preference.init_point,
            sandbox_init_point: preference.sandbox_init_point,
        })
    }

    /// Order lines plus a separate delivery line when a fee applies. An order
    /// without lines is billed as a single generic line.
    fn preference_items(&self, order: &Order, total: Decimal) -> Vec<PreferenceItem> {
        let currency = &self.config.currency;
        let mut items: Vec<PreferenceItem> = order
            .items
            .iter()
            .map(|item| PreferenceItem {
                title: item.name.clone(),
                quantity: item.quantity,
                unit_price: round_money(item.unit_price),
                currency_id: currency.clone(),
            })
            .collect();

        if items.is_empty() {
            return vec![PreferenceItem {
                title: format!("Order {}", order.id),
                quantity: 1,
                unit_price: total,
                currency_id: currency.clone(),
            }];
        }

        let delivery_fee = round_money(total - order.items_total());
        if delivery_fee > Decimal::ZERO {
            items.push(PreferenceItem {
                title: "Delivery".to_string(),
                quantity: 1,
                unit_price: delivery_fee,
                currency_id: currency.clone(),
            });
        }
        items
    }

    async fn payable_order(&self, order_id: Uuid, user_id: &str) -> Result<Order, ServiceError> {
        let order = self
            .repos
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound)?;

        if !order.is_owned_by(user_id) {
            return Err(ServiceError::Unauthorized(
                "order does not belong to this user".to_string(),
            ));
        }
        if order.status != OrderStatus::Created {
            return Err(ServiceError::OrderAlreadyPaid);
        }
        Ok(order)
    }

    async fn find_profile(&self, order: &Order) -> Result<Option<Profile>, ServiceError> {
        match order.profile_id {
            Some(profile_id) => self.repos.profiles.find_by_id(profile_id).await,
            None => Ok(None),
        }
    }

    /// Orders claimed before the user completed their profile carry no
    /// profile yet; attach the user's profile now if one exists.
    async fn heal_profile(&self, order: &Order) -> Result<Option<Profile>, ServiceError> {
        let Some(user_id) = order.user_id.as_deref() else {
            return Ok(None);
        };
        let profile = self.repos.profiles.find_by_user_id(user_id).await?;
        if let Some(profile) = &profile {
            self.repos.orders.assign_profile(order.id, profile.id).await?;
            info!(order_id = %order.id, profile_id = %profile.id, "attached profile to order");
        }
        Ok(profile)
    }

    /// Missing or unreadable locations only drop the delivery fee.
    async fn find_location(&self, profile: &Profile) -> Option<ProfileLocation> {
        let location_id = profile.location_id?;
        match self.repos.profiles.find_location(location_id).await {
            Ok(location) => location,
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "location lookup failed, pricing without delivery");
                None
            }
        }
    }

    async fn resolve_payer_email(&self, identity: &str, auth_token: &str) -> String {
        if !auth_token.is_empty() {
            match self.identity.get_user_email(identity, auth_token).await {
                Ok(email) if !email.trim().is_empty() => return email,
                Ok(_) => warn!(identity, "identity service returned an empty email"),
                Err(e) => warn!(identity, error = %e, "payer email lookup failed"),
            }
        }
        format!("{identity}@{PLACEHOLDER_EMAIL_DOMAIN}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChargeResult, MockIdentityProvider, MockPaymentGateway};
    use crate::models::{DeliverySettings, NewOrder, OrderItem};
    use crate::repositories::{InMemoryStore, OrderRepository, TransactionRepository};
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig::new(
            "sqlite::memory:",
            "unit-test-secret-with-enough-entropy-0123",
            "https://shop.example.com",
            "test",
        ))
    }

    async fn seed_order(store: &InMemoryStore, user: Option<&str>) -> Order {
        OrderRepository::create(
            store,
            NewOrder {
                user_id: user.map(str::to_string),
                profile_id: None,
                eta: "25m".into(),
                items: vec![
                    OrderItem {
                        name: "Pizza".into(),
                        unit_price: dec!(1000),
                        quantity: 2,
                        weight_grams: None,
                    },
                    OrderItem {
                        name: "Soda".into(),
                        unit_price: dec!(500),
                        quantity: 1,
                        weight_grams: None,
                    },
                ],
            },
        )
        .await
        .unwrap()
    }

    fn seed_profile(store: &InMemoryStore, user: &str) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: user.into(),
            phone_number: "+5491100000000".into(),
            location_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_profile(profile.clone());
        profile
    }

    fn service(
        store: Arc<InMemoryStore>,
        gateway: MockPaymentGateway,
        identity: MockIdentityProvider,
    ) -> PaymentService {
        let (dispatcher, _rx) = NotificationDispatcher::channel(8);
        PaymentService::new(
            Repositories::in_memory(store),
            Arc::new(gateway),
            Arc::new(identity),
            dispatcher,
            config(),
        )
    }

    #[tokio::test]
    async fn charges_total_and_confirms_order() {
        let store = Arc::new(InMemoryStore::new());
        let order = seed_order(&store, Some("alice")).await;
        seed_profile(&store, "alice");

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_has_payment_method().returning(|_| Ok(true));
        gateway
            .expect_charge_saved_method()
            .withf(|req| req.amount == dec!(2500) && req.payer_email == "alice@example.com")
            .times(1)
            .returning(|_| {
                Ok(ChargeResult {
                    payment_id: "42".into(),
                    gateway_payment_id: "mp-42".into(),
                    status: "approved".into(),
                })
            });
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_get_user_email()
            .returning(|_, _| Ok("alice@example.com".into()));

        let outcome = service(store.clone(), gateway, identity)
            .pay_for_order(order.id, "alice", "jwt", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Confirmed);
        assert_eq!(outcome.amount, dec!(2500));
        let stored = OrderRepository::find_by_id(store.as_ref(), order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert!(stored.profile_id.is_some());
        assert_eq!(store.list_by_order(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_charge_is_recorded_then_fails() {
        let store = Arc::new(InMemoryStore::new());
        let order = seed_order(&store, Some("alice")).await;
        seed_profile(&store, "alice");
        store.put_settings(DeliverySettings {
            collector_id: Some("collector-9".into()),
            ..Default::default()
        });

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_has_payment_method().returning(|_| Ok(true));
        gateway
            .expect_charge_saved_method()
            .withf(|req| req.collector_id.as_deref() == Some("collector-9"))
            .returning(|_| {
                Ok(ChargeResult {
                    payment_id: "43".into(),
                    gateway_payment_id: "mp-43".into(),
                    status: "rejected".into(),
                })
            });
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_get_user_email()
            .returning(|_, _| Err(ServiceError::ExternalServiceError("down".into())));

        let err = service(store.clone(), gateway, identity)
            .pay_for_order(order.id, "alice", "jwt", None)
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::PaymentFailed(_));
        let rows = store.list_by_order(order.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "rejected");
        let stored = OrderRepository::find_by_id(store.as_ref(), order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn preconditions_fail_before_any_gateway_call() {
        let store = Arc::new(InMemoryStore::new());
        let order = seed_order(&store, Some("alice")).await;
        let svc = service(store.clone(), MockPaymentGateway::new(), MockIdentityProvider::new());

        assert_matches!(
            svc.pay_for_order(order.id, "mallory", "", None).await,
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            svc.pay_for_order(order.id, "alice", "", None).await,
            Err(ServiceError::ProfileNotFound)
        );
        assert_matches!(
            svc.pay_for_order(Uuid::new_v4(), "alice", "", None).await,
            Err(ServiceError::OrderNotFound)
        );

        store
            .update_status_if_current(order.id, OrderStatus::Created, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_matches!(
            svc.pay_for_order(order.id, "alice", "", None).await,
            Err(ServiceError::OrderAlreadyPaid)
        );
    }

    #[tokio::test]
    async fn missing_payment_method_fails() {
        let store = Arc::new(InMemoryStore::new());
        let order = seed_order(&store, Some("alice")).await;
        seed_profile(&store, "alice");
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_has_payment_method().returning(|_| Ok(false));

        let err = service(store, gateway, MockIdentityProvider::new())
            .pay_for_order(order.id, "alice", "", None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::PaymentFailed(_));
    }

    #[tokio::test]
    async fn payment_link_builds_items_and_callback_urls() {
        let store = Arc::new(InMemoryStore::new());
        let order = seed_order(&store, Some("alice")).await;
        let expected_url = format!("https://shop.example.com/order/{}", order.id);

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_preference()
            .withf(move |req| {
                req.items.len() == 2
                    && req.items.iter().all(|i| i.currency_id == "ARS")
                    && req.success_url == expected_url
                    && req.pending_url == expected_url
                    && req.payer_email == format!("alice@{PLACEHOLDER_EMAIL_DOMAIN}")
                    && req.notification_url.is_none()
            })
            .returning(|_| {
                Ok(crate::gateway::CheckoutPreference {
                    preference_id: "pref-1".into(),
                    init_point: "https://pay.example.com/init".into(),
                    sandbox_init_point: "https://sandbox.example.com/init".into(),
                })
            });

        let link = service(store.clone(), gateway, MockIdentityProvider::new())
            .create_payment_link(order.id, "alice", "")
            .await
            .unwrap();

        assert_eq!(link.init_point, "https://pay.example.com/init");
        let stored = OrderRepository::find_by_id(store.as_ref(), order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Created);
    }

    #[test]
    fn delivery_line_added_only_when_fee_applies() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store, MockPaymentGateway::new(), MockIdentityProvider::new());
        let order = Order {
            id: Uuid::new_v4(),
            profile_id: None,
            user_id: Some("alice".into()),
            status: OrderStatus::Created,
            status_message: None,
            eta: String::new(),
            items: vec![OrderItem {
                name: "Pizza".into(),
                unit_price: dec!(1000),
                quantity: 1,
                weight_grams: None,
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(svc.preference_items(&order, dec!(1000)).len(), 1);
        let with_fee = svc.preference_items(&order, dec!(1650.50));
        assert_eq!(with_fee.len(), 2);
        assert_eq!(with_fee[1].unit_price, dec!(650.50));
    }
}
