#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use delivery_orders_api::{
    auth::{Claims, ADMIN_ROLE},
    config::AppConfig,
    errors::ServiceError,
    gateway::{
        ChargeRequest, ChargeResult, CheckoutPreference, IdentityProvider, MerchantOrderDetail,
        PaymentDetail, PaymentGateway, PreferenceRequest,
    },
    handlers::AppServices,
    models::{DeliverySettings, NewOrder, Order, OrderItem, Profile, ProfileLocation},
    notifications::{process_events, BroadcastHub, NotificationDispatcher, OrderEvent, OrderEventSink},
    repositories::{InMemoryStore, OrderRepository, Repositories},
    AppState,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const FRONTEND_URL: &str = "https://shop.example.com";

/// Scriptable payment gateway. Lookups answer from the registered payments
/// and merchant orders; charges answer with `charge_status`.
pub struct StubGateway {
    pub has_method: Mutex<bool>,
    pub charge_status: Mutex<String>,
    pub payments: Mutex<HashMap<String, PaymentDetail>>,
    pub merchant_orders: Mutex<HashMap<String, MerchantOrderDetail>>,
    pub charges: Mutex<Vec<ChargeRequest>>,
    pub preferences: Mutex<Vec<PreferenceRequest>>,
    pub lookups: AtomicUsize,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            has_method: Mutex::new(true),
            charge_status: Mutex::new("approved".to_string()),
            payments: Mutex::new(HashMap::new()),
            merchant_orders: Mutex::new(HashMap::new()),
            charges: Mutex::new(Vec::new()),
            preferences: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
        }
    }
}

impl StubGateway {
    pub fn approved_payment(&self, payment_id: &str, order_id: Uuid, amount: Decimal) {
        self.register_payment(payment_id, "approved", Some(order_id.to_string()), amount);
    }

    pub fn register_payment(
        &self,
        payment_id: &str,
        status: &str,
        external_reference: Option<String>,
        amount: Decimal,
    ) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            PaymentDetail {
                id: payment_id.to_string(),
                status: status.to_string(),
                external_reference,
                amount,
            },
        );
    }

    pub fn register_merchant_order(&self, detail: MerchantOrderDetail) {
        self.merchant_orders
            .lock()
            .unwrap()
            .insert(detail.id.clone(), detail);
    }

    pub fn charge_count(&self) -> usize {
        self.charges.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn has_payment_method(&self, _payer_id: &str) -> Result<bool, ServiceError> {
        Ok(*self.has_method.lock().unwrap())
    }

    async fn charge_saved_method(&self, request: ChargeRequest) -> Result<ChargeResult, ServiceError> {
        let mut charges = self.charges.lock().unwrap();
        charges.push(request);
        Ok(ChargeResult {
            payment_id: format!("pay-{}", charges.len()),
            gateway_payment_id: format!("gw-{}", charges.len()),
            status: self.charge_status.lock().unwrap().clone(),
        })
    }

    async fn create_checkout_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError> {
        let reference = request.external_reference.clone();
        self.preferences.lock().unwrap().push(request);
        Ok(CheckoutPreference {
            preference_id: format!("pref-{reference}"),
            init_point: format!("https://checkout.example.com/{reference}"),
            sandbox_init_point: format!("https://sandbox.checkout.example.com/{reference}"),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        // let concurrent deliveries interleave on the lookup
        tokio::task::yield_now().await;
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| ServiceError::ExternalServiceError(format!("payment {payment_id} not found")))
    }

    async fn get_merchant_order(
        &self,
        merchant_order_id: &str,
    ) -> Result<MerchantOrderDetail, ServiceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.merchant_orders
            .lock()
            .unwrap()
            .get(merchant_order_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(format!(
                    "merchant order {merchant_order_id} not found"
                ))
            })
    }
}

/// Identity service that knows a fixed set of emails.
#[derive(Default)]
pub struct StubIdentity {
    pub emails: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn get_user_email(&self, identity: &str, _auth_token: &str) -> Result<String, ServiceError> {
        self.emails
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| ServiceError::ExternalServiceError("identity lookup failed".into()))
    }
}

/// Application wired onto the in-memory store with stubbed upstreams.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<StubGateway>,
    pub identity: Arc<StubIdentity>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(InMemoryStore::new());
        let repos = Repositories::in_memory(store.clone());
        let gateway = Arc::new(StubGateway::default());
        let identity = Arc::new(StubIdentity::default());

        let (dispatcher, rx) = NotificationDispatcher::channel(64);
        let hub = BroadcastHub::new(64);
        let sink: Arc<dyn OrderEventSink> = Arc::new(hub.clone());
        let event_task = tokio::spawn(process_events(rx, sink));

        let services = AppServices::new(
            repos.clone(),
            gateway.clone(),
            identity.clone(),
            dispatcher,
            config.clone(),
        );
        let state = AppState::new(config, None, repos, services, hub);
        let router = delivery_orders_api::create_router(state.clone());

        Self {
            router,
            state,
            store,
            gateway,
            identity,
            _event_task: event_task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.state.hub.subscribe()
    }

    /// Seeds a profile with a delivery location for `user_id`.
    pub fn seed_profile(&self, user_id: &str, latitude: f64, longitude: f64) -> Profile {
        let location = ProfileLocation {
            id: Uuid::new_v4(),
            latitude,
            longitude,
            address: "Av. Corrientes 1234".into(),
        };
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            phone_number: "+5491122334455".into(),
            location_id: Some(location.id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.insert_location(location);
        self.store.insert_profile(profile.clone());
        profile
    }

    /// Settings with every pricing coefficient zeroed, so totals equal item sums.
    pub fn free_delivery(&self) {
        self.store.put_settings(DeliverySettings {
            business_name: "Test Kitchen".into(),
            delivery_base_price: Decimal::ZERO,
            delivery_price_per_km: Decimal::ZERO,
            delivery_price_per_kg: Decimal::ZERO,
            ..Default::default()
        });
    }

    pub async fn seed_order(&self, user_id: Option<&str>, items: Vec<OrderItem>) -> Order {
        OrderRepository::create(
            self.store.as_ref(),
            NewOrder {
                user_id: user_id.map(str::to_string),
                profile_id: None,
                eta: "30m".into(),
                items,
            },
        )
        .await
        .unwrap()
    }

    pub async fn order(&self, id: Uuid) -> Order {
        OrderRepository::find_by_id(self.store.as_ref(), id)
            .await
            .unwrap()
            .expect("order exists")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::new(
        "sqlite::memory:",
        TEST_JWT_SECRET,
        FRONTEND_URL,
        "test",
    )
}

pub fn item(name: &str, unit_price: Decimal, quantity: u32) -> OrderItem {
    OrderItem {
        name: name.to_string(),
        unit_price,
        quantity,
        weight_grams: None,
    }
}

/// The two-line basket used across flows: 2 x 1000 + 1 x 500 = 2500.
pub fn basket() -> Vec<OrderItem> {
    vec![item("Empanadas", dec!(1000), 2), item("Flan", dec!(500), 1)]
}

pub fn mint_token(user_id: &str, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.map(str::to_string),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn admin_token() -> String {
    mint_token("admin-1", Some(ADMIN_ROLE))
}
