pub mod admin;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod settings;

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    gateway::{IdentityProvider, PaymentGateway},
    notifications::NotificationDispatcher,
    repositories::Repositories,
    services::{
        claims::ClaimService, orders::OrderService, payment_reconciler::PaymentReconciler,
        payments::PaymentService, settings::SettingsService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub claims: Arc<ClaimService>,
    pub payments: Arc<PaymentService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub settings: Arc<SettingsService>,
}

impl AppServices {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: NotificationDispatcher,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(
                repos.clone(),
                dispatcher.clone(),
                config.clone(),
            )),
            claims: Arc::new(ClaimService::new(repos.clone(), dispatcher.clone())),
            payments: Arc::new(PaymentService::new(
                repos.clone(),
                gateway.clone(),
                identity,
                dispatcher.clone(),
                config.clone(),
            )),
            reconciler: Arc::new(PaymentReconciler::new(
                repos.clone(),
                gateway,
                dispatcher,
                config.currency.clone(),
            )),
            settings: Arc::new(SettingsService::new(repos)),
        }
    }
}

/// Path ids are parsed by hand so a malformed id maps to `order:invalid-id`
/// instead of axum's plain-text rejection.
pub fn parse_order_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::InvalidOrderId)
}
