//! Outbound boundary to the payment service, the processor read API and the
//! identity service.
//!
//! Calls are single attempt with no retry. Callers decide which failures are
//! fatal (charges, preferences) and which are best effort (email lookup).

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::ServiceError;

pub mod http;

pub use self::http::{HttpIdentityProvider, HttpPaymentGateway};

/// Direct charge against the payer's saved instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub payer_id: String,
    pub amount: Decimal,
    pub description: String,
    pub external_reference: String,
    pub payer_email: String,
    pub collector_id: Option<String>,
    pub security_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeResult {
    pub payment_id: String,
    pub gateway_payment_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer_email: String,
    pub external_reference: String,
    pub success_url: String,
    pub failure_url: String,
    pub pending_url: String,
    pub notification_url: Option<String>,
}

/// Hosted checkout page created ahead of payment.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPreference {
    pub preference_id: String,
    pub init_point: String,
    pub sandbox_init_point: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetail {
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MerchantOrderPayment {
    pub id: String,
    pub status: String,
    pub amount: Decimal,
}

/// Gateway-side aggregate of the payment attempts made against one preference.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantOrderDetail {
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
    pub total_amount: Decimal,
    pub payments: Vec<MerchantOrderPayment>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether the payer has at least one saved payment method.
    async fn has_payment_method(&self, payer_id: &str) -> Result<bool, ServiceError>;

    async fn charge_saved_method(&self, request: ChargeRequest)
        -> Result<ChargeResult, ServiceError>;

    async fn create_checkout_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError>;

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError>;

    async fn get_merchant_order(
        &self,
        merchant_order_id: &str,
    ) -> Result<MerchantOrderDetail, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Email of `identity`, authorized with the caller's own bearer token.
    async fn get_user_email(&self, identity: &str, auth_token: &str)
        -> Result<String, ServiceError>;
}
