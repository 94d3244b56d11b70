use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{
    ChargeRequest, ChargeResult, CheckoutPreference, IdentityProvider, MerchantOrderDetail,
    MerchantOrderPayment, PaymentDetail, PaymentGateway, PreferenceRequest,
};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::round_money;

const API_KEY_HEADER: &str = "X-API-Key";

fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::InternalError(format!("failed to build HTTP client: {}", e)))
}

/// Turns a non-success response into an upstream failure carrying the body.
async fn ensure_success(response: Response, service: &str) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::ExternalServiceError(format!(
        "{} returned {}: {}",
        service, status, body
    )))
}

/// Gateway ids arrive as JSON numbers or strings depending on the endpoint.
fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn to_wire_amount(amount: Decimal) -> Result<f64, ServiceError> {
    round_money(amount)
        .to_f64()
        .ok_or_else(|| ServiceError::ValidationError(format!("amount {} is not representable", amount)))
}

fn from_wire_amount(amount: f64) -> Decimal {
    Decimal::from_f64(amount).map(round_money).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct PaymentMethodWire {
    #[serde(default)]
    id: i64,
}

#[derive(Debug, Serialize)]
struct PayerWire<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ChargeWire<'a> {
    transaction_amount: f64,
    payment_method_id: i64,
    payer: PayerWire<'a>,
    installments: u32,
    description: &'a str,
    external_reference: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    collector_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChargeResponseWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    gateway_payment_id: Value,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
struct PreferenceItemWire<'a> {
    title: &'a str,
    quantity: u32,
    unit_price: f64,
    currency_id: &'a str,
}

#[derive(Debug, Serialize)]
struct BackUrlsWire<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferenceWire<'a> {
    items: Vec<PreferenceItemWire<'a>>,
    payer_email: &'a str,
    external_reference: &'a str,
    back_urls: BackUrlsWire<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponseWire {
    #[serde(default)]
    preference_id: String,
    #[serde(default)]
    init_point: String,
    #[serde(default)]
    sandbox_init_point: String,
}

#[derive(Debug, Deserialize)]
struct PaymentWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    transaction_amount: f64,
}

#[derive(Debug, Deserialize)]
struct MerchantOrderPaymentWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    transaction_amount: f64,
}

#[derive(Debug, Deserialize)]
struct MerchantOrderWire {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    total_amount: f64,
    #[serde(default)]
    payments: Vec<MerchantOrderPaymentWire>,
}

#[derive(Debug, Deserialize)]
struct UserWire {
    #[serde(default)]
    email: String,
}

/// reqwest client for the payment service (saved methods, charges,
/// preferences) and the processor's read API (payments, merchant orders).
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    payment_service_url: String,
    api_key: String,
    gateway_api_url: String,
    access_token: String,
}

impl HttpPaymentGateway {
    pub fn new(
        payment_service_url: impl Into<String>,
        api_key: impl Into<String>,
        gateway_api_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            payment_service_url: payment_service_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            gateway_api_url: gateway_api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.payment_service_url.clone(),
            config.payment_api_key.clone(),
            config.gateway_api_url.clone(),
            config.gateway_access_token.clone(),
            config.http_timeout(),
        )
    }

    fn service_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.payment_service_url, path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn service_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.payment_service_url, path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn processor_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.gateway_api_url, path))
            .bearer_auth(&self.access_token)
    }

    /// Default saved method id, `None` when the payer has no default.
    async fn default_payment_method(&self, payer_id: &str) -> Result<Option<i64>, ServiceError> {
        let response = self
            .service_get(&format!("/api/v1/payment-methods/user/{}/default", payer_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let method: PaymentMethodWire = ensure_success(response, "payment service")
            .await?
            .json()
            .await?;
        Ok(Some(method.id).filter(|id| *id > 0))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn has_payment_method(&self, payer_id: &str) -> Result<bool, ServiceError> {
        if self.default_payment_method(payer_id).await?.is_some() {
            return Ok(true);
        }

        let response = self
            .service_get(&format!("/api/v1/payment-methods/user/{}", payer_id))
            .send()
            .await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "payment method list unavailable");
            return Ok(false);
        }
        let methods: Vec<PaymentMethodWire> = response.json().await?;
        Ok(!methods.is_empty())
    }

    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn charge_saved_method(
        &self,
        request: ChargeRequest,
    ) -> Result<ChargeResult, ServiceError> {
        let method_id = self
            .default_payment_method(&request.payer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::PaymentFailed("no payment method found for user".to_string())
            })?;

        let body = ChargeWire {
            transaction_amount: to_wire_amount(request.amount)?,
            payment_method_id: method_id,
            payer: PayerWire {
                email: &request.payer_email,
            },
            installments: 1,
            description: &request.description,
            external_reference: &request.external_reference,
            user_id: &request.payer_id,
            collector_id: request.collector_id.as_deref().filter(|c| !c.is_empty()),
            security_code: request.security_code.as_deref().filter(|c| !c.is_empty()),
        };

        let response = self
            .service_post("/api/v1/payments/with-saved-method")
            .json(&body)
            .send()
            .await?;
        let result: ChargeResponseWire = ensure_success(response, "payment service")
            .await?
            .json()
            .await?;

        Ok(ChargeResult {
            payment_id: id_to_string(&result.id),
            gateway_payment_id: id_to_string(&result.gateway_payment_id),
            status: result.status,
        })
    }

    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_checkout_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError> {
        let items = request
            .items
            .iter()
            .map(|item| {
                Ok(PreferenceItemWire {
                    title: &item.title,
                    quantity: item.quantity,
                    unit_price: to_wire_amount(item.unit_price)?,
                    currency_id: &item.currency_id,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let body = PreferenceWire {
            items,
            payer_email: &request.payer_email,
            external_reference: &request.external_reference,
            back_urls: BackUrlsWire {
                success: &request.success_url,
                failure: &request.failure_url,
                pending: &request.pending_url,
            },
            notification_url: request.notification_url.as_deref(),
        };

        let response = self
            .service_post("/api/v1/payments/preferences")
            .json(&body)
            .send()
            .await?;
        let preference: PreferenceResponseWire = ensure_success(response, "payment service")
            .await?
            .json()
            .await?;

        Ok(CheckoutPreference {
            preference_id: preference.preference_id,
            init_point: preference.init_point,
            sandbox_init_point: preference.sandbox_init_point,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError> {
        let response = self
            .processor_get(&format!("/v1/payments/{}", payment_id))
            .send()
            .await?;
        let payment: PaymentWire = ensure_success(response, "payment processor")
            .await?
            .json()
            .await?;

        let id = match id_to_string(&payment.id) {
            id if id.is_empty() => payment_id.to_string(),
            id => id,
        };
        Ok(PaymentDetail {
            id,
            status: payment.status,
            external_reference: non_empty(payment.external_reference),
            amount: from_wire_amount(payment.transaction_amount),
        })
    }

    #[instrument(skip(self))]
    async fn get_merchant_order(
        &self,
        merchant_order_id: &str,
    ) -> Result<MerchantOrderDetail, ServiceError> {
        let response = self
            .processor_get(&format!("/merchant_orders/{}", merchant_order_id))
            .send()
            .await?;
        let merchant_order: MerchantOrderWire = ensure_success(response, "payment processor")
            .await?
            .json()
            .await?;

        Ok(MerchantOrderDetail {
            id: match id_to_string(&merchant_order.id) {
                id if id.is_empty() => merchant_order_id.to_string(),
                id => id,
            },
            status: merchant_order.status,
            external_reference: non_empty(merchant_order.external_reference),
            total_amount: from_wire_amount(merchant_order.total_amount),
            payments: merchant_order
                .payments
                .into_iter()
                .map(|p| MerchantOrderPayment {
                    id: id_to_string(&p.id),
                    status: p.status,
                    amount: from_wire_amount(p.transaction_amount),
                })
                .collect(),
        })
    }
}

/// Resolves payer emails from the identity service using the caller's token.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(config.auth_api_url.clone(), config.http_timeout())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip(self, auth_token))]
    async fn get_user_email(
        &self,
        identity: &str,
        auth_token: &str,
    ) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(format!("{}/api/v1/users/{}", self.base_url, identity))
            .bearer_auth(auth_token)
            .send()
            .await?;
        let user: UserWire = ensure_success(response, "identity service")
            .await?
            .json()
            .await?;

        if user.email.trim().is_empty() {
            warn!("identity service returned no email");
            return Err(ServiceError::ExternalServiceError(
                "identity service returned an empty email".to_string(),
            ));
        }
        Ok(user.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_strings() {
        assert_eq!(id_to_string(&json!(12345)), "12345");
        assert_eq!(id_to_string(&json!("abc")), "abc");
        assert_eq!(id_to_string(&Value::Null), "");
    }

    #[test]
    fn wire_amounts_are_rounded_to_cents() {
        assert_eq!(to_wire_amount(dec!(10.005)).unwrap(), 10.01);
        assert_eq!(from_wire_amount(2500.0), dec!(2500));
        assert_eq!(from_wire_amount(19.999), dec!(20.00));
    }
}
