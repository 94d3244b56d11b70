use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    config::AppConfig,
    errors::ServiceError,
    models::{ClaimToken, NewClaimToken, NewOrder, Order, OrderChanges, OrderItem, OrderStatus},
    notifications::{NotificationDispatcher, OrderEvent},
    repositories::Repositories,
};

fn validate_non_negative_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("range");
        err.message = Some("Unit price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    #[validate(custom = "validate_non_negative_price")]
    #[schema(value_type = String, example = "1000.00")]
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(range(min = 1, message = "Weight must be positive"))]
    pub weight_grams: Option<u32>,
}

impl From<OrderItemInput> for OrderItem {
    fn from(input: OrderItemInput) -> Self {
        OrderItem {
            name: input.name.trim().to_string(),
            unit_price: input.unit_price,
            quantity: input.quantity,
            weight_grams: input.weight_grams,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub eta: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<OrderItemInput>,
}

/// Order created on behalf of a customer who will claim it later.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderWithLinkRequest {
    #[validate(length(min = 6, max = 32))]
    pub phone_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub eta: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[schema(example = "PREPARING")]
    pub status: Option<String>,
    #[validate(length(max = 100))]
    pub eta: Option<String>,
    #[validate(length(max = 500))]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub status_message: Option<String>,
    pub eta: String,
    pub items: Vec<OrderItem>,
    #[schema(value_type = String)]
    pub items_total: Decimal,
    /// Position of `status` in `allStatuses`
    pub status_index: i32,
    pub all_statuses: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            items_total: order.items_total(),
            status_index: order.status_index(),
            all_statuses: OrderStatus::all_names(),
            id: order.id,
            profile_id: order.profile_id,
            user_id: order.user_id,
            status: order.status,
            status_message: order.status_message,
            eta: order.eta,
            items: order.items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithLinkResponse {
    pub order_id: Uuid,
    pub token: String,
    pub claim_url: String,
    pub status: OrderStatus,
    pub eta: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn validate_items(items: &[OrderItemInput]) -> Result<(), ServiceError> {
    for item in items {
        item.validate()?;
        if item.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "item name cannot be blank".to_string(),
            ));
        }
    }
    Ok(())
}

/// Order creation, lookup and the admin status panel.
#[derive(Clone)]
pub struct OrderService {
    repos: Repositories,
    dispatcher: NotificationDispatcher,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(repos: Repositories, dispatcher: NotificationDispatcher, config: Arc<AppConfig>) -> Self {
        Self {
            repos,
            dispatcher,
            config,
        }
    }

    /// Creates an order owned by `user_id` from the start.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: &str,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        validate_items(&request.items)?;

        let profile_id = self
            .repos
            .profiles
            .find_by_user_id(user_id)
            .await?
            .map(|profile| profile.id);

        let order = self
            .repos
            .orders
            .create(NewOrder {
                user_id: Some(user_id.to_string()),
                profile_id,
                eta: request.eta,
                items: request.items.into_iter().map(OrderItem::from).collect(),
            })
            .await?;

        info!(order_id = %order.id, "order created");
        Ok(order.into())
    }

    /// Creates an unassigned order plus the claim token that lets a customer
    /// take it over.
    #[instrument(skip(self, request))]
    pub async fn create_order_with_link(
        &self,
        request: CreateOrderWithLinkRequest,
    ) -> Result<OrderWithLinkResponse, ServiceError> {
        request.validate()?;
        validate_items(&request.items)?;

        let order = self
            .repos
            .orders
            .create(NewOrder {
                user_id: None,
                profile_id: None,
                eta: request.eta,
                items: request.items.into_iter().map(OrderItem::from).collect(),
            })
            .await?;

        let token = self
            .repos
            .tokens
            .create(NewClaimToken {
                order_id: order.id,
                token: ClaimToken::generate_secret(),
                phone_number: request.phone_number,
                expires_at: Utc::now() + self.config.claim_token_ttl(),
            })
            .await?;

        let claim_url = format!(
            "{}/order/claim/{}",
            self.config.frontend_url.trim_end_matches('/'),
            token.token
        );
        info!(order_id = %order.id, expires_at = %token.expires_at, "order created with claim link");

        Ok(OrderWithLinkResponse {
            order_id: order.id,
            token: token.token,
            claim_url,
            status: order.status,
            eta: order.eta,
            expires_at: token.expires_at,
            created_at: order.created_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        caller_id: &str,
        caller_is_admin: bool,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self
            .repos
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound)?;

        if !caller_is_admin && !order.is_owned_by(caller_id) {
            return Err(ServiceError::Unauthorized(
                "order does not belong to this user".to_string(),
            ));
        }
        Ok(order.into())
    }

    /// Admin edit. Status writes are unconditional: any status, CANCELLED
    /// included, can be set from any other.
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let status = request
            .status
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .to_ascii_uppercase()
                    .parse::<OrderStatus>()
                    .map_err(|_| ServiceError::InvalidStatus(raw.to_string()))
            })
            .transpose()?;

        let changes = OrderChanges {
            status,
            eta: request.eta,
            status_message: request.status_message,
        };
        let publish = !changes.is_empty();

        let order = self
            .repos
            .orders
            .update(order_id, changes)
            .await?
            .ok_or(ServiceError::OrderNotFound)?;

        if publish {
            info!(order_id = %order.id, status = %order.status, "order updated by admin");
            self.dispatcher.publish(OrderEvent::OrderUpdated {
                order_id: order.id,
                status: order.status,
                eta: order.eta.clone(),
            });
        }
        Ok(order.into())
    }
}
