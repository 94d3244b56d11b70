use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    handlers::parse_order_id,
    services::{
        claims::ClaimResult,
        orders::{CreateOrderRequest, CreateOrderWithLinkRequest, OrderResponse, OrderWithLinkResponse},
        payments::{PaymentLink, PaymentOutcome},
    },
    AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClaimOrderRequest {
    #[validate(length(min = 1, max = 128))]
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayForOrderRequest {
    /// CVV of the saved card, when the gateway requires it
    pub security_code: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Create an order owned by the authenticated user",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .create_order(&user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/link",
    summary = "Create order with claim link",
    description = "Create an unassigned order and a single-use claim link for the customer",
    request_body = CreateOrderWithLinkRequest,
    responses(
        (status = 201, description = "Order and claim link created", body = OrderWithLinkResponse),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order_with_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderWithLinkRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let created = state
        .services
        .orders
        .create_order_with_link(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Order snapshot with its progress index and the full status list",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = OrderResponse),
        (status = 400, description = "Malformed order ID", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not the order owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .services
        .orders
        .get_order(order_id, &user.user_id, user.is_admin())
        .await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/claim",
    summary = "Claim order",
    description = "Attach the order behind a claim token to the authenticated user. \
                   Repeating a successful claim as the same user returns the current state.",
    request_body = ClaimOrderRequest,
    responses(
        (status = 200, description = "Order claimed", body = ClaimResult),
        (status = 400, description = "Token expired", body = crate::errors::ErrorResponse),
        (status = 404, description = "Token not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already claimed or assigned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn claim_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ClaimOrderRequest>,
) -> Result<Json<ClaimResult>, ServiceError> {
    payload.validate()?;
    let result = state
        .services
        .claims
        .claim(payload.token.trim(), &user.user_id)
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/pay",
    summary = "Pay for order",
    description = "Charge the user's saved payment method for the order total and confirm the order",
    params(("id" = String, Path, description = "Order ID")),
    request_body = PayForOrderRequest,
    responses(
        (status = 200, description = "Order paid and confirmed", body = PaymentOutcome),
        (status = 401, description = "Not the order owner", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or profile not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn pay_for_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    payload: Option<Json<PayForOrderRequest>>,
) -> Result<Json<PaymentOutcome>, ServiceError> {
    let order_id = parse_order_id(&id)?;
    let security_code = payload
        .and_then(|Json(body)| body.security_code)
        .filter(|code| !code.trim().is_empty());
    let outcome = state
        .services
        .payments
        .pay_for_order(order_id, &user.user_id, &user.token, security_code)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment-link",
    summary = "Create payment link",
    description = "Create a hosted checkout link; the order is confirmed later by the payment webhook",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Checkout link created", body = PaymentLink),
        (status = 401, description = "Not the order owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn create_payment_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentLink>, ServiceError> {
    let order_id = parse_order_id(&id)?;
    let link = state
        .services
        .payments
        .create_payment_link(order_id, &user.user_id, &user.token)
        .await?;
    Ok(Json(link))
}
