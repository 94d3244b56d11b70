use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    handlers::parse_order_id,
    services::orders::{OrderResponse, UpdateOrderRequest},
    AppState,
};

#[utoipa::path(
    patch,
    path = "/api/v1/admin/orders/{id}",
    summary = "Update order",
    description = "Set status, ETA or status message. Any status may be set from any other.",
    params(("id" = String, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid status or order ID", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ServiceError> {
    user.require_admin()?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .services
        .orders
        .update_order(order_id, payload)
        .await?;
    Ok(Json(order))
}
