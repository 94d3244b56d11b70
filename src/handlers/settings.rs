use axum::{extract::State, Json};

use crate::{
    errors::ServiceError,
    models::DeliverySettings,
    services::{pricing::DeliveryQuote, settings::DeliveryQuoteRequest},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "Get delivery settings",
    description = "Business origin and delivery pricing coefficients, or the defaults when none are stored",
    responses(
        (status = 200, description = "Effective settings", body = DeliverySettings),
    ),
    tag = "Settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<DeliverySettings>, ServiceError> {
    Ok(Json(state.services.settings.get_settings().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/settings/delivery-fee",
    summary = "Quote delivery fee",
    description = "Delivery fee breakdown from the business origin to the given coordinates",
    request_body = DeliveryQuoteRequest,
    responses(
        (status = 200, description = "Fee breakdown", body = DeliveryQuote),
        (status = 400, description = "Invalid coordinates or items", body = crate::errors::ErrorResponse),
    ),
    tag = "Settings"
)]
pub async fn quote_delivery_fee(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryQuoteRequest>,
) -> Result<Json<DeliveryQuote>, ServiceError> {
    let quote = state.services.settings.quote_delivery_fee(payload).await?;
    Ok(Json(quote))
}
