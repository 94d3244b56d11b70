use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Delivery Orders API",
        version = "0.1.0",
        description = r#"
# Delivery Orders API

Tracks delivery orders from creation through payment to fulfillment.

- **Claim links**: orders created for a phone number are claimed by the customer with a single-use token
- **Payments**: saved-method charges or hosted checkout links
- **Webhooks**: gateway notifications confirm checkout-link payments exactly once
- **Delivery pricing**: distance and weight based fee quotes

## Authentication

Customer and admin endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Admin endpoints additionally require the `admin` role claim.

## Error Handling

Errors share one body with a stable machine-readable code:

```json
{
  "error": "Conflict",
  "code": "order:token:already-claimed",
  "message": "order has already been claimed",
  "timestamp": "2025-03-01T10:30:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order creation, lookup and claim"),
        (name = "Payments", description = "Direct charges and checkout links"),
        (name = "Webhooks", description = "Payment gateway notifications"),
        (name = "Settings", description = "Delivery pricing"),
        (name = "Admin", description = "Administrative endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::create_order_with_link,
        crate::handlers::orders::get_order,
        crate::handlers::orders::claim_order,

        // Payments
        crate::handlers::orders::pay_for_order,
        crate::handlers::orders::create_payment_link,

        // Webhooks
        crate::handlers::payment_webhooks::payment_notification,

        // Settings
        crate::handlers::settings::get_settings,
        crate::handlers::settings::quote_delivery_fee,

        // Admin
        crate::handlers::admin::update_order,

        // Health
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            // Order types
            crate::models::OrderStatus,
            crate::models::OrderItem,
            crate::services::orders::OrderItemInput,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderWithLinkRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderWithLinkResponse,
            crate::handlers::orders::ClaimOrderRequest,
            crate::services::claims::ClaimResult,

            // Payment types
            crate::handlers::orders::PayForOrderRequest,
            crate::services::payments::PaymentOutcome,
            crate::services::payments::PaymentLink,

            // Settings types
            crate::models::DeliverySettings,
            crate::services::pricing::WeightedItem,
            crate::services::pricing::DeliveryQuote,
            crate::services::settings::DeliveryQuoteRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_core_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Delivery Orders API"));
        assert!(json.contains("/api/v1/orders/claim"));
        assert!(json.contains("/api/v1/webhooks/payments"));
        assert!(json.contains("Bearer"));
    }
}
