use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::{
    webhooks::{normalize, WebhookQuery},
    AppState,
};

// GET|POST /api/v1/webhooks/payments
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    summary = "Payment notification",
    description = "Gateway callback for payment and merchant order updates. Accepts the legacy \
                   `topic`/`id` query, the newer `type`/`data.id` query, or a JSON body \
                   `{type, data: {id}}`. Always acknowledged with 200.",
    params(WebhookQuery),
    request_body(content = String, description = "Optional JSON notification body", content_type = "application/json"),
    responses(
        (status = 200, description = "Notification acknowledged, body is always `{\"ok\": true}`")
    ),
    tag = "Webhooks"
)]
pub async fn payment_notification(
    State(state): State<AppState>,
    query: Option<Query<WebhookQuery>>,
    body: Option<Bytes>,
) -> impl IntoResponse {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let body = body.unwrap_or_default();

    match normalize(&query, &body) {
        Some(notification) => {
            state.services.reconciler.handle_notification(notification).await;
        }
        None => debug!(?query, "dropping unsupported or incomplete payment notification"),
    }

    (StatusCode::OK, Json(json!({ "ok": true })))
}
