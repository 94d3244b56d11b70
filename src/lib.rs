//! Delivery Orders API
//!
//! Order claim links, saved-method charges, hosted checkout links and
//! idempotent reconciliation of payment gateway notifications.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod webhooks;

use axum::{
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::{
    auth::JwtVerifier, config::AppConfig, handlers::AppServices,
    notifications::BroadcastHub, repositories::Repositories,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when running on the in-memory store
    pub db: Option<Arc<DatabaseConnection>>,
    pub repos: Repositories,
    pub services: AppServices,
    pub jwt: JwtVerifier,
    pub hub: BroadcastHub,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: Option<Arc<DatabaseConnection>>,
        repos: Repositories,
        services: AppServices,
        hub: BroadcastHub,
    ) -> Self {
        let jwt = JwtVerifier::new(&config.jwt_secret);
        Self {
            config,
            db,
            repos,
            services,
            jwt,
            hub,
        }
    }
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/link", post(handlers::orders::create_order_with_link))
        .route("/orders/claim", post(handlers::orders::claim_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/pay", post(handlers::orders::pay_for_order))
        .route(
            "/orders/:id/payment-link",
            post(handlers::orders::create_payment_link),
        )
        .route("/admin/orders/:id", patch(handlers::admin::update_order))
        .route("/settings", get(handlers::settings::get_settings))
        .route(
            "/settings/delivery-fee",
            post(handlers::settings::quote_delivery_fee),
        )
        .route(
            "/webhooks/payments",
            get(handlers::payment_webhooks::payment_notification)
                .post(handlers::payment_webhooks::payment_notification),
        )
}

/// Development allows any origin; otherwise only the customer frontend.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_development() {
        return CorsLayer::permissive();
    }

    let origin = config.frontend_url.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "frontend_url is not a valid origin header, CORS disabled");
            CorsLayer::new()
        }
    }
}

/// Full HTTP surface: health probes, the v1 API, Swagger UI and the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}
