/*!
 * # Authentication
 *
 * Bearer JWT (HS256) validation for the customer and admin routes.
 *
 * The `sub` claim carries the external user id; an optional `role` claim of
 * `admin` unlocks the admin panel routes. The raw token is kept on the
 * extracted user because payer-email resolution forwards it to the identity
 * service.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::errors::ServiceError;

pub const ADMIN_ROLE: &str = "admin";

/// JWT claims accepted by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id. Tokens minted by the auth service use `user_id`.
    #[serde(alias = "user_id")]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
}

/// Validates bearer tokens against the shared HS256 secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(Validation::new(Algorithm::HS256)),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected bearer token");
                ServiceError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

/// Caller identity extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token: String,
    pub role: Option<String>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case(ADMIN_ROLE))
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("admin role required".to_string()))
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("malformed authorization header".to_string()))?;

    let mut segments = value.splitn(2, ' ');
    match (segments.next(), segments.next()) {
        (Some(scheme), Some(token))
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            Ok(token.trim())
        }
        _ => Err(ServiceError::Unauthorized(
            "invalid authorization format, use: Bearer <token>".to_string(),
        )),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    JwtVerifier: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = JwtVerifier::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = verifier.verify(token)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            token: token.to_string(),
            role: claims.role,
        })
    }
}
