use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    errors::ServiceError,
    models::DeliverySettings,
    repositories::Repositories,
    services::pricing::{quote_delivery, DeliveryQuote, WeightedItem},
};

fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (-90.0..=90.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("latitude"))
    }
}

fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (-180.0..=180.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("longitude"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuoteRequest {
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "validate_longitude")]
    pub longitude: f64,
    #[serde(default)]
    pub items: Vec<WeightedItem>,
}

#[derive(Clone)]
pub struct SettingsService {
    repos: Repositories,
}

impl SettingsService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub async fn get_settings(&self) -> Result<DeliverySettings, ServiceError> {
        self.repos.settings.effective().await
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn quote_delivery_fee(
        &self,
        request: DeliveryQuoteRequest,
    ) -> Result<DeliveryQuote, ServiceError> {
        request.validate()?;
        if request.items.iter().any(|item| item.quantity == 0) {
            return Err(ServiceError::ValidationError(
                "item quantity must be at least 1".to_string(),
            ));
        }

        let settings = self.get_settings().await?;
        quote_delivery(
            &settings,
            request.latitude,
            request.longitude,
            &request.items,
        )
    }
}
