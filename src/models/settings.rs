use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fallback business origin (Buenos Aires city center) used until an
/// operator stores real settings.
pub const DEFAULT_BUSINESS_LATITUDE: f64 = -34.6037;
pub const DEFAULT_BUSINESS_LONGITUDE: f64 = -58.3816;
pub const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 500;

/// Business-wide delivery pricing settings.
///
/// Loaded once per request from the settings row (or [`Default`] when none
/// exists) and passed explicitly into pricing and payment code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySettings {
    pub business_name: String,
    pub business_latitude: f64,
    pub business_longitude: f64,
    pub default_item_weight_grams: u32,
    #[schema(value_type = String)]
    pub delivery_base_price: Decimal,
    #[schema(value_type = String)]
    pub delivery_price_per_km: Decimal,
    #[schema(value_type = String)]
    pub delivery_price_per_kg: Decimal,
    /// Platform collector account forwarded on direct charges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_id: Option<String>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            business_name: String::new(),
            business_latitude: DEFAULT_BUSINESS_LATITUDE,
            business_longitude: DEFAULT_BUSINESS_LONGITUDE,
            default_item_weight_grams: DEFAULT_ITEM_WEIGHT_GRAMS,
            delivery_base_price: dec!(500),
            delivery_price_per_km: dec!(150),
            delivery_price_per_kg: dec!(100),
            collector_id: None,
        }
    }
}
