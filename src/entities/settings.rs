use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::settings::DEFAULT_ITEM_WEIGHT_GRAMS;
use crate::models::DeliverySettings;

/// Primary key of the single settings row.
pub const SINGLETON_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub business_name: String,
    pub business_latitude: f64,
    pub business_longitude: f64,
    pub default_item_weight_grams: i32,
    pub delivery_base_price: Decimal,
    pub delivery_price_per_km: Decimal,
    pub delivery_price_per_kg: Decimal,
    pub collector_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DeliverySettings {
    fn from(model: Model) -> Self {
        Self {
            business_name: model.business_name,
            business_latitude: model.business_latitude,
            business_longitude: model.business_longitude,
            default_item_weight_grams: u32::try_from(model.default_item_weight_grams)
                .ok()
                .filter(|grams| *grams > 0)
                .unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS),
            delivery_base_price: model.delivery_base_price,
            delivery_price_per_km: model.delivery_price_per_km,
            delivery_price_per_kg: model.delivery_price_per_kg,
            collector_id: model.collector_id.filter(|id| !id.trim().is_empty()),
        }
    }
}
