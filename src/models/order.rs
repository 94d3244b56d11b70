use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::round_money;

/// Lifecycle of a delivery order.
///
/// Variants are declared in forward order; `Cancelled` is terminal and sits
/// at the end of the list so the progress bar can still render it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Confirmed,
    Preparing,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Position of this status in the canonical list.
    pub fn position(self) -> usize {
        OrderStatus::iter()
            .position(|candidate| candidate == self)
            .unwrap_or_default()
    }

    /// Progress index for a raw stored status, `-1` when the value is unknown.
    pub fn index_of(raw: &str) -> i32 {
        raw.parse::<OrderStatus>()
            .map(|status| status.position() as i32)
            .unwrap_or(-1)
    }

    /// All statuses in canonical order, as their wire names.
    pub fn all_names() -> Vec<String> {
        OrderStatus::iter().map(|s| s.to_string()).collect()
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    #[schema(value_type = String, example = "1000.00")]
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Weight of one unit in grams; settings provide a default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<u32>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub status_message: Option<String>,
    pub eta: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of `unit_price * quantity`, rounded to cents. Never cached.
    pub fn items_total(&self) -> Decimal {
        round_money(self.items.iter().map(OrderItem::line_total).sum())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    pub fn status_index(&self) -> i32 {
        self.status.position() as i32
    }
}

/// Input for inserting an order together with its item rows.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: Option<String>,
    pub profile_id: Option<Uuid>,
    pub eta: String,
    pub items: Vec<OrderItem>,
}

/// Partial update applied by the admin panel.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub eta: Option<String>,
    pub status_message: Option<String>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.eta.is_none() && self.status_message.is_none()
    }
}
