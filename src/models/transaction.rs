use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gateway status string for an approved payment.
pub const STATUS_APPROVED: &str = "approved";
/// Gateway status string for a rejected payment.
pub const STATUS_REJECTED: &str = "rejected";

/// Append-only ledger row recording a charge attempt or a confirmed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: String,
    pub profile_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub collector_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub order_id: Uuid,
    pub user_id: String,
    pub profile_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub collector_id: Option<String>,
    pub description: Option<String>,
}
