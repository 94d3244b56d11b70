// Domain models shared by services, repositories and handlers
pub mod claim_token;
pub mod order;
pub mod profile;
pub mod settings;
pub mod transaction;

pub use claim_token::{ClaimToken, NewClaimToken};
pub use order::{NewOrder, Order, OrderChanges, OrderItem, OrderStatus};
pub use profile::{Profile, ProfileLocation};
pub use settings::DeliverySettings;
pub use transaction::{NewTransaction, Transaction};

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a monetary amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
