// Pure delivery pricing
pub mod pricing;

// Order lifecycle
pub mod claims;
pub mod orders;

// Payments: direct charges, checkout links and webhook reconciliation
pub mod payment_reconciler;
pub mod payments;

// Business settings
pub mod settings;
