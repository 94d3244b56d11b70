use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    gateway::PaymentGateway,
    models::{transaction::STATUS_APPROVED, NewTransaction, OrderStatus},
    notifications::{NotificationDispatcher, OrderEvent},
    repositories::Repositories,
    webhooks::{Notification, NotificationTopic},
};

const MERCHANT_ORDER_CLOSED: &str = "closed";

/// What a notification amounted to. Only `Confirmed` changed anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Confirmed { order_id: Uuid },
    NotApproved,
    MissingOrderReference,
    OrderNotFound,
    AlreadyProcessed,
    Failed,
}

/// Approved payment resolved from a gateway resource.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedPayment {
    order_reference: Option<String>,
    amount: Decimal,
    gateway_payment_id: Option<String>,
}

/// Applies asynchronous gateway notifications to orders.
///
/// The only promotion out of CREATED is the status-conditioned update, so
/// duplicated or concurrent deliveries for the same payment confirm the order
/// (and append a ledger row) at most once.
#[derive(Clone)]
pub struct PaymentReconciler {
    repos: Repositories,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: NotificationDispatcher,
    currency: String,
}

impl PaymentReconciler {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: NotificationDispatcher,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            repos,
            gateway,
            dispatcher,
            currency: currency.into(),
        }
    }

    /// Never fails: the gateway must always get its acknowledgment, so every
    /// error is logged and absorbed here.
    #[instrument(skip(self), fields(topic = %notification.topic, resource_id = %notification.resource_id))]
    pub async fn handle_notification(&self, notification: Notification) -> ReconcileOutcome {
        counter!("delivery_orders.webhooks.received", 1);
        let outcome = match self.reconcile(&notification).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "payment notification processing failed");
                ReconcileOutcome::Failed
            }
        };

        match &outcome {
            ReconcileOutcome::Confirmed { order_id } => {
                counter!("delivery_orders.webhooks.confirmed", 1);
                info!(order_id = %order_id, "order confirmed from payment notification");
            }
            ReconcileOutcome::Failed => {
                counter!("delivery_orders.webhooks.failed", 1);
            }
            other => {
                counter!("delivery_orders.webhooks.ignored", 1);
                debug!(outcome = ?other, "payment notification ignored");
            }
        }
        outcome
    }

    async fn reconcile(&self, notification: &Notification) -> Result<ReconcileOutcome, ServiceError> {
        let resolved = match notification.topic {
            NotificationTopic::Payment => self.resolve_payment(&notification.resource_id).await?,
            NotificationTopic::MerchantOrder => {
                self.resolve_merchant_order(&notification.resource_id).await?
            }
        };
        let Some(resolved) = resolved else {
            return Ok(ReconcileOutcome::NotApproved);
        };

        let Some(order_id) = resolved
            .order_reference
            .as_deref()
            .and_then(|reference| Uuid::parse_str(reference.trim()).ok())
        else {
            warn!(reference = ?resolved.order_reference, "approved payment without a usable order reference");
            return Ok(ReconcileOutcome::MissingOrderReference);
        };

        let Some(order) = self.repos.orders.find_by_id(order_id).await? else {
            warn!(order_id = %order_id, "payment notification for unknown order");
            return Ok(ReconcileOutcome::OrderNotFound);
        };

        if order.status != OrderStatus::Created {
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let applied = self
            .repos
            .orders
            .update_status_if_current(order.id, OrderStatus::Created, OrderStatus::Confirmed)
            .await?;
        if !applied {
            // a concurrent delivery or direct charge got there first
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let ledger_entry = NewTransaction {
            order_id: order.id,
            user_id: order.user_id.clone().unwrap_or_default(),
            profile_id: order.profile_id,
            amount: resolved.amount,
            currency: self.currency.clone(),
            status: STATUS_APPROVED.to_string(),
            payment_id: None,
            gateway_payment_id: resolved.gateway_payment_id,
            collector_id: None,
            description: Some(format!("Payment link for order {}", order.id)),
        };
        if let Err(e) = self.repos.transactions.insert(ledger_entry).await {
            // the confirmation stands even without its ledger row
            error!(order_id = %order.id, error = %e, "failed to record confirmed payment");
        }

        self.dispatcher.publish(OrderEvent::OrderUpdated {
            order_id: order.id,
            status: OrderStatus::Confirmed,
            eta: order.eta.clone(),
        });

        Ok(ReconcileOutcome::Confirmed { order_id: order.id })
    }

    async fn resolve_payment(&self, payment_id: &str) -> Result<Option<ResolvedPayment>, ServiceError> {
        let payment = self.gateway.get_payment(payment_id).await?;
        if payment.status != STATUS_APPROVED {
            debug!(status = %payment.status, "payment not approved yet");
            return Ok(None);
        }
        Ok(Some(ResolvedPayment {
            order_reference: payment.external_reference,
            amount: payment.amount,
            gateway_payment_id: Some(payment.id),
        }))
    }

    /// First approved payment wins; a closed merchant order without one is
    /// settled for its total.
    async fn resolve_merchant_order(
        &self,
        merchant_order_id: &str,
    ) -> Result<Option<ResolvedPayment>, ServiceError> {
        let merchant_order = self.gateway.get_merchant_order(merchant_order_id).await?;

        if let Some(payment) = merchant_order
            .payments
            .iter()
            .find(|payment| payment.status == STATUS_APPROVED)
        {
            let amount = if payment.amount.is_zero() {
                merchant_order.total_amount
            } else {
                payment.amount
            };
            return Ok(Some(ResolvedPayment {
                order_reference: merchant_order.external_reference,
                amount,
                gateway_payment_id: Some(payment.id.clone()),
            }));
        }

        if merchant_order.status == MERCHANT_ORDER_CLOSED {
            return Ok(Some(ResolvedPayment {
                order_reference: merchant_order.external_reference,
                amount: merchant_order.total_amount,
                gateway_payment_id: None,
            }));
        }

        debug!(status = %merchant_order.status, "merchant order has no approved payment");
        Ok(None)
    }
}
