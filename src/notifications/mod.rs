use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::OrderStatus;

/// Real-time events pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    #[serde(rename_all = "camelCase")]
    OrderClaimed {
        order_id: Uuid,
        user_id: String,
        profile_id: Option<Uuid>,
        status: OrderStatus,
        eta: String,
        claimed_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    OrderUpdated {
        order_id: Uuid,
        status: OrderStatus,
        eta: String,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::OrderClaimed { order_id, .. } | OrderEvent::OrderUpdated { order_id, .. } => {
                *order_id
            }
        }
    }
}

/// Destination of dispatched events (a websocket hub, a push service, ...).
#[async_trait]
pub trait OrderEventSink: Send + Sync {
    async fn deliver(&self, event: OrderEvent) -> Result<(), String>;
}

/// Fire-and-forget publisher backed by a bounded channel.
///
/// `publish` never awaits: when the queue is full or the worker is gone the
/// event is dropped with a warning.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<OrderEvent>,
}

impl NotificationDispatcher {
    pub fn new(sender: mpsc::Sender<OrderEvent>) -> Self {
        Self { sender }
    }

    /// Creates a dispatcher together with the receiver its worker drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OrderEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }

    pub fn publish(&self, event: OrderEvent) {
        let order_id = event.order_id();
        match self.sender.try_send(event) {
            Ok(()) => {
                counter!("delivery_orders.notifications.enqueued", 1);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!("delivery_orders.notifications.dropped", 1);
                warn!(order_id = %order_id, "notification queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                counter!("delivery_orders.notifications.dropped", 1);
                warn!(order_id = %order_id, "notification worker stopped, dropping event");
            }
        }
    }
}

/// In-process pub/sub hub. Transports call [`BroadcastHub::subscribe`] and
/// forward whatever they receive to their clients.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<OrderEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl OrderEventSink for BroadcastHub {
    async fn deliver(&self, event: OrderEvent) -> Result<(), String> {
        // no subscribers is not an error, nobody is watching yet
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(receivers, "event broadcast");
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }
}

/// Drains the dispatcher queue into `sink` until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<OrderEvent>, sink: Arc<dyn OrderEventSink>) {
    info!("Starting notification processing loop");
    while let Some(event) = rx.recv().await {
        let order_id = event.order_id();
        if let Err(e) = sink.deliver(event).await {
            warn!(order_id = %order_id, error = %e, "failed to deliver notification");
        }
    }
    info!("Notification processing loop stopped");
}
