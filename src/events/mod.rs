use crate::entities::{DeliveryStatus, PurchaseOrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Capacity of the in-process event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// Domain events emitted after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        supplier_id: Uuid,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: PurchaseOrderStatus,
        new_status: PurchaseOrderStatus,
    },
    DeliveryCreated {
        delivery_id: Uuid,
        order_id: Uuid,
        driver_id: Option<Uuid>,
    },
    DeliveryStatusChanged {
        delivery_id: Uuid,
        order_id: Uuid,
        old_status: DeliveryStatus,
        new_status: DeliveryStatus,
    },
    StockAdjusted {
        product_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::DeliveryCreated { .. } => "delivery_created",
            Event::DeliveryStatusChanged { .. } => "delivery_status_changed",
            Event::StockAdjusted { .. } => "stock_adjusted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs a failure instead of returning it.
    pub async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Drains the channel and logs every event. Ends when all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                supplier_id,
                total_amount,
            } => info!(%order_id, %supplier_id, %total_amount, "purchase order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, from = %old_status, to = %new_status, "purchase order status changed"),
            Event::DeliveryCreated {
                delivery_id,
                order_id,
                driver_id,
            } => info!(%delivery_id, %order_id, driver_id = ?driver_id, "delivery created"),
            Event::DeliveryStatusChanged {
                delivery_id,
                order_id,
                old_status,
                new_status,
            } => info!(%delivery_id, %order_id, from = %old_status, to = %new_status, "delivery status changed"),
            Event::StockAdjusted {
                product_id,
                old_quantity,
                new_quantity,
            } => info!(%product_id, old_quantity, new_quantity, "stock adjusted"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (sender, mut rx) = EventSender::channel(4);
        let event = Event::StockAdjusted {
            product_id: Uuid::new_v4(),
            old_quantity: 3,
            new_quantity: 10,
        };
        sender.publish(event.clone()).await;
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn publish_after_receiver_dropped_does_not_fail() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert!(sender
            .send(Event::DeliveryCreated {
                delivery_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                driver_id: None,
            })
            .await
            .is_err());
        sender
            .publish(Event::DeliveryCreated {
                delivery_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                driver_id: None,
            })
            .await;
    }

    #[tokio::test]
    async fn processor_stops_when_senders_drop() {
        let (sender, rx) = EventSender::channel(2);
        let handle = tokio::spawn(process_events(rx));
        sender
            .publish(Event::OrderStatusChanged {
                order_id: Uuid::new_v4(),
                old_status: PurchaseOrderStatus::Pending,
                new_status: PurchaseOrderStatus::Confirmed,
            })
            .await;
        drop(sender);
        handle.await.unwrap();
    }
}
