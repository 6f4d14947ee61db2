use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Events emitted by the transaction core after a successful commit.
///
/// Sending is best-effort: a full or closed channel is logged and never
/// fails the operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i64,
        branch_id: i64,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: i64,
        old_status: String,
        new_status: String,
    },
    PurchaseCreated {
        purchase_id: i64,
        branch_id: i64,
        total: Decimal,
    },
    StockSet {
        branch_id: i64,
        product_id: i64,
        quantity: i32,
        minimum: i32,
    },
    /// A debit left a ledger entry at or below its reorder threshold.
    StockBelowMinimum {
        branch_id: i64,
        product_id: i64,
        available: i32,
        minimum: i32,
    },
    CartUpdated {
        customer_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Delivers without blocking. A full or closed channel is an error
    /// for the caller to log; it must never stall a request that has
    /// already committed.
    pub fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .try_send(event)
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events from the channel and logs them. Runs until every
/// sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockBelowMinimum {
                branch_id,
                product_id,
                available,
                minimum,
            } => {
                warn!(
                    branch_id,
                    product_id, available, minimum, "Stock at or below reorder threshold"
                );
            }
            other => {
                info!(event = ?other, "Processing event");
            }
        }
    }
    info!("Event channel closed; event processor shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        drop(rx);

        let result = sender.send(Event::CartUpdated { customer_id: 1 });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_the_event_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);

        sender.send(Event::CartUpdated { customer_id: 1 }).unwrap();
        let result = sender.send(Event::CartUpdated { customer_id: 2 });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn processor_drains_the_channel() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let handle = tokio::spawn(process_events(rx));

        sender
            .send(Event::StockSet {
                branch_id: 1,
                product_id: 7,
                quantity: 10,
                minimum: 2,
            })
            .unwrap();

        drop(sender);
        handle.await.unwrap();
    }
}
