use crate::payments::traits::PaymentEventSink;
use crate::payments::types::PaymentEvent;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

/// Fans payment events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<PaymentEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaymentEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PaymentEventSink for BroadcastEventSink {
    fn publish(&self, event: PaymentEvent) {
        if self.sender.send(event).is_err() {
            debug!("No subscribers for payment event");
        }
    }
}
