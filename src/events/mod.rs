use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Checkout lifecycle events emitted by the services layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartCreated {
        cart_id: String,
    },
    GiftCardApplied {
        cart_id: String,
        code: String,
        applied_amount: Decimal,
    },
    GiftCardDebited {
        cart_id: String,
        gift_card_id: String,
        transaction_id: String,
        amount: Decimal,
    },
    GiftCardVoided {
        cart_id: String,
        gift_card_id: String,
        transaction_id: String,
        original_transaction_id: String,
        amount: Decimal,
    },
    GiftCardVoidFailed {
        cart_id: String,
        gift_card_id: String,
        original_transaction_id: String,
        amount: Decimal,
        reason: String,
    },
    PaymentCaptured {
        cart_id: String,
        amount: Decimal,
    },
    PaymentDeclined {
        cart_id: String,
        amount: Decimal,
    },
    CheckoutCompleted {
        cart_id: String,
        order_id: String,
        total: Decimal,
    },
    CheckoutFailed {
        cart_id: String,
        reason: String,
    },
}

/// Cloneable handle for emitting events into the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. A full or closed channel is logged and
    /// otherwise ignored: event delivery must never fail a checkout.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!("Failed to enqueue event: {}", err);
        }
    }
}

/// Background worker that drains the event channel.
///
/// Order confirmations and transaction bookkeeping are owned by external
/// systems; here the events are surfaced as structured logs.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::GiftCardVoidFailed {
                cart_id,
                gift_card_id,
                original_transaction_id,
                amount,
                reason,
            } => {
                // Surfaced loudly: a failed void means a balance was not
                // restored and needs manual reconciliation.
                warn!(
                    %cart_id,
                    %gift_card_id,
                    %original_transaction_id,
                    %amount,
                    %reason,
                    "gift card void failed; balance requires manual reconciliation"
                );
            }
            other => {
                info!(event = ?other, "checkout event");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}
