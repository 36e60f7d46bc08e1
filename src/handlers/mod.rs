pub mod carts;
pub mod checkout;
pub mod common;
pub mod gift_cards;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::idempotency::IdempotencyKeyIssuer;
use crate::services::carts::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::gift_cards::{GiftCardApiConfig, GiftCardService};
use crate::services::payments::{PaymentProcessor, SimulatedPaymentProcessor};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub gift_cards: Arc<GiftCardService>,
    pub checkout: Arc<CheckoutService>,
    pub checkout_guard: Arc<checkout::CheckoutGuard>,
}

impl AppServices {
    /// Builds the service container with the simulated secondary payment
    /// processor configured from the application config.
    pub fn from_config(
        config: &AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let payments = Arc::new(SimulatedPaymentProcessor::from_app_config(config));
        Self::with_payment_processor(config, event_sender, payments)
    }

    /// Builds the service container around an explicit payment processor
    /// (integration tests inject a scripted one here).
    pub fn with_payment_processor(
        config: &AppConfig,
        event_sender: EventSender,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Result<Self, ServiceError> {
        let carts = Arc::new(CartService::new(event_sender.clone()));
        let gift_cards = Arc::new(GiftCardService::new(GiftCardApiConfig::from_app_config(
            config,
        ))?);
        let checkout = Arc::new(CheckoutService::new(
            carts.clone(),
            gift_cards.clone(),
            payments,
            Arc::new(IdempotencyKeyIssuer::new()),
            event_sender,
            config.default_source_info(),
        ));

        Ok(Self {
            carts,
            gift_cards,
            checkout,
            checkout_guard: Arc::new(checkout::CheckoutGuard::new()),
        })
    }
}
