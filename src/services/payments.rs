//! Secondary payment processing seam.
//!
//! The settlement flow only needs a boolean charge outcome; everything else
//! about card processing lives behind a real processor integration that this
//! service does not ship. `SimulatedPaymentProcessor` stands in for one with
//! configurable latency and approval rate.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Card data submitted by the client for the remainder charge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentData {
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub cardholder_name: Option<String>,
    /// Tokenized payment reference from the front end, when one exists.
    #[serde(default)]
    pub token: Option<String>,
}

impl PaymentData {
    /// First four digits followed by a mask, safe for logs.
    pub fn masked_card_number(&self) -> String {
        match self.card_number.as_deref() {
            Some(number) if number.len() >= 4 => format!("{}****", &number[..4]),
            Some(_) => "****".to_string(),
            None => "<token>".to_string(),
        }
    }
}

/// Charges the remainder of a checkout after gift card redemption.
///
/// Returns `Ok(true)` on capture, `Ok(false)` on decline. An `Err` means the
/// processor itself failed; callers treat both non-`Ok(true)` outcomes as a
/// failed charge.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn charge(&self, payment: &PaymentData, amount: Decimal) -> Result<bool, ServiceError>;
}

/// Stand-in processor that sleeps for a configured latency and approves a
/// configurable fraction of charges.
pub struct SimulatedPaymentProcessor {
    approval_rate: f64,
    latency: Duration,
}

impl SimulatedPaymentProcessor {
    pub fn new(approval_rate: f64, latency: Duration) -> Self {
        Self {
            approval_rate: approval_rate.clamp(0.0, 1.0),
            latency,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.payment_approval_rate,
            Duration::from_millis(config.payment_latency_ms),
        )
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn charge(&self, payment: &PaymentData, amount: Decimal) -> Result<bool, ServiceError> {
        info!(
            %amount,
            card = %payment.masked_card_number(),
            "processing simulated card charge"
        );

        tokio::time::sleep(self.latency).await;

        let approved = rand::thread_rng().gen_bool(self.approval_rate);
        Ok(approved)
    }
}
