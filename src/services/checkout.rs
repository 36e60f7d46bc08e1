//! Checkout orchestration: gift card application and settlement.
//!
//! Settlement runs validation, then the gift card debit, then the secondary
//! charge, then confirmation.
//! The ordering is a correctness requirement, not an optimization target: the
//! debit must complete before the charge is attempted, and the charge outcome
//! must be known before any compensation decision. Once a debit has been
//! issued the flow always runs to a terminal state; an abandoned debit is
//! lost money.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::idempotency::IdempotencyKeyIssuer;
use crate::models::{AppliedGiftCard, Cart, SourceInfo};
use crate::services::carts::CartService;
use crate::services::gift_cards::{
    CreditRequest, DebitRequest, GiftCardService, RedeemOptions, VoidOptions,
};
use crate::services::payments::{PaymentData, PaymentProcessor};
use crate::services::validation;

/// Input for completing a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub cart_id: String,
    pub gift_card: Option<AppliedGiftCard>,
    pub payment: Option<PaymentData>,
}

/// Confirmation emitted on a completed checkout. Order persistence is owned
/// by an external order system.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "50.00")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "20.00")]
    pub gift_card_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "30.00")]
    pub charged_amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// Rounds to two fractional digits and pins the scale, so money amounts
/// always render as "0.00"-style strings at the boundary.
fn two_dp(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

/// A debit that has been committed at the gift card service and may need to
/// be reversed.
struct DebitedGiftCard {
    applied: AppliedGiftCard,
    transaction_id: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<CartService>,
    gift_cards: Arc<GiftCardService>,
    payments: Arc<dyn PaymentProcessor>,
    keys: Arc<IdempotencyKeyIssuer>,
    event_sender: EventSender,
    default_source_info: SourceInfo,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<CartService>,
        gift_cards: Arc<GiftCardService>,
        payments: Arc<dyn PaymentProcessor>,
        keys: Arc<IdempotencyKeyIssuer>,
        event_sender: EventSender,
        default_source_info: SourceInfo,
    ) -> Self {
        Self {
            carts,
            gift_cards,
            payments,
            keys,
            event_sender,
            default_source_info,
        }
    }

    /// Applies a gift card to a cart: lookup, fraud and balance checks, then
    /// the applied amount `min(balance, cart total)` rounded to two decimals.
    ///
    /// Read-only against the remote service; the balance is not reserved
    /// until checkout completion debits it.
    #[instrument(skip(self))]
    pub async fn apply_gift_card(
        &self,
        cart_id: &str,
        code: &str,
    ) -> Result<AppliedGiftCard, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Gift card code is required".to_string(),
            ));
        }

        let cart = self.carts.get_cart(cart_id)?;
        let card = self.gift_cards.lookup(code).await?;
        let balance = validation::validate_application(&cart, &card)?;

        let gift_card_id = card
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::GiftCardServiceError(
                    "gift card record is missing an id".to_string(),
                )
            })?;

        let applied_amount = two_dp(balance.min(cart.grand_total()));
        let applied = AppliedGiftCard {
            code: card.code,
            gift_card_id,
            applied_amount,
            source_info: card
                .source_info
                .or_else(|| Some(self.default_source_info.clone())),
        };

        info!(
            cart_id = %cart.id,
            code = %applied.code,
            applied_amount = %applied.applied_amount,
            "gift card applied"
        );
        self.event_sender
            .send(Event::GiftCardApplied {
                cart_id: cart.id,
                code: applied.code.clone(),
                applied_amount: applied.applied_amount,
            })
            .await;

        Ok(applied)
    }

    /// Completes a checkout: optional gift card debit, secondary charge for
    /// the remainder, and a compensating credit if anything fails after the
    /// debit committed.
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    pub async fn complete_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<OrderConfirmation, ServiceError> {
        let cart = self.carts.get_cart(&request.cart_id)?;
        let total = two_dp(cart.grand_total());

        // The applied record is client-supplied; check it against the
        // authoritative cart before moving any money.
        let applied = match request.gift_card {
            Some(gift_card) => Some(self.revalidate_application(&cart, gift_card)?),
            None => None,
        };

        let gift_card_amount = applied
            .as_ref()
            .map(|g| g.applied_amount)
            .unwrap_or(Decimal::ZERO);
        if total - gift_card_amount > Decimal::ZERO && request.payment.is_none() {
            // Rejected before the debit: completing without charging the
            // remainder would ship goods for free, and failing later would
            // force a needless compensation round-trip.
            return Err(ServiceError::ValidationError(
                "Payment data is required when the gift card does not cover the cart total"
                    .to_string(),
            ));
        }

        let mut debited: Option<DebitedGiftCard> = None;
        match self
            .settle(&cart, total, applied, request.payment, &mut debited)
            .await
        {
            Ok(confirmation) => {
                info!(
                    cart_id = %cart.id,
                    order_id = %confirmation.order_id,
                    total = %confirmation.total,
                    "checkout completed"
                );
                self.event_sender
                    .send(Event::CheckoutCompleted {
                        cart_id: cart.id,
                        order_id: confirmation.order_id.clone(),
                        total: confirmation.total,
                    })
                    .await;
                Ok(confirmation)
            }
            Err(err) => {
                // Exactly one compensation attempt for whatever failed after
                // the debit committed; nothing to undo otherwise.
                let err = match debited.take() {
                    Some(debit) => self.compensate(&cart.id, debit, err).await,
                    None => err,
                };
                self.event_sender
                    .send(Event::CheckoutFailed {
                        cart_id: cart.id,
                        reason: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Runs the happy path. Leaves a record of any committed debit in
    /// `debited` so the caller can compensate when a later step fails.
    async fn settle(
        &self,
        cart: &Cart,
        total: Decimal,
        applied: Option<AppliedGiftCard>,
        payment: Option<PaymentData>,
        debited: &mut Option<DebitedGiftCard>,
    ) -> Result<OrderConfirmation, ServiceError> {
        let mut gift_card_amount = Decimal::ZERO;

        if let Some(applied) = applied {
            if applied.applied_amount > Decimal::ZERO {
                let idempotency_key = self.keys.issue();
                let transaction = self
                    .gift_cards
                    .debit(DebitRequest {
                        gift_card_id: applied.gift_card_id.clone(),
                        amount: applied.applied_amount,
                        idempotency_key,
                        source_info: self.source_info_for(&applied),
                        redeem_options: RedeemOptions {
                            order_id: cart.id.clone(),
                            liability: false,
                            total_price: total,
                            order_number: Some(cart.id.clone()),
                        },
                    })
                    .await?;

                gift_card_amount = applied.applied_amount;
                info!(
                    cart_id = %cart.id,
                    gift_card_id = %applied.gift_card_id,
                    transaction_id = %transaction.transaction_id,
                    amount = %gift_card_amount,
                    "gift card debited"
                );
                self.event_sender
                    .send(Event::GiftCardDebited {
                        cart_id: cart.id.clone(),
                        gift_card_id: applied.gift_card_id.clone(),
                        transaction_id: transaction.transaction_id.clone(),
                        amount: gift_card_amount,
                    })
                    .await;
                *debited = Some(DebitedGiftCard {
                    applied,
                    transaction_id: transaction.transaction_id,
                });
            }
        }

        let remaining = two_dp(total - gift_card_amount);
        let mut charged_amount = Decimal::ZERO;

        if remaining > Decimal::ZERO {
            let payment = payment.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Payment data is required when the gift card does not cover the cart total"
                        .to_string(),
                )
            })?;

            let captured = self.payments.charge(&payment, remaining).await?;
            if !captured {
                self.event_sender
                    .send(Event::PaymentDeclined {
                        cart_id: cart.id.clone(),
                        amount: remaining,
                    })
                    .await;
                return Err(ServiceError::PaymentFailed("Payment failed.".to_string()));
            }

            charged_amount = remaining;
            self.event_sender
                .send(Event::PaymentCaptured {
                    cart_id: cart.id.clone(),
                    amount: remaining,
                })
                .await;
        }

        Ok(OrderConfirmation {
            order_id: format!("order-{}", Uuid::new_v4()),
            order_number: format!(
                "ORD-{}",
                Uuid::new_v4().simple().to_string()[..8].to_uppercase()
            ),
            total,
            gift_card_amount: two_dp(gift_card_amount),
            charged_amount: two_dp(charged_amount),
            completed_at: Utc::now(),
        })
    }

    /// Issues the compensating credit for a committed debit and returns the
    /// error the caller should surface.
    ///
    /// The credit gets a fresh idempotency key: the remote service would
    /// dedupe a reused one into the original debit's operation. A failed
    /// credit is logged and reported as an event, never allowed to mask the
    /// original failure. The voided note is appended unconditionally so the
    /// caller sees one coherent message either way.
    async fn compensate(
        &self,
        cart_id: &str,
        debit: DebitedGiftCard,
        original: ServiceError,
    ) -> ServiceError {
        let idempotency_key = self.keys.issue();
        let result = self
            .gift_cards
            .credit(CreditRequest {
                gift_card_id: debit.applied.gift_card_id.clone(),
                amount: debit.applied.applied_amount,
                idempotency_key,
                source_info: self.source_info_for(&debit.applied),
                void_options: VoidOptions {
                    transaction_id: debit.transaction_id.clone(),
                },
            })
            .await;

        match result {
            Ok(void_transaction) => {
                info!(
                    %cart_id,
                    gift_card_id = %debit.applied.gift_card_id,
                    original_transaction_id = %debit.transaction_id,
                    void_transaction_id = %void_transaction.transaction_id,
                    "gift card debit voided after failed checkout"
                );
                self.event_sender
                    .send(Event::GiftCardVoided {
                        cart_id: cart_id.to_string(),
                        gift_card_id: debit.applied.gift_card_id.clone(),
                        transaction_id: void_transaction.transaction_id,
                        original_transaction_id: debit.transaction_id,
                        amount: debit.applied.applied_amount,
                    })
                    .await;
            }
            Err(void_err) => {
                let compensation_err =
                    ServiceError::CompensationError(void_err.to_string());
                error!(
                    %cart_id,
                    gift_card_id = %debit.applied.gift_card_id,
                    original_transaction_id = %debit.transaction_id,
                    error = %compensation_err,
                    "compensating credit failed; original failure still surfaces"
                );
                self.event_sender
                    .send(Event::GiftCardVoidFailed {
                        cart_id: cart_id.to_string(),
                        gift_card_id: debit.applied.gift_card_id.clone(),
                        original_transaction_id: debit.transaction_id,
                        amount: debit.applied.applied_amount,
                        reason: compensation_err.to_string(),
                    })
                    .await;
            }
        }

        original.with_voided_note()
    }

    /// Re-validates a client-echoed application against the authoritative
    /// cart. Stale or tampered records are rejected rather than clamped so
    /// the client re-applies against current totals.
    fn revalidate_application(
        &self,
        cart: &Cart,
        gift_card: AppliedGiftCard,
    ) -> Result<AppliedGiftCard, ServiceError> {
        if gift_card.gift_card_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Applied gift card is missing its id".to_string(),
            ));
        }

        let applied_amount = two_dp(gift_card.applied_amount);
        if applied_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Applied gift card amount must not be negative".to_string(),
            ));
        }
        if applied_amount > two_dp(cart.grand_total()) {
            return Err(ServiceError::ValidationError(
                "Applied gift card amount exceeds the current cart total; re-apply the gift card"
                    .to_string(),
            ));
        }

        Ok(AppliedGiftCard {
            applied_amount,
            ..gift_card
        })
    }

    fn source_info_for(&self, applied: &AppliedGiftCard) -> SourceInfo {
        applied
            .source_info
            .clone()
            .unwrap_or_else(|| self.default_source_info.clone())
    }
}
