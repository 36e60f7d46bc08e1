//! Fraud and balance checks applied before a gift card is accepted for a
//! cart.
//!
//! The product-detection heuristics are deliberately substring-based rather
//! than a strict product-type enum: upstream catalogs tag gift card products
//! inconsistently, and a false positive only blocks one redemption path.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::models::{Cart, GiftCard, LineItem};

/// Outcome of classifying a cart for gift card eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSignals {
    pub contains_gift_card_product: bool,
    pub has_discount: bool,
}

/// Inspects a cart for the two signals that block gift card redemption.
pub fn classify_cart(cart: &Cart) -> CartSignals {
    CartSignals {
        contains_gift_card_product: cart.items.iter().any(item_is_gift_card),
        has_discount: cart_has_discounts(cart),
    }
}

fn item_is_gift_card(item: &LineItem) -> bool {
    let tag_match = item.tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        tag.contains("gift") || tag.contains("giftcard")
    });
    if tag_match {
        return true;
    }

    if item
        .product_type
        .as_deref()
        .is_some_and(|pt| pt.to_lowercase().contains("gift"))
    {
        return true;
    }

    if item.title.as_deref().is_some_and(|title| {
        let title = title.to_lowercase();
        title.contains("gift card") || title.contains("giftcard")
    }) {
        return true;
    }

    item.attributes.iter().any(|attr| {
        attr.key
            .as_deref()
            .is_some_and(|k| k.to_lowercase().contains("gift"))
            || attr
                .value
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains("gift"))
    })
}

/// True when any of three independent signals marks the cart as discounted.
/// Upstream systems represent "discount applied" inconsistently, so any one
/// signal is sufficient.
fn cart_has_discounts(cart: &Cart) -> bool {
    let has_discount_codes = cart
        .discounts
        .iter()
        .any(|discount| discount.applicable != Some(false));

    let has_discount_amount = cart
        .discount_amount
        .is_some_and(|amount| amount > Decimal::ZERO);

    let subtotal_exceeds_total = cart.subtotal > cart.grand_total();

    has_discount_codes || has_discount_amount || subtotal_exceeds_total
}

/// Parses the balance string the gift card service reports.
pub fn parse_balance(balance: &str) -> Option<Decimal> {
    Decimal::from_str(balance.trim()).ok()
}

/// Validates that `gift_card` may be applied to `cart`, returning the parsed
/// balance on success.
///
/// The rule order is a fixed tie-break: discount check, then
/// gift-card-in-cart, then balance. The first failing rule wins and only one
/// reason is ever reported.
pub fn validate_application(cart: &Cart, gift_card: &GiftCard) -> Result<Decimal, ServiceError> {
    let signals = classify_cart(cart);

    if signals.has_discount {
        return Err(ServiceError::FraudRejected(
            "Cannot purchase a gift card with a discount.".to_string(),
        ));
    }

    if signals.contains_gift_card_product {
        return Err(ServiceError::FraudRejected(
            "Cannot purchase a gift card with a gift card.".to_string(),
        ));
    }

    let balance = parse_balance(&gift_card.balance).ok_or_else(|| {
        ServiceError::ValidationError("Invalid gift card balance".to_string())
    })?;

    if balance <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Gift card has no balance".to_string(),
        ));
    }

    Ok(balance)
}
