use std::sync::Arc;

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::validate_input;
use crate::handlers::AppState;
use crate::models::AppliedGiftCard;
use crate::services::checkout::{CheckoutRequest, OrderConfirmation};
use crate::services::payments::PaymentData;
use crate::ApiResponse;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/complete", post(complete_checkout))
}

/// Admission control for checkout completion: at most one in-flight
/// completion per cart.
///
/// This is a caller-side guard, not a settlement invariant; the orchestrator
/// itself runs each session independently. Rejecting the second attempt up
/// front keeps a double-submitted form from racing two debits for the same
/// cart.
#[derive(Debug, Default)]
pub struct CheckoutGuard {
    in_flight: DashMap<String, ()>,
}

impl CheckoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the cart for one completion attempt. The permit releases the
    /// claim when dropped.
    pub fn try_begin(self: Arc<Self>, cart_id: &str) -> Result<CheckoutPermit, ServiceError> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(cart_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(ServiceError::Conflict(format!(
                    "A checkout is already in progress for cart {}",
                    cart_id
                )))
            }
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }
        Ok(CheckoutPermit {
            cart_id: cart_id.to_string(),
            guard: self,
        })
    }
}

#[derive(Debug)]
pub struct CheckoutPermit {
    guard: Arc<CheckoutGuard>,
    cart_id: String,
}

impl Drop for CheckoutPermit {
    fn drop(&mut self) {
        self.guard.in_flight.remove(&self.cart_id);
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "cart_id": "cart-550e8400-e29b-41d4-a716-446655440000",
    "gift_card": {
        "code": "HAPPY50",
        "gift_card_id": "gc-1",
        "applied_amount": "20.00"
    },
    "payment": {"card_number": "4242424242424242"}
}))]
pub struct CompleteCheckoutRequest {
    #[validate(length(min = 1, message = "Cart id is required"))]
    pub cart_id: String,
    /// Application record returned by the apply endpoint, when a gift card
    /// is in play
    #[serde(default)]
    pub gift_card: Option<AppliedGiftCard>,
    /// Card data for the remainder charge
    #[serde(default)]
    pub payment: Option<PaymentData>,
}

/// Complete a checkout
///
/// Debits the applied gift card, charges the remainder, and reverses the
/// debit if the remainder charge fails.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/complete",
    request_body = CompleteCheckoutRequest,
    responses(
        (status = 200, description = "Checkout completed", body = crate::ApiResponse<OrderConfirmation>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Checkout already in progress", body = crate::errors::ErrorResponse),
        (status = 502, description = "Settlement failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn complete_checkout(
    State(state): State<AppState>,
    Json(request): Json<CompleteCheckoutRequest>,
) -> Result<Json<ApiResponse<OrderConfirmation>>, ServiceError> {
    validate_input(&request)?;

    let _permit = state
        .services
        .checkout_guard
        .clone()
        .try_begin(&request.cart_id)?;

    let confirmation = state
        .services
        .checkout
        .complete_checkout(CheckoutRequest {
            cart_id: request.cart_id,
            gift_card: request.gift_card,
            payment: request.payment,
        })
        .await?;

    Ok(Json(ApiResponse::success(confirmation)))
}
