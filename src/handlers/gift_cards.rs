use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::validate_input;
use crate::handlers::AppState;
use crate::models::AppliedGiftCard;
use crate::ApiResponse;

/// Creates the router for gift card endpoints
pub fn gift_cards_routes() -> Router<AppState> {
    Router::new().route("/apply", post(apply_gift_card))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "code": "HAPPY50",
    "cart_id": "cart-550e8400-e29b-41d4-a716-446655440000"
}))]
pub struct ApplyGiftCardRequest {
    /// Gift card code entered by the shopper
    #[validate(length(min = 1, message = "Gift card code is required"))]
    pub code: String,
    /// Cart the gift card should be applied to
    #[validate(length(min = 1, message = "Cart id is required"))]
    pub cart_id: String,
}

/// Apply a gift card to a cart
///
/// Looks the card up at the gift card service, runs fraud and balance checks,
/// and returns the session-scoped application record. No balance is moved
/// until checkout completion.
#[utoipa::path(
    post,
    path = "/api/v1/gift-cards/apply",
    request_body = ApplyGiftCardRequest,
    responses(
        (status = 200, description = "Gift card applied", body = crate::ApiResponse<AppliedGiftCard>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Gift card not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Application rejected", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gift card service failure", body = crate::errors::ErrorResponse)
    ),
    tag = "GiftCards"
)]
pub async fn apply_gift_card(
    State(state): State<AppState>,
    Json(request): Json<ApplyGiftCardRequest>,
) -> Result<Json<ApiResponse<AppliedGiftCard>>, ServiceError> {
    validate_input(&request)?;

    let applied = state
        .services
        .checkout
        .apply_gift_card(&request.cart_id, &request.code)
        .await?;

    Ok(Json(ApiResponse::success(applied)))
}
