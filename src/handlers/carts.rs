use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::{Cart, Discount, LineItem};
use crate::services::carts::CartInput;
use crate::ApiResponse;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/{cart_id}", get(get_cart))
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "items": [{"title": "Espresso Machine", "tags": ["kitchen"], "product_type": "Appliance"}],
    "subtotal": "50.00"
}))]
pub struct CreateCartRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Sum of line prices before discounts, as a decimal string. Defaults to
    /// zero for an empty snapshot.
    #[serde(default, with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "50.00")]
    pub subtotal: Decimal,
    /// Grand total after discounts, when tracked separately
    #[serde(default, with = "rust_decimal::serde::str_option")]
    #[schema(value_type = Option<String>)]
    pub total: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    #[schema(value_type = Option<String>)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
}

/// Create a cart
///
/// Placeholder for an external cart system: accepts a cart snapshot and
/// stores it for the duration of the checkout session.
#[utoipa::path(
    post,
    path = "/api/v1/carts",
    request_body = CreateCartRequest,
    responses(
        (status = 201, description = "Cart created", body = crate::ApiResponse<Cart>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    Json(request): Json<CreateCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Cart>>), ServiceError> {
    let cart = state
        .services
        .carts
        .create_cart(CartInput {
            items: request.items,
            subtotal: request.subtotal,
            total: request.total,
            discount_amount: request.discount_amount,
            discounts: request.discounts,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(cart))))
}

/// Get cart by ID
#[utoipa::path(
    get,
    path = "/api/v1/carts/{cart_id}",
    params(
        ("cart_id" = String, Path, description = "Cart ID")
    ),
    responses(
        (status = 200, description = "Cart details", body = crate::ApiResponse<Cart>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<ApiResponse<Cart>>, ServiceError> {
    let cart = state.services.carts.get_cart(&cart_id)?;
    Ok(Json(ApiResponse::success(cart)))
}
