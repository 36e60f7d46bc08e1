use utoipa::OpenApi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gift Card Checkout API",
        version = "0.1.0",
        description = r#"
# Gift Card Checkout API

Wires a merchant checkout to a third-party gift card service: apply a gift
card to a cart, settle the checkout by debiting the card and charging the
remainder, and reverse the debit automatically when the remainder charge
fails.

## Error Handling

The API uses a consistent error response format with appropriate HTTP status
codes:

```json
{
  "error": "Bad Gateway",
  "message": "Payment failed. Gift card transaction has been voided.",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
"#,
        contact(name = "Giftcard Checkout Maintainers")
    ),
    paths(
        handlers::carts::create_cart,
        handlers::carts::get_cart,
        handlers::gift_cards::apply_gift_card,
        handlers::checkout::complete_checkout,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::Cart,
        crate::models::LineItem,
        crate::models::LineItemAttribute,
        crate::models::Discount,
        crate::models::GiftCard,
        crate::models::AppliedGiftCard,
        crate::models::SourceInfo,
        crate::models::GiftCardTransaction,
        crate::models::TransactionKind,
        crate::services::checkout::OrderConfirmation,
        crate::services::payments::PaymentData,
        handlers::carts::CreateCartRequest,
        handlers::gift_cards::ApplyGiftCardRequest,
        handlers::checkout::CompleteCheckoutRequest,
    )),
    tags(
        (name = "Carts", description = "Cart placeholder endpoints"),
        (name = "GiftCards", description = "Gift card application"),
        (name = "Checkout", description = "Checkout settlement"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/carts"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/carts/{cart_id}"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/gift-cards/apply"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/checkout/complete"));
    }
}
