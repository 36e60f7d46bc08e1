use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tenant/channel/location attribution attached to gift card transactions.
///
/// The field names are the remote service's wire format (camelCase) and are
/// passed through unchanged in API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(default)]
    pub source_tenant_id: String,
    #[serde(default)]
    pub source_channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location_id: Option<String>,
}

/// Gift card record as returned by the remote service.
///
/// The balance is kept verbatim as reported; parsing and range checks are the
/// validator's job, so a malformed balance surfaces as a validation failure
/// rather than a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiftCard {
    #[serde(default)]
    pub id: Option<String>,
    pub code: String,
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub source_info: Option<SourceInfo>,
}

/// Checkout-session-scoped record of a gift card accepted for settlement.
///
/// Produced by the apply flow and echoed back by the client when completing
/// checkout; re-validated against the authoritative cart at completion time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppliedGiftCard {
    pub code: String,
    pub gift_card_id: String,
    /// `min(balance, cart total)`, rounded to two decimal places.
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "20.00")]
    pub applied_amount: Decimal,
    #[serde(default)]
    pub source_info: Option<SourceInfo>,
}

/// Direction of a balance mutation at the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Redeem,
    Void,
    Manual,
}

/// Ephemeral result of a balance mutation; correlates a debit with its
/// compensating void. Never persisted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GiftCardTransaction {
    pub transaction_id: String,
    pub kind: TransactionKind,
    pub idempotency_key: String,
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String)]
    pub amount: Decimal,
}
