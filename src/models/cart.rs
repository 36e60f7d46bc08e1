use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Cart snapshot used for validation and settlement.
///
/// Carts are owned by an external cart system; the settlement core only ever
/// reads them. `subtotal` is non-negative by construction (enforced when the
/// cart is created).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Sum of line prices before discounts, as a decimal string.
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "50.00")]
    pub subtotal: Decimal,
    /// Grand total after discounts. Absent when the upstream system does not
    /// track it separately; falls back to the subtotal.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    #[schema(value_type = Option<String>, example = "45.00")]
    pub total: Option<Decimal>,
    /// Aggregate discount amount, when the upstream system reports one.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    #[schema(value_type = Option<String>)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
}

impl Cart {
    /// Amount a completed checkout must settle.
    pub fn grand_total(&self) -> Decimal {
        self.total.unwrap_or(self.subtotal)
    }
}

/// Line item carried only for fraud classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub attributes: Vec<LineItemAttribute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LineItemAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Discount entry as represented by the upstream cart system.
///
/// `applicable` defaults to applied when absent; upstream systems disagree on
/// how they mark discounts, so the validator treats several signals as
/// sufficient.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Discount {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub applicable: Option<bool>,
}
