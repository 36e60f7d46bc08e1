pub mod cart;
pub mod gift_card;

pub use cart::{Cart, Discount, LineItem, LineItemAttribute};
pub use gift_card::{
    AppliedGiftCard, GiftCard, GiftCardTransaction, SourceInfo, TransactionKind,
};
