//! In-memory cart store.
//!
//! Carts belong to an external cart/order system; this store is the
//! placeholder boundary the settlement flow reads from. Concurrent checkout
//! sessions only ever touch their own cart entry.

use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Cart, Discount, LineItem};

#[derive(Debug, Default)]
pub struct CartInput {
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub total: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub discounts: Vec<Discount>,
}

pub struct CartService {
    carts: DashMap<String, Cart>,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            carts: DashMap::new(),
            event_sender,
        }
    }

    /// Creates a cart and returns the stored snapshot.
    pub async fn create_cart(&self, input: CartInput) -> Result<Cart, ServiceError> {
        if input.subtotal < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Cart subtotal must not be negative".to_string(),
            ));
        }
        if input.total.is_some_and(|total| total < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Cart total must not be negative".to_string(),
            ));
        }

        let cart = Cart {
            id: format!("cart-{}", Uuid::new_v4()),
            items: input.items,
            subtotal: input.subtotal,
            total: input.total,
            discount_amount: input.discount_amount,
            discounts: input.discounts,
        };

        self.carts.insert(cart.id.clone(), cart.clone());
        self.event_sender
            .send(Event::CartCreated {
                cart_id: cart.id.clone(),
            })
            .await;

        Ok(cart)
    }

    /// Fetches a cart snapshot by id.
    pub fn get_cart(&self, cart_id: &str) -> Result<Cart, ServiceError> {
        self.carts
            .get(cart_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))
    }
}
