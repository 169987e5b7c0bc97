//! Pricing a cart into a pending order.

use std::collections::HashMap;

use common::{OrderId, ProductId, UserId};

use super::{Order, OrderItem, OrderStatus};
use crate::cart::Cart;
use crate::error::DomainError;
use crate::money::Money;
use crate::product::Product;

/// A priced, pending order that has not been persisted.
///
/// Items are priced from the catalog's `Product` records, never from the
/// caller's quoted prices. The draft resolves to exactly one terminal order
/// through [`OrderDraft::confirm`] or [`OrderDraft::fail`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    order: Order,
    items: Vec<OrderItem>,
}

impl OrderDraft {
    /// Prices `cart` against authoritative `products`.
    pub fn price(
        order_id: OrderId,
        user_id: UserId,
        cart: &Cart,
        products: &HashMap<ProductId, Product>,
        location: serde_json::Value,
    ) -> Result<Self, DomainError> {
        if location.is_null() {
            return Err(DomainError::MissingLocation);
        }

        let mut items = Vec::with_capacity(cart.len());
        let mut total = Money::zero();
        for line in cart.lines() {
            let product = products
                .get(&line.product_id)
                .ok_or(DomainError::MissingProduct(line.product_id))?;
            let item = OrderItem::new(order_id, product.id, line.quantity, product.unit_price)?;
            total = total
                .checked_add(item.subtotal)
                .ok_or(DomainError::AmountOverflow)?;
            items.push(item);
        }

        Ok(Self {
            order: Order::pending(order_id, user_id, total, location),
            items,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order.id
    }

    pub fn total(&self) -> Money {
        self.order.total_price
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Resolves the draft to a confirmed order with its items.
    pub fn confirm(self) -> Result<(Order, Vec<OrderItem>), DomainError> {
        let mut order = self.order;
        order.transition_to(OrderStatus::Confirmed)?;
        Ok((order, self.items))
    }

    /// Resolves the draft to a failed order. Items are discarded.
    pub fn fail(self) -> Result<Order, DomainError> {
        let mut order = self.order;
        order.transition_to(OrderStatus::Failed)?;
        Ok(order)
    }
}
