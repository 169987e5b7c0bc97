//! Order entities.

use chrono::{DateTime, Utc};
use common::{HistoryEventId, OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::error::DomainError;
use crate::money::Money;

/// A placed order.
///
/// `total_price` always equals the sum of the order's item subtotals. Failed
/// orders keep the total that was offered for payment but carry no items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    /// Delivery location as supplied by the client.
    pub location: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order.
    pub fn pending(
        id: OrderId,
        user_id: UserId,
        total_price: Money,
        location: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            total_price,
            status: OrderStatus::Pending,
            location,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `next`, enforcing the status state machine.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A line of a placed order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price copied from the catalog at purchase time.
    pub unit_price: Money,
    /// `quantity * unit_price`.
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Creates an order item, computing its subtotal.
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        let subtotal = unit_price
            .checked_multiply(quantity)
            .ok_or(DomainError::AmountOverflow)?;

        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
            unit_price,
            subtotal,
            created_at: Utc::now(),
        })
    }
}

/// One entry in an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistoryEvent {
    pub id: HistoryEventId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

impl OrderHistoryEvent {
    /// Creates a history event stamped with the current time.
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            id: HistoryEventId::new(),
            order_id,
            status,
            changed_at: Utc::now(),
        }
    }
}
