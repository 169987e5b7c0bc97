//! Read side for placed orders.

use common::{OrderId, UserId};
use domain::{Order, OrderHistoryEvent, OrderItem};
use store::{CheckoutStore, CheckoutStoreExt};

use crate::error::{CheckoutError, Result};

/// An order together with its items.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Owner-scoped queries over placed orders.
///
/// Orders that don't belong to the caller are reported as not found.
#[derive(Clone)]
pub struct OrderService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(user_id).await?)
    }

    /// Gets one of the caller's orders with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: &UserId, order_id: OrderId) -> Result<OrderDetails> {
        let order = self.owned_order(user_id, order_id).await?;
        let items = self.store.get_order_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Gets the status history of one of the caller's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn order_history(
        &self,
        user_id: &UserId,
        order_id: OrderId,
    ) -> Result<Vec<OrderHistoryEvent>> {
        self.owned_order(user_id, order_id).await?;
        Ok(self.store.get_history(order_id).await?)
    }

    async fn owned_order(&self, user_id: &UserId, order_id: OrderId) -> Result<Order> {
        self.store
            .get_owned_order(user_id, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }
}
