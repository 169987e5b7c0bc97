use std::collections::HashMap;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderHistoryEvent, OrderItem, OrderStatus, Product};

use crate::Result;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// Stock covered the request and was reduced.
    Applied { remaining: u32 },
    /// Stock at write time could not cover the request. Nothing changed.
    Insufficient { available: u32 },
}

impl Decrement {
    /// Returns true if the decrement was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Decrement::Applied { .. })
    }
}

/// Inventory writes performed inside a checkout transaction.
#[async_trait]
pub trait Inventory: Send {
    /// Reduces stock by `amount` only if at least `amount` units are available.
    ///
    /// This is a single conditional write evaluated under the transaction's
    /// isolation, never a read followed by an unguarded update. An unknown
    /// product reports `Insufficient { available: 0 }`.
    async fn decrement(&mut self, product_id: ProductId, amount: u32) -> Result<Decrement>;
}

/// Order ledger writes performed inside a checkout transaction.
#[async_trait]
pub trait Ledger: Send {
    /// Inserts an order row. Fails with `DuplicateOrder` if the id exists.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts a batch of order items.
    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()>;
}

/// Append-only order status history.
#[async_trait]
pub trait HistoryRecorder: Send {
    /// Appends a status event for an order.
    ///
    /// Recording the same status twice for one order is a no-op.
    async fn record(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()>;
}

/// A unit of work spanning inventory, ledger and history writes.
///
/// Nothing written through the transaction is visible to other readers until
/// [`commit`](StoreTransaction::commit) succeeds. Dropping a transaction
/// without committing rolls it back.
#[async_trait]
pub trait StoreTransaction: Inventory + Ledger + HistoryRecorder {
    /// Makes every write in this transaction visible atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write in this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Core trait for checkout storage backends.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Starts a new transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Retrieves the authoritative price and stock for a product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Retrieves every product among `ids` that exists.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Inserts a product or replaces its name, price and stock.
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Adds stock to a product and returns the new quantity.
    ///
    /// Returns None if the product doesn't exist.
    async fn restock(&self, id: ProductId, amount: u32) -> Result<Option<u32>>;

    /// Retrieves an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders of a user, newest first.
    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// Retrieves the items of an order.
    async fn get_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>>;

    /// Retrieves the status history of an order, oldest first.
    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>>;
}

/// Extension trait providing convenience methods for checkout stores.
#[async_trait]
pub trait CheckoutStoreExt: CheckoutStore {
    /// Loads products keyed by id. Unknown ids are absent from the map.
    async fn product_map(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        Ok(self
            .get_products(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    /// Retrieves an order only if it belongs to `user_id`.
    async fn get_owned_order(&self, user_id: &UserId, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .get_order(id)
            .await?
            .filter(|order| &order.user_id == user_id))
    }
}

// Blanket implementation for all CheckoutStore implementations
impl<T: CheckoutStore + ?Sized> CheckoutStoreExt for T {}
