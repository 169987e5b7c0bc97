use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderHistoryEvent, OrderItem, OrderStatus, Product};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{CheckoutStore, Decrement, HistoryRecorder, Inventory, Ledger, StoreTransaction},
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
    history: Vec<OrderHistoryEvent>,
}

impl MemoryState {
    fn has_history(&self, order_id: OrderId, status: OrderStatus) -> bool {
        self.history
            .iter()
            .any(|e| e.order_id == order_id && e.status == status)
    }
}

/// In-memory checkout store for tests and local development.
///
/// A transaction holds the store's lock from `begin` until it commits or is
/// dropped, so transactions are serializable. Writes are staged and applied
/// in one step on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `products`.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for product in products {
                state.products.insert(product.id, product);
            }
        }
        store
    }

    /// Configures every subsequent commit to fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the current stock of a product.
    pub async fn stock(&self, product_id: ProductId) -> Option<u32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.quantity)
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the total number of order items stored.
    pub async fn item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Returns the total number of history events stored.
    pub async fn history_count(&self) -> usize {
        self.state.lock().await.history.len()
    }
}

#[async_trait]
impl CheckoutStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state: guard,
            staged: Staged::default(),
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn restock(&self, id: ProductId, amount: u32) -> Result<Option<u32>> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        product.quantity = product
            .quantity
            .checked_add(amount)
            .ok_or_else(|| StoreError::Corrupt(format!("stock overflow for product {id}")))?;
        Ok(Some(product.quantity))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| i.order_id == id)
            .cloned()
            .collect())
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<_> = state
            .history
            .iter()
            .filter(|e| e.order_id == id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        events.sort_by_key(|e| e.changed_at);
        Ok(events)
    }
}

#[derive(Debug, Default)]
struct Staged {
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    history: Vec<OrderHistoryEvent>,
    decrements: HashMap<ProductId, u32>,
}

/// Transaction over [`InMemoryStore`]. Holds the store lock until dropped.
pub struct InMemoryTransaction {
    state: OwnedMutexGuard<MemoryState>,
    staged: Staged,
    fail_on_commit: bool,
}

#[async_trait]
impl Inventory for InMemoryTransaction {
    async fn decrement(&mut self, product_id: ProductId, amount: u32) -> Result<Decrement> {
        let on_hand = self
            .state
            .products
            .get(&product_id)
            .map_or(0, |p| p.quantity);
        let pending = self.staged.decrements.get(&product_id).copied().unwrap_or(0);
        let available = on_hand.saturating_sub(pending);

        if available < amount {
            return Ok(Decrement::Insufficient { available });
        }

        *self.staged.decrements.entry(product_id).or_insert(0) += amount;
        Ok(Decrement::Applied {
            remaining: available - amount,
        })
    }
}

#[async_trait]
impl Ledger for InMemoryTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.state.orders.contains_key(&order.id)
            || self.staged.orders.iter().any(|o| o.id == order.id)
        {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        self.staged.items.extend_from_slice(items);
        Ok(())
    }
}

#[async_trait]
impl HistoryRecorder for InMemoryTransaction {
    async fn record(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let staged = self
            .staged
            .history
            .iter()
            .any(|e| e.order_id == order_id && e.status == status);
        if !staged && !self.state.has_history(order_id, status) {
            self.staged
                .history
                .push(OrderHistoryEvent::new(order_id, status));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut state,
            staged,
            fail_on_commit,
        } = *self;

        if fail_on_commit {
            return Err(StoreError::CommitFailed(
                "injected commit failure".to_string(),
            ));
        }

        for (product_id, amount) in staged.decrements {
            let product = state.products.get_mut(&product_id).ok_or_else(|| {
                StoreError::Corrupt(format!("product {product_id} vanished mid-transaction"))
            })?;
            product.quantity = product.quantity.checked_sub(amount).ok_or_else(|| {
                StoreError::Corrupt(format!("negative stock for product {product_id}"))
            })?;
        }
        for order in staged.orders {
            state.orders.insert(order.id, order);
        }
        state.items.extend(staged.items);
        state.history.extend(staged.history);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
