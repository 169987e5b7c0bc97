//! Integration tests for checkout against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use checkout::{
    CheckoutError, CheckoutOrchestrator, FixedPaymentDecider, OrderService, PaymentDecision,
};
use common::{OrderId, ProductId, UserId};
use domain::{CartLine, Money, Order, OrderHistoryEvent, OrderItem, OrderStatus, Product};
use store::{
    CheckoutStore, Decrement, HistoryRecorder, InMemoryStore, Inventory, Ledger, StoreTransaction,
};

type TestOrchestrator = CheckoutOrchestrator<InMemoryStore, FixedPaymentDecider>;

struct TestHarness {
    orchestrator: Arc<TestOrchestrator>,
    orders: OrderService<InMemoryStore>,
    store: InMemoryStore,
    payment: FixedPaymentDecider,
}

impl TestHarness {
    async fn with_products(products: Vec<Product>) -> Self {
        let store = InMemoryStore::with_products(products).await;
        let payment = FixedPaymentDecider::accepting();
        let orchestrator = Arc::new(CheckoutOrchestrator::new(store.clone(), payment.clone()));
        let orders = OrderService::new(store.clone());

        Self {
            orchestrator,
            orders,
            store,
            payment,
        }
    }

    async fn stock(&self, product_id: ProductId) -> u32 {
        self.store.stock(product_id).await.unwrap()
    }
}

fn product(cents: i64, quantity: u32) -> Product {
    Product::new(ProductId::new(), "Widget", Money::from_cents(cents), quantity)
}

fn location() -> serde_json::Value {
    serde_json::json!({"street": "221B Baker Street", "city": "London"})
}

#[tokio::test]
async fn test_confirmed_order_decrements_stock_and_records_history() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;
    let user = UserId::new("user-1");

    let placed = h
        .orchestrator
        .place_order(user.clone(), vec![CartLine::new(x.id, 2)], location())
        .await
        .unwrap();

    assert_eq!(placed.status, OrderStatus::Confirmed);
    assert_eq!(placed.total.to_string(), "20.00");
    assert_eq!(h.stock(x.id).await, 8);

    let history = h.orders.order_history(&user, placed.order_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_unknown_product_creates_nothing() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;
    let unknown = ProductId::new();

    let result = h
        .orchestrator
        .place_order(
            UserId::new("user-1"),
            vec![CartLine::new(x.id, 1), CartLine::new(unknown, 1)],
            location(),
        )
        .await;

    assert!(matches!(result, Err(CheckoutError::ProductNotFound(id)) if id == unknown));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock(x.id).await, 10);
    assert_eq!(h.payment.decision_count(), 0);
}

#[tokio::test]
async fn test_empty_cart_creates_nothing() {
    let h = TestHarness::with_products(vec![]).await;

    let result = h
        .orchestrator
        .place_order(UserId::new("user-1"), vec![], location())
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;

    let result = h
        .orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(x.id, 0)], location())
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_declined_payment_records_failed_order_only() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;
    h.payment.set_decision(PaymentDecision::Declined);
    let user = UserId::new("user-1");

    let result = h
        .orchestrator
        .place_order(user.clone(), vec![CartLine::new(x.id, 3)], location())
        .await;

    let order_id = match result {
        Err(CheckoutError::PaymentDeclined { order_id }) => order_id,
        other => panic!("expected PaymentDeclined, got {other:?}"),
    };

    let details = h.orders.get_order(&user, order_id).await.unwrap();
    assert_eq!(details.order.status, OrderStatus::Failed);
    assert_eq!(details.order.total_price.cents(), 3000);
    assert!(details.items.is_empty());
    assert_eq!(h.store.item_count().await, 0);
    assert_eq!(h.stock(x.id).await, 10);

    let history = h.orders.order_history(&user, order_id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Failed]);
}

#[tokio::test]
async fn test_insufficient_stock_creates_nothing() {
    let x = product(1000, 1);
    let h = TestHarness::with_products(vec![x.clone()]).await;

    let result = h
        .orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(x.id, 2)], location())
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        })
    ));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock(x.id).await, 1);
    assert_eq!(h.payment.decision_count(), 0);
}

#[tokio::test]
async fn test_quoted_price_does_not_affect_total() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;

    let placed = h
        .orchestrator
        .place_order(
            UserId::new("user-1"),
            vec![CartLine::new(x.id, 2).with_quoted_price(Money::from_cents(1))],
            location(),
        )
        .await
        .unwrap();

    assert_eq!(placed.total.cents(), 2000);
}

#[tokio::test]
async fn test_totals_match_item_subtotals() {
    let a = product(1999, 10);
    let b = product(250, 10);
    let c = product(5, 10);
    let h = TestHarness::with_products(vec![a.clone(), b.clone(), c.clone()]).await;
    let user = UserId::new("user-1");

    let placed = h
        .orchestrator
        .place_order(
            user.clone(),
            vec![
                CartLine::new(a.id, 3),
                CartLine::new(b.id, 1),
                CartLine::new(c.id, 7),
                CartLine::new(b.id, 2),
            ],
            location(),
        )
        .await
        .unwrap();

    let details = h.orders.get_order(&user, placed.order_id).await.unwrap();
    assert_eq!(details.items.len(), 3);
    for item in &details.items {
        assert_eq!(
            item.subtotal,
            item.unit_price.checked_multiply(item.quantity).unwrap()
        );
    }
    let sum: Money = details.items.iter().map(|i| i.subtotal).sum();
    assert_eq!(sum, details.order.total_price);
    assert_eq!(placed.total.cents(), 1999 * 3 + 250 * 3 + 5 * 7);
    assert_eq!(h.stock(b.id).await, 7);
}

#[tokio::test]
async fn test_commit_failure_leaves_no_trace() {
    let x = product(1000, 10);
    let h = TestHarness::with_products(vec![x.clone()]).await;
    h.store.set_fail_on_commit(true);

    let result = h
        .orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(x.id, 2)], location())
        .await;

    assert!(matches!(result, Err(CheckoutError::Storage(_))));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.item_count().await, 0);
    assert_eq!(h.store.history_count().await, 0);
    assert_eq!(h.stock(x.id).await, 10);

    h.store.set_fail_on_commit(false);
    let placed = h
        .orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(x.id, 2)], location())
        .await
        .unwrap();
    assert_eq!(placed.status, OrderStatus::Confirmed);
    assert_eq!(h.stock(x.id).await, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_concurrent_checkouts_for_scarce_stock() {
    let p = product(1000, 5);
    let h = TestHarness::with_products(vec![p.clone()]).await;

    let mut handles = Vec::new();
    for i in 0..2 {
        let orchestrator = h.orchestrator.clone();
        let product_id = p.id;
        handles.push(tokio::spawn(async move {
            orchestrator
                .place_order(
                    UserId::new(format!("user-{i}")),
                    vec![CartLine::new(product_id, 3)],
                    location(),
                )
                .await
        }));
    }

    let mut confirmed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(placed) => {
                assert_eq!(placed.status, OrderStatus::Confirmed);
                confirmed += 1;
            }
            Err(CheckoutError::InsufficientStock { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(h.stock(p.id).await, 2);
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(h.store.item_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_checkouts_never_oversell() {
    let p = product(500, 10);
    let h = TestHarness::with_products(vec![p.clone()]).await;

    let mut handles = Vec::new();
    for i in 0..20u32 {
        let orchestrator = h.orchestrator.clone();
        let product_id = p.id;
        let quantity = i % 3 + 1;
        handles.push(tokio::spawn(async move {
            let result = orchestrator
                .place_order(
                    UserId::new(format!("user-{i}")),
                    vec![CartLine::new(product_id, quantity)],
                    location(),
                )
                .await;
            (quantity, result)
        }));
    }

    let mut sold = 0;
    for handle in handles {
        let (quantity, result) = handle.await.unwrap();
        match result {
            Ok(_) => sold += quantity,
            Err(CheckoutError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(sold <= 10);
    assert_eq!(h.stock(p.id).await, 10 - sold);
}

#[tokio::test]
async fn test_every_order_ends_in_a_terminal_status() {
    let x = product(1000, 100);
    let h = TestHarness::with_products(vec![x.clone()]).await;
    let user = UserId::new("user-1");

    for i in 0..6 {
        let decision = if i % 2 == 0 {
            PaymentDecision::Accepted
        } else {
            PaymentDecision::Declined
        };
        h.payment.set_decision(decision);
        let _ = h
            .orchestrator
            .place_order(user.clone(), vec![CartLine::new(x.id, 1)], location())
            .await;
    }

    let orders = h.orders.list_orders(&user).await.unwrap();
    assert_eq!(orders.len(), 6);
    for order in orders {
        assert!(order.status.is_terminal());
        let history = h.store.get_history(order.id).await.unwrap();
        assert_eq!(history.last().map(|e| e.status), Some(order.status));
    }
    assert_eq!(h.stock(x.id).await, 97);
}

/// Store that lets a rival checkout sell stock right before each of our
/// transactions begins, and returns stock before catalog reads.
///
/// `sold_before_begin[n]` units are sold before the n-th `begin`, and
/// `restocked_before_read[n]` units are added before the n-th `get_products`.
/// The first read is the initial validation.
#[derive(Clone)]
struct ContendedStore {
    inner: InMemoryStore,
    product_id: ProductId,
    sold_before_begin: Vec<u32>,
    restocked_before_read: Vec<u32>,
    begins: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    decremented: Arc<Mutex<Vec<ProductId>>>,
}

impl ContendedStore {
    fn new(inner: InMemoryStore, product_id: ProductId) -> Self {
        Self {
            inner,
            product_id,
            sold_before_begin: Vec::new(),
            restocked_before_read: Vec::new(),
            begins: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
            decremented: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn selling(mut self, sold_before_begin: Vec<u32>) -> Self {
        self.sold_before_begin = sold_before_begin;
        self
    }

    fn restocking(mut self, restocked_before_read: Vec<u32>) -> Self {
        self.restocked_before_read = restocked_before_read;
        self
    }

    fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    fn decrement_order(&self) -> Vec<ProductId> {
        self.decremented.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckoutStore for ContendedStore {
    async fn begin(&self) -> store::Result<Box<dyn StoreTransaction>> {
        let n = self.begins.fetch_add(1, Ordering::SeqCst);
        if let Some(&amount) = self.sold_before_begin.get(n).filter(|&&a| a > 0) {
            let mut rival = self.inner.begin().await?;
            assert!(rival.decrement(self.product_id, amount).await?.is_applied());
            rival.commit().await?;
        }

        Ok(Box::new(RecordingTransaction {
            inner: self.inner.begin().await?,
            decremented: self.decremented.clone(),
        }))
    }

    async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn get_products(&self, ids: &[ProductId]) -> store::Result<Vec<Product>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(&amount) = self.restocked_before_read.get(n).filter(|&&a| a > 0) {
            self.inner.restock(self.product_id, amount).await?;
        }
        self.inner.get_products(ids).await
    }

    async fn upsert_product(&self, product: &Product) -> store::Result<()> {
        self.inner.upsert_product(product).await
    }

    async fn restock(&self, id: ProductId, amount: u32) -> store::Result<Option<u32>> {
        self.inner.restock(id, amount).await
    }

    async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn list_orders(&self, user_id: &UserId) -> store::Result<Vec<Order>> {
        self.inner.list_orders(user_id).await
    }

    async fn get_order_items(&self, id: OrderId) -> store::Result<Vec<OrderItem>> {
        self.inner.get_order_items(id).await
    }

    async fn get_history(&self, id: OrderId) -> store::Result<Vec<OrderHistoryEvent>> {
        self.inner.get_history(id).await
    }
}

/// Transaction that logs the order of its decrements.
struct RecordingTransaction {
    inner: Box<dyn StoreTransaction>,
    decremented: Arc<Mutex<Vec<ProductId>>>,
}

#[async_trait]
impl Inventory for RecordingTransaction {
    async fn decrement(&mut self, product_id: ProductId, amount: u32) -> store::Result<Decrement> {
        self.decremented.lock().unwrap().push(product_id);
        self.inner.decrement(product_id, amount).await
    }
}

#[async_trait]
impl Ledger for RecordingTransaction {
    async fn insert_order(&mut self, order: &Order) -> store::Result<()> {
        self.inner.insert_order(order).await
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> store::Result<()> {
        self.inner.insert_items(items).await
    }
}

#[async_trait]
impl HistoryRecorder for RecordingTransaction {
    async fn record(&mut self, order_id: OrderId, status: OrderStatus) -> store::Result<()> {
        self.inner.record(order_id, status).await
    }
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> store::Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> store::Result<()> {
        self.inner.rollback().await
    }
}

async fn contended(stock: u32) -> (ContendedStore, Product, FixedPaymentDecider) {
    let p = product(1000, stock);
    let store = ContendedStore::new(InMemoryStore::with_products(vec![p.clone()]).await, p.id);
    (store, p, FixedPaymentDecider::accepting())
}

#[tokio::test]
async fn test_lost_race_without_stock_left_is_a_conflict() {
    let (store, p, payment) = contended(5).await;
    let store = store.selling(vec![3]);
    let orchestrator = CheckoutOrchestrator::new(store.clone(), payment.clone());

    let result = orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(p.id, 3)], location())
        .await;

    match result {
        Err(CheckoutError::InsufficientStock {
            product_id,
            requested,
            available,
        }) => {
            assert_eq!(product_id, p.id);
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert_eq!(store.begin_count(), 1);
    assert_eq!(payment.decision_count(), 1);
    assert_eq!(store.inner.order_count().await, 0);
    assert_eq!(store.inner.item_count().await, 0);
    assert_eq!(store.inner.stock(p.id).await, Some(2));
}

#[tokio::test]
async fn test_lost_race_retries_once_with_same_payment_decision() {
    let (store, p, payment) = contended(5).await;
    let store = store.selling(vec![3]).restocking(vec![0, 3]);
    let orchestrator = CheckoutOrchestrator::new(store.clone(), payment.clone());

    let placed = orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(p.id, 3)], location())
        .await
        .unwrap();

    assert_eq!(placed.status, OrderStatus::Confirmed);
    assert_eq!(placed.total, Money::from_cents(3000));
    assert_eq!(store.begin_count(), 2);
    assert_eq!(payment.decision_count(), 1);
    assert_eq!(store.inner.order_count().await, 1);
    assert_eq!(store.inner.history_count().await, 1);
    assert_eq!(store.inner.stock(p.id).await, Some(2));
}

#[tokio::test]
async fn test_second_lost_race_is_a_conflict() {
    let (store, p, payment) = contended(5).await;
    let store = store.selling(vec![3, 3]).restocking(vec![0, 3]);
    let orchestrator = CheckoutOrchestrator::new(store.clone(), payment.clone());

    let result = orchestrator
        .place_order(UserId::new("user-1"), vec![CartLine::new(p.id, 3)], location())
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::InsufficientStock { .. })
    ));
    assert_eq!(store.begin_count(), 2);
    assert_eq!(payment.decision_count(), 1);
    assert_eq!(store.inner.order_count().await, 0);
    assert_eq!(store.inner.history_count().await, 0);
    assert_eq!(store.inner.stock(p.id).await, Some(2));
}

#[tokio::test]
async fn test_stock_is_decremented_in_product_order() {
    let a = product(1000, 10);
    let b = product(500, 10);
    let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };
    let store = ContendedStore::new(
        InMemoryStore::with_products(vec![low.clone(), high.clone()]).await,
        low.id,
    );
    let orchestrator = CheckoutOrchestrator::new(store.clone(), FixedPaymentDecider::accepting());

    orchestrator
        .place_order(
            UserId::new("user-1"),
            vec![CartLine::new(high.id, 1), CartLine::new(low.id, 1)],
            location(),
        )
        .await
        .unwrap();

    assert_eq!(store.decrement_order(), vec![low.id, high.id]);
}
