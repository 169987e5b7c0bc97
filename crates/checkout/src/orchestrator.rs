//! Checkout orchestrator for placing orders atomically.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use common::{OrderId, ProductId, UserId};
use domain::{
    Cart, CartLine, DomainError, Money, Order, OrderDraft, OrderItem, OrderStatus, Product,
    Shortage,
};
use store::{CheckoutStore, CheckoutStoreExt, Decrement, StoreError, StoreTransaction};

use crate::error::{CheckoutError, Result};
use crate::payment::{PaymentDecider, PaymentDecision};

/// How many times a checkout that lost an inventory race is retried.
const MAX_RACE_RETRIES: u32 = 1;

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub total: Money,
    pub status: OrderStatus,
}

/// What the transactional step wants done with its transaction.
#[derive(Debug)]
enum TxOutcome {
    Commit,
    /// A conditional decrement found less stock than validated earlier.
    Abort(Shortage),
}

/// Places orders: validate, price, decide payment, then persist atomically.
///
/// The payment decision always precedes any durable write. Every write of a
/// checkout happens in a single store transaction that runs on its own task,
/// so a dropped request can't leave it half-applied.
pub struct CheckoutOrchestrator<S, P>
where
    S: CheckoutStore,
    P: PaymentDecider,
{
    store: S,
    payment: P,
}

impl<S, P> CheckoutOrchestrator<S, P>
where
    S: CheckoutStore + Clone + 'static,
    P: PaymentDecider,
{
    /// Creates a new checkout orchestrator.
    pub fn new(store: S, payment: P) -> Self {
        Self { store, payment }
    }

    /// Gets a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order for `user_id`.
    ///
    /// Fails without side effects on invalid input, unknown products or
    /// insufficient stock. A declined payment records a failed order and
    /// returns [`CheckoutError::PaymentDeclined`].
    #[tracing::instrument(
        skip_all,
        fields(user_id = %user_id, order_id = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: Vec<CartLine>,
        location: serde_json::Value,
    ) -> Result<PlacedOrder> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.checkout(user_id, lines, location).await;

        metrics::counter!("checkout_outcomes_total", "outcome" => outcome_label(&result))
            .increment(1);
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        result
    }

    async fn checkout(
        &self,
        user_id: UserId,
        lines: Vec<CartLine>,
        location: serde_json::Value,
    ) -> Result<PlacedOrder> {
        // 1. Validate input and resolve products
        let cart = Cart::new(lines)?;
        if location.is_null() {
            return Err(DomainError::MissingLocation.into());
        }

        let product_ids: Vec<ProductId> = cart.product_ids().collect();
        let products = self.store.product_map(&product_ids).await?;
        if let Some(missing) = product_ids.iter().find(|id| !products.contains_key(id)) {
            return Err(CheckoutError::ProductNotFound(*missing));
        }

        // 2. Check stock for the merged demand
        if let Some(shortage) = cart.find_shortage(&products) {
            return Err(shortage.into());
        }
        warn_on_quoted_price_mismatch(&cart, &products);

        // 3. Price from the catalog
        let order_id = OrderId::new();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));
        let draft = OrderDraft::price(order_id, user_id.clone(), &cart, &products, location)?;

        // 4. Decide payment before writing anything
        let decision = self
            .payment
            .decide(&user_id, draft.total())
            .await
            .map_err(|e| CheckoutError::Payment(e.to_string()))?;

        match decision {
            PaymentDecision::Declined => self.record_declined(draft).await,
            PaymentDecision::Accepted => self.record_confirmed(&cart, &product_ids, draft).await,
        }
    }

    async fn record_declined(&self, draft: OrderDraft) -> Result<PlacedOrder> {
        let order = draft.fail()?;
        let order_id = order.id;
        let total = order.total_price;

        let store = self.store.clone();
        run_detached(async move {
            let mut tx = store.begin().await?;
            let outcome = write_failed(tx.as_mut(), &order).await;
            finish(tx, outcome).await
        })
        .await?;

        tracing::info!(%order_id, total = %total, "payment declined, order failed");
        Err(CheckoutError::PaymentDeclined { order_id })
    }

    async fn record_confirmed(
        &self,
        cart: &Cart,
        product_ids: &[ProductId],
        draft: OrderDraft,
    ) -> Result<PlacedOrder> {
        let (order, items) = draft.confirm()?;
        let mut retries = 0;

        loop {
            let store = self.store.clone();
            let attempt_order = order.clone();
            let attempt_items = items.clone();
            let outcome = run_detached(async move {
                let mut tx = store.begin().await?;
                let outcome = write_confirmed(tx.as_mut(), &attempt_order, &attempt_items).await;
                finish(tx, outcome).await
            })
            .await?;

            let shortage = match outcome {
                TxOutcome::Commit => {
                    tracing::info!(order_id = %order.id, total = %order.total_price, "order confirmed");
                    return Ok(PlacedOrder {
                        order_id: order.id,
                        total: order.total_price,
                        status: order.status,
                    });
                }
                TxOutcome::Abort(shortage) => shortage,
            };

            if retries >= MAX_RACE_RETRIES {
                tracing::warn!(product_id = %shortage.product_id, "inventory race lost again");
                return Err(shortage.into());
            }
            retries += 1;

            // Lost a race with a concurrent checkout; re-validate against fresh stock
            tracing::warn!(
                product_id = %shortage.product_id,
                requested = shortage.requested,
                available = shortage.available,
                "inventory race lost, re-validating"
            );
            metrics::counter!("checkout_race_retries_total").increment(1);

            let products = self.store.product_map(product_ids).await?;
            if let Some(shortage) = cart.find_shortage(&products) {
                return Err(shortage.into());
            }
        }
    }
}

async fn write_failed(
    tx: &mut dyn StoreTransaction,
    order: &Order,
) -> std::result::Result<TxOutcome, StoreError> {
    tx.insert_order(order).await?;
    tx.record(order.id, OrderStatus::Failed).await?;
    Ok(TxOutcome::Commit)
}

async fn write_confirmed(
    tx: &mut dyn StoreTransaction,
    order: &Order,
    items: &[OrderItem],
) -> std::result::Result<TxOutcome, StoreError> {
    tx.insert_order(order).await?;
    tx.insert_items(items).await?;

    // Lock product rows in id order so concurrent checkouts can't deadlock
    let mut by_product: Vec<&OrderItem> = items.iter().collect();
    by_product.sort_by_key(|item| item.product_id);

    for item in by_product {
        match tx.decrement(item.product_id, item.quantity).await? {
            Decrement::Applied { .. } => {
                metrics::counter!("inventory_decrements_total", "result" => "applied")
                    .increment(1);
            }
            Decrement::Insufficient { available } => {
                metrics::counter!("inventory_decrements_total", "result" => "insufficient")
                    .increment(1);
                return Ok(TxOutcome::Abort(Shortage {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                }));
            }
        }
    }

    tx.record(order.id, OrderStatus::Confirmed).await?;
    Ok(TxOutcome::Commit)
}

/// Commits on `Commit`, rolls back on `Abort` or error.
async fn finish(
    tx: Box<dyn StoreTransaction>,
    outcome: std::result::Result<TxOutcome, StoreError>,
) -> std::result::Result<TxOutcome, StoreError> {
    match outcome {
        Ok(TxOutcome::Commit) => {
            tx.commit().await?;
            Ok(TxOutcome::Commit)
        }
        Ok(TxOutcome::Abort(shortage)) => {
            tx.rollback().await?;
            Ok(TxOutcome::Abort(shortage))
        }
        Err(e) => {
            tracing::warn!(error = %e, "rolling back checkout transaction");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Runs a transactional step on its own task so it always reaches commit or rollback.
async fn run_detached<F>(step: F) -> Result<TxOutcome>
where
    F: Future<Output = std::result::Result<TxOutcome, StoreError>> + Send + 'static,
{
    match tokio::spawn(step).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "checkout transaction failed");
            Err(CheckoutError::Storage(e))
        }
        Err(join_err) => Err(CheckoutError::Internal(format!(
            "transaction task failed: {join_err}"
        ))),
    }
}

fn warn_on_quoted_price_mismatch(cart: &Cart, products: &HashMap<ProductId, Product>) {
    for line in cart.lines() {
        let (Some(quoted), Some(product)) = (line.quoted_price, products.get(&line.product_id))
        else {
            continue;
        };
        if quoted != product.unit_price {
            tracing::warn!(
                product_id = %line.product_id,
                quoted = %quoted,
                actual = %product.unit_price,
                "quoted price differs from catalog price"
            );
        }
    }
}

fn outcome_label(result: &Result<PlacedOrder>) -> &'static str {
    match result {
        Ok(_) => "confirmed",
        Err(CheckoutError::PaymentDeclined { .. }) => "declined",
        Err(CheckoutError::InsufficientStock { .. }) => "insufficient_stock",
        Err(CheckoutError::ProductNotFound(_)) => "product_not_found",
        Err(CheckoutError::Validation(_)) => "invalid",
        Err(_) => "error",
    }
}
