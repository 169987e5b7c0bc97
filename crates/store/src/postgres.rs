use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{HistoryEventId, OrderId, OrderItemId, ProductId, UserId};
use domain::{Money, Order, OrderHistoryEvent, OrderItem, OrderStatus, Product};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CheckoutStore, Decrement, HistoryRecorder, Inventory, Ledger, StoreTransaction},
};

/// PostgreSQL-backed checkout store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL checkout store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            quantity: to_u32(row.try_get("quantity")?, "products.quantity")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            status: parse_status(row.try_get("status")?)?,
            location: row.try_get("location")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: to_u32(row.try_get("quantity")?, "order_items.quantity")?,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_history(row: PgRow) -> Result<OrderHistoryEvent> {
        Ok(OrderHistoryEvent {
            id: HistoryEventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            status: parse_status(row.try_get("status")?)?,
            changed_at: row.try_get::<DateTime<Utc>, _>("changed_at")?,
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn parse_status(value: String) -> Result<OrderStatus> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown order status: {value}")))
}

#[async_trait]
impl CheckoutStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, price_cents, quantity
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, quantity
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(i64::from(product.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn restock(&self, id: ProductId, amount: u32) -> Result<Option<u32>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING quantity
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(amount))
        .fetch_optional(&self.pool)
        .await?;

        quantity
            .map(|q| to_u32(q, "products.quantity"))
            .transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, user_id, total_price_cents, status, location, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_price_cents, status, location, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn get_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price_cents, subtotal_cents, created_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, status, changed_at
            FROM order_history
            WHERE order_id = $1
            ORDER BY changed_at ASC, seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_history).collect()
    }
}

/// Transaction over [`PostgresStore`]. Rolled back by sqlx if dropped.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Inventory for PostgresTransaction {
    async fn decrement(&mut self, product_id: ProductId, amount: u32) -> Result<Decrement> {
        // The WHERE guard makes this a single conditional write under row lock
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            RETURNING quantity
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(Decrement::Applied {
                remaining: to_u32(remaining, "products.quantity")?,
            });
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(Decrement::Insufficient {
            available: to_u32(available.unwrap_or(0), "products.quantity")?,
        })
    }
}

#[async_trait]
impl Ledger for PostgresTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_price_cents, status, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .bind(&order.location)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order.id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price_cents, subtotal_cents, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl HistoryRecorder for PostgresTransaction {
    async fn record(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let event = OrderHistoryEvent::new(order_id, status);
        sqlx::query(
            r#"
            INSERT INTO order_history (id, order_id, status, changed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id, status) DO NOTHING
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.order_id.as_uuid())
        .bind(event.status.as_str())
        .bind(event.changed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::CommitFailed(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
