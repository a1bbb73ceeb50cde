//! Postgres adapters backed by sqlx.
//!
//! Stock is decremented with a conditional update so two checkouts racing
//! for the last unit cannot both succeed.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::domain::aggregates::{Availability, Order, OrderItem, Payment, ProductSnapshot};
use crate::domain::value_objects::{Money, OrderId, ProductId, SessionId};
use crate::ports::{
    CatalogError, OrderRepository, OrderTransaction, ProductCatalog, SessionStore, StockUpdate,
    StorageError,
};

const LOOKUP_PRODUCT_SQL: &str =
    "SELECT id, name, price, sale_price, stock, availability FROM products WHERE id = $1";

const DECREMENT_STOCK_SQL: &str =
    "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2 RETURNING stock";

#[derive(Clone, Debug)]
pub struct PgProductCatalog {
    db: PgPool,
}

impl PgProductCatalog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

fn parse_availability(value: &str) -> Result<Availability, StorageError> {
    value
        .parse()
        .map_err(|_| StorageError::Corrupt(format!("unknown product availability `{value}`")))
}

fn product_from_row(row: &PgRow) -> Result<ProductSnapshot, StorageError> {
    let availability = parse_availability(row.try_get("availability")?)?;
    Ok(ProductSnapshot {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: row.try_get::<Option<Decimal>, _>("price")?.map(Money::new),
        sale_price: row.try_get::<Option<Decimal>, _>("sale_price")?.map(Money::new),
        stock: row.try_get("stock")?,
        availability,
    })
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn lookup(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        let row = sqlx::query(LOOKUP_PRODUCT_SQL)
            .bind(product_id.value())
            .fetch_optional(&self.db)
            .await
            .map_err(StorageError::from)?
            .ok_or(CatalogError::NotFound(product_id))?;
        Ok(product_from_row(&row)?)
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, StorageError> {
        let value: Option<(Value,)> = sqlx::query_as("SELECT value FROM session_values WHERE session_id = $1 AND key = $2")
            .bind(session.as_str()).bind(key)
            .fetch_optional(&self.db).await?;
        Ok(value.map(|(v,)| v))
    }

    async fn set(&self, session: &SessionId, key: &str, value: Value) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO session_values (session_id, key, value, updated_at) VALUES ($1, $2, $3, NOW()) ON CONFLICT (session_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()")
            .bind(session.as_str()).bind(key).bind(&value)
            .execute(&self.db).await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgOrderRepository {
    db: PgPool,
}

impl PgOrderRepository {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgOrderTransaction { tx }))
    }
}

struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn create_order(&mut self, order: &Order) -> Result<OrderId, StorageError> {
        let (id,): (uuid::Uuid,) = sqlx::query_as("INSERT INTO orders (id, user_id, created_at, updated_at, total_amount, payment_method, payment_status, shipping_address, shipment_status) VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8) RETURNING id")
            .bind(order.id.as_uuid()).bind(order.user_id.value()).bind(order.created_at)
            .bind(order.total_amount.amount()).bind(order.payment_method.as_ref())
            .bind(order.payment_status.as_ref()).bind(&order.shipping_address).bind(order.shipment_status.as_ref())
            .fetch_one(&mut *self.tx).await?;
        Ok(OrderId::from_uuid(id))
    }

    async fn create_order_items(&mut self, items: &[OrderItem]) -> Result<(), StorageError> {
        for item in items {
            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, price, total_price) VALUES ($1, $2, $3, $4, $5)")
                .bind(item.order_id.as_uuid()).bind(item.product_id.value()).bind(i64::from(item.quantity))
                .bind(item.price.amount()).bind(item.total_price.amount())
                .execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn create_payment(&mut self, payment: &Payment) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO payments (order_id, user_id, payment_method, payment_status, payment_date) VALUES ($1, $2, $3, $4, $5)")
            .bind(payment.order_id.as_uuid()).bind(payment.user_id.value()).bind(payment.payment_method.as_ref())
            .bind(payment.payment_status.as_ref()).bind(payment.payment_date)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<StockUpdate, StorageError> {
        let remaining: Option<(i64,)> = sqlx::query_as(DECREMENT_STOCK_SQL)
            .bind(product_id.value()).bind(i64::from(quantity))
            .fetch_optional(&mut *self.tx).await?;
        if let Some((remaining,)) = remaining {
            return Ok(StockUpdate::Decremented { remaining });
        }

        let available: Option<(i64,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.value())
            .fetch_optional(&mut *self.tx).await?;
        match available {
            Some((available,)) => Ok(StockUpdate::Insufficient { available }),
            None => Err(StorageError::Backend(format!("product {product_id} does not exist"))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }
}
