//! In-memory adapters.
//!
//! `InMemoryStore` plays catalog and order repository at once so stock
//! changes made by checkout are visible to later lookups. Transactions hold
//! the store lock from `begin` until commit or drop and write to a staged
//! copy, so concurrent checkouts are serialized and a dropped transaction
//! leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::aggregates::{Order, OrderItem, Payment, ProductSnapshot};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{OrderId, ProductId, SessionId};
use crate::ports::{
    CatalogError, EventPublisher, OrderRepository, OrderTransaction, ProductCatalog, PublishError,
    SessionStore, StockUpdate, StorageError,
};

#[derive(Clone, Debug, Default)]
struct StoreState {
    products: HashMap<ProductId, ProductSnapshot>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    payments: Vec<Payment>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn upsert_product(&self, product: ProductSnapshot) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn stock(&self, product_id: ProductId) -> Option<i64> {
        self.state.lock().await.products.get(&product_id).map(|p| p.stock)
    }

    pub async fn orders(&self) -> Vec<Order> { self.state.lock().await.orders.clone() }
    pub async fn order_items(&self) -> Vec<OrderItem> { self.state.lock().await.order_items.clone() }
    pub async fn payments(&self) -> Vec<Payment> { self.state.lock().await.payments.clone() }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn lookup(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        self.state.lock().await.products.get(&product_id).cloned().ok_or(CatalogError::NotFound(product_id))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn create_order(&mut self, order: &Order) -> Result<OrderId, StorageError> {
        if self.staged.orders.iter().any(|o| o.id == order.id) {
            return Err(StorageError::Backend(format!("order {} already exists", order.id)));
        }
        self.staged.orders.push(order.clone());
        Ok(order.id)
    }

    async fn create_order_items(&mut self, items: &[OrderItem]) -> Result<(), StorageError> {
        self.staged.order_items.extend_from_slice(items);
        Ok(())
    }

    async fn create_payment(&mut self, payment: &Payment) -> Result<(), StorageError> {
        self.staged.payments.push(payment.clone());
        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<StockUpdate, StorageError> {
        let product = self
            .staged
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StorageError::Backend(format!("product {product_id} does not exist")))?;
        let quantity = i64::from(quantity);
        if product.stock < quantity {
            return Ok(StockUpdate::Insufficient { available: product.stock });
        }
        product.stock -= quantity;
        Ok(StockUpdate::Decremented { remaining: product.stock })
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    values: Arc<RwLock<HashMap<(SessionId, String), Value>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.read().await.get(&(session.clone(), key.to_string())).cloned())
    }

    async fn set(&self, session: &SessionId, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.write().await.insert((session.clone(), key.to_string()), value);
        Ok(())
    }
}

/// Publisher used when no broker is configured.
#[derive(Clone, Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        tracing::debug!(subject = event.subject(), "event discarded, no publisher configured");
        Ok(())
    }
}

/// Keeps every published event; handy for assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self { Self::default() }
    pub async fn events(&self) -> Vec<DomainEvent> { self.events.lock().await.clone() }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Availability;
    use crate::domain::value_objects::{Money, PaymentMethod, UserId};
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    fn product(id: i64, stock: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id), name: format!("Product {id}"), price: Some(Money::new(dec!(10))),
            sale_price: None, stock, availability: Availability::Available,
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() -> TestResult {
        let store = InMemoryStore::new();
        store.upsert_product(product(1, 5)).await;

        let mut tx = store.begin().await?;
        let order = Order::place(OrderId::generate(), UserId::new(1), Money::new(dec!(10)), PaymentMethod::Khalti, "Lalitpur");
        tx.create_order(&order).await?;
        assert_eq!(tx.decrement_stock(ProductId::new(1), 2).await?, StockUpdate::Decremented { remaining: 3 });
        drop(tx);

        assert!(store.orders().await.is_empty());
        assert_eq!(store.stock(ProductId::new(1)).await, Some(5));
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_applies_writes() -> TestResult {
        let store = InMemoryStore::new();
        store.upsert_product(product(1, 5)).await;

        let mut tx = store.begin().await?;
        let order = Order::place(OrderId::generate(), UserId::new(1), Money::new(dec!(10)), PaymentMethod::Khalti, "Lalitpur");
        tx.create_order(&order).await?;
        tx.create_payment(&Payment::pending_for(&order)).await?;
        tx.decrement_stock(ProductId::new(1), 5).await?;
        tx.commit().await?;

        assert_eq!(store.orders().await.len(), 1);
        assert_eq!(store.payments().await.len(), 1);
        assert_eq!(store.stock(ProductId::new(1)).await, Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_decrement_refuses_oversell() -> TestResult {
        let store = InMemoryStore::new();
        store.upsert_product(product(1, 1)).await;

        let mut tx = store.begin().await?;
        assert_eq!(tx.decrement_stock(ProductId::new(1), 2).await?, StockUpdate::Insufficient { available: 1 });
        assert!(tx.decrement_stock(ProductId::new(2), 1).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_values_are_scoped() -> TestResult {
        let sessions = InMemorySessionStore::new();
        let a = SessionId::new("a")?;
        let b = SessionId::new("b")?;
        sessions.set(&a, "cart", serde_json::json!({"items": {}})).await?;
        assert!(sessions.get(&a, "cart").await?.is_some());
        assert!(sessions.get(&b, "cart").await?.is_none());
        assert!(sessions.get(&a, "other").await?.is_none());
        Ok(())
    }
}
