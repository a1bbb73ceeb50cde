//! Collaborator interfaces the core depends on.
//!
//! Adapters live in [`crate::infrastructure`]: in-memory ones for tests and
//! local runs, Postgres and NATS ones for the service binary.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderItem, Payment, ProductSnapshot};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{OrderId, ProductId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self { Self::Backend(error.to_string()) }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self { Self::Corrupt(error.to_string()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(ProductId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
    Decremented { remaining: i64 },
    Insufficient { available: i64 },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError>;
}

/// Per-session key/value storage holding opaque JSON values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, session: &SessionId, key: &str, value: Value) -> Result<(), StorageError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Opens a transaction. Dropping it without `commit` discards every write.
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StorageError>;
}

#[async_trait]
pub trait OrderTransaction: Send {
    async fn create_order(&mut self, order: &Order) -> Result<OrderId, StorageError>;
    async fn create_order_items(&mut self, items: &[OrderItem]) -> Result<(), StorageError>;
    async fn create_payment(&mut self, payment: &Payment) -> Result<(), StorageError>;
    /// Decrements stock only if at least `quantity` is on hand.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<StockUpdate, StorageError>;
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}
