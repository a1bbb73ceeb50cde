//! Domain events
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, OrderId, PaymentMethod, ProductId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Product(ProductEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, user_id: UserId, total: Money, payment_method: PaymentMethod, item_count: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: ProductId, quantity: u32, remaining: i64 },
}

impl DomainEvent {
    /// Subject suffix used when publishing.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Product(ProductEvent::StockDecremented { .. }) => "product.stock_decremented",
        }
    }
}
