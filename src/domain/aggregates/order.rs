//! Order Aggregate
//!
//! Orders are written once at checkout. Only the payment and shipment
//! statuses change afterwards, and those transitions belong to fulfilment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::domain::pricing::LinePricing;
use crate::domain::value_objects::{Money, OrderId, PaymentMethod, ProductId, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShipmentStatus { #[default] Pending, Shipped, Delivered, Canceled }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub shipment_status: ShipmentStatus,
}

impl Order {
    pub fn place(id: OrderId, user_id: UserId, total_amount: Money, payment_method: PaymentMethod, shipping_address: impl Into<String>) -> Self {
        Self {
            id, user_id, created_at: Utc::now(), total_amount, payment_method,
            payment_status: PaymentStatus::Pending, shipping_address: shipping_address.into(),
            shipment_status: ShipmentStatus::Pending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Effective unit price at purchase time.
    pub price: Money,
    pub total_price: Money,
}

impl OrderItem {
    pub fn from_line(order_id: OrderId, line: &LinePricing) -> Self {
        Self {
            order_id, product_id: line.product_id, quantity: line.quantity,
            price: line.effective_price, total_price: line.line_total,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
}

impl Payment {
    pub fn pending_for(order: &Order) -> Self {
        Self {
            order_id: order.id, user_id: order.user_id, payment_method: order.payment_method,
            payment_status: PaymentStatus::Pending, payment_date: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_is_pending() {
        let order = Order::place(OrderId::generate(), UserId::new(7), Money::new(dec!(210.00)), PaymentMethod::Khalti, "Baneshwor, Kathmandu");
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.shipment_status, ShipmentStatus::Pending);
        let payment = Payment::pending_for(&order);
        assert_eq!(payment.order_id, order.id);
        assert_eq!(payment.payment_method, PaymentMethod::Khalti);
        assert_eq!(payment.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_order_item_uses_effective_price() {
        let line = LinePricing {
            product_id: ProductId::new(1), quantity: 2,
            list_price: Money::new(dec!(100)), effective_price: Money::new(dec!(80)),
            line_subtotal: Money::new(dec!(200)), line_total: Money::new(dec!(160)), line_discount: Money::new(dec!(40)),
        };
        let item = OrderItem::from_line(OrderId::generate(), &line);
        assert_eq!(item.price.amount(), dec!(80));
        assert_eq!(item.total_price.amount(), dec!(160));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ShipmentStatus::Canceled.as_ref(), "canceled");
        assert_eq!("completed".parse::<PaymentStatus>().unwrap(), PaymentStatus::Completed);
    }
}
