//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Availability, ProductSnapshot};
pub use order::{Order, OrderItem, Payment, PaymentStatus, ShipmentStatus};
pub use cart::{Cart, CartError, CartLineItem};
