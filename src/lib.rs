//! Storefront cart and checkout core
//!
//! Session-backed shopping cart, sale-aware pricing in exact decimals, and
//! atomic conversion of a cart into an order.
//!
//! ## Features
//! - Session cart with prices captured at add time
//! - Subtotal, discount total, discount percentage and total per cart
//! - Checkout that writes order, items, payment and stock decrements in one transaction
//! - Oversell protection through conditional stock decrements
//! - Order events over NATS

pub mod config;
pub mod domain;
pub mod http;
pub mod infrastructure;
pub mod ports;
pub mod services;

pub use config::{Config, ConfigError};
pub use domain::aggregates::{Cart, CartLineItem, Order, OrderItem, Payment, PaymentStatus, ProductSnapshot, ShipmentStatus};
pub use domain::pricing::{CartTotals, PricingEngine};
pub use domain::value_objects::{Money, OrderId, PaymentMethod, Percentage, ProductId, SessionId, UserId};
pub use services::{CartService, CartServiceError, CheckoutCoordinator, CheckoutError, CheckoutRequest};
