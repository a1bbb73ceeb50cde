//! Checkout coordinator.
//!
//! Turns a session cart into an order in four stages:
//!
//! ```text
//! Validating ──► Reserving ──► Persisting ──► Finalized
//!     │              │              │
//!     └──► Rejected ◄┘              └──► Failed (rolled back)
//! ```
//!
//! Nothing is written before Persisting, and Persisting is one transaction.
//! The ordered lines are only taken out of the cart once that transaction
//! has committed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::aggregates::{Cart, Order, OrderItem, Payment, ProductSnapshot};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::domain::pricing::{CartPricing, PricingEngine, PricingError};
use crate::domain::value_objects::{OrderId, PaymentMethod, ProductId, SessionId, UserId};
use crate::ports::{CatalogError, EventPublisher, OrderRepository, ProductCatalog, StockUpdate, StorageError};
use crate::services::cart::CartService;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutStage { Validating, Reserving, Persisting, Finalized }

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Reserving => "reserving",
            Self::Persisting => "persisting",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub name: String,
    pub requested: u32,
    pub available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("shipping address is required")]
    MissingShippingAddress,
    #[error("payment method `{0}` is not accepted")]
    InvalidPaymentMethod(String),
    #[error("insufficient stock for product(s) {}", shortage_ids(.0))]
    InsufficientStock(Vec<StockShortage>),
    #[error("product {0} has no price")]
    MissingPrice(ProductId),
    #[error("cart amount is out of range")]
    AmountOutOfRange,
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("catalog could not be read: {0}")]
    Catalog(StorageError),
    #[error("order could not be stored: {0}")]
    Persistence(StorageError),
    #[error("cart could not be read: {0}")]
    Session(StorageError),
}

fn shortage_ids(shortages: &[StockShortage]) -> String {
    shortages.iter().map(|s| s.product_id.to_string()).collect::<Vec<_>>().join(", ")
}

impl CheckoutError {
    /// Storage failures leave nothing behind and may be retried as is.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Persistence(_) | Self::Session(_) | Self::Catalog(_)) }
}

impl From<PricingError> for CheckoutError {
    fn from(error: PricingError) -> Self {
        match error {
            PricingError::MissingPrice(id) => Self::MissingPrice(id),
            PricingError::Overflow => Self::AmountOutOfRange,
        }
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound(id) => Self::ProductNotFound(id),
            CatalogError::Storage(e) => Self::Catalog(e),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub shipping_address: String,
    pub payment_method: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub accepted_payment_methods: Vec<PaymentMethod>,
}

impl Default for CheckoutSettings {
    fn default() -> Self { Self { accepted_payment_methods: PaymentMethod::iter().collect() } }
}

#[derive(Clone)]
pub struct CheckoutCoordinator {
    carts: CartService,
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventPublisher>,
    settings: CheckoutSettings,
}

struct Validated {
    shipping_address: String,
    payment_method: PaymentMethod,
    pricing: CartPricing,
}

struct Decrement {
    product_id: ProductId,
    quantity: u32,
    remaining: i64,
}

enum PersistError {
    Storage(StorageError),
    Stock(Vec<StockShortage>),
}

impl From<StorageError> for PersistError {
    fn from(error: StorageError) -> Self { Self::Storage(error) }
}

impl CheckoutCoordinator {
    pub fn new(
        carts: CartService,
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn EventPublisher>,
        settings: CheckoutSettings,
    ) -> Self {
        Self { carts, catalog, orders, events, settings }
    }

    #[instrument(skip(self, request), fields(session = %request.session_id, user = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<OrderId, CheckoutError> {
        let cart = self.carts.load(&request.session_id).await.map_err(CheckoutError::Session)?;

        debug!(stage = %CheckoutStage::Validating);
        let validated = self.validate(&cart, &request).inspect_err(|e| rejected(CheckoutStage::Validating, e))?;

        debug!(stage = %CheckoutStage::Reserving);
        let products = self.reserve(&cart).await.inspect_err(|e| rejected(CheckoutStage::Reserving, e))?;

        debug!(stage = %CheckoutStage::Persisting);
        let order = Order::place(
            OrderId::generate(),
            request.user_id,
            validated.pricing.totals.total,
            validated.payment_method,
            validated.shipping_address,
        );
        let (order_id, decrements) = match self.persist(&order, &validated.pricing, &products).await {
            Ok(persisted) => persisted,
            Err(PersistError::Stock(shortages)) => {
                let error = CheckoutError::InsufficientStock(shortages);
                rejected(CheckoutStage::Persisting, &error);
                return Err(error);
            }
            Err(PersistError::Storage(e)) => {
                warn!(stage = %CheckoutStage::Persisting, error = %e, "checkout failed, transaction rolled back");
                return Err(CheckoutError::Persistence(e));
            }
        };

        debug!(stage = %CheckoutStage::Finalized);
        if let Err(e) = self.carts.remove_ordered(&request.session_id, &validated.pricing.lines).await {
            warn!(order_id = %order_id, error = %e, "order placed but ordered lines could not be taken out of the cart");
        }
        self.publish_placed(&order, validated.pricing.lines.len(), decrements).await;

        info!(order_id = %order_id, total = %order.total_amount, "order placed");
        Ok(order_id)
    }

    fn validate(&self, cart: &Cart, request: &CheckoutRequest) -> Result<Validated, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping_address = request.shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(CheckoutError::MissingShippingAddress);
        }

        let payment_method = request
            .payment_method
            .trim()
            .parse::<PaymentMethod>()
            .ok()
            .filter(|m| self.settings.accepted_payment_methods.contains(m))
            .ok_or_else(|| CheckoutError::InvalidPaymentMethod(request.payment_method.clone()))?;

        let pricing = PricingEngine::price(cart, cart)?;

        Ok(Validated { shipping_address: shipping_address.to_string(), payment_method, pricing })
    }

    /// Re-reads stock for every line and reports all shortages at once.
    async fn reserve(&self, cart: &Cart) -> Result<HashMap<ProductId, ProductSnapshot>, CheckoutError> {
        let mut products = HashMap::with_capacity(cart.line_count());
        let mut shortages = Vec::new();

        for (product_id, item) in cart.items() {
            let product = self.catalog.lookup(product_id).await?;
            if !product.has_stock_for(item.quantity) {
                shortages.push(StockShortage {
                    product_id,
                    name: product.name.clone(),
                    requested: item.quantity,
                    available: product.stock,
                });
            }
            products.insert(product_id, product);
        }

        if shortages.is_empty() { Ok(products) } else { Err(CheckoutError::InsufficientStock(shortages)) }
    }

    /// Writes the order, its items, the stock decrements and the payment in
    /// one transaction. Returning early drops the transaction uncommitted.
    async fn persist(
        &self,
        order: &Order,
        pricing: &CartPricing,
        products: &HashMap<ProductId, ProductSnapshot>,
    ) -> Result<(OrderId, Vec<Decrement>), PersistError> {
        let mut tx = self.orders.begin().await?;

        let order_id = tx.create_order(order).await?;
        let items: Vec<OrderItem> = pricing.lines.iter().map(|line| OrderItem::from_line(order_id, line)).collect();
        tx.create_order_items(&items).await?;

        let mut decrements = Vec::with_capacity(items.len());
        let mut shortages = Vec::new();
        for item in &items {
            match tx.decrement_stock(item.product_id, item.quantity).await? {
                StockUpdate::Decremented { remaining } => {
                    decrements.push(Decrement { product_id: item.product_id, quantity: item.quantity, remaining });
                }
                StockUpdate::Insufficient { available } => shortages.push(StockShortage {
                    product_id: item.product_id,
                    name: products.get(&item.product_id).map(|p| p.name.clone()).unwrap_or_default(),
                    requested: item.quantity,
                    available,
                }),
            }
        }
        if !shortages.is_empty() {
            return Err(PersistError::Stock(shortages));
        }

        tx.create_payment(&Payment::pending_for(order)).await?;
        tx.commit().await?;

        Ok((order_id, decrements))
    }

    async fn publish_placed(&self, order: &Order, item_count: usize, decrements: Vec<Decrement>) {
        let placed = DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id,
            user_id: order.user_id,
            total: order.total_amount,
            payment_method: order.payment_method,
            item_count,
        });
        let stock_events = decrements.into_iter().map(|d| {
            DomainEvent::Product(ProductEvent::StockDecremented {
                product_id: d.product_id,
                quantity: d.quantity,
                remaining: d.remaining,
            })
        });

        for event in std::iter::once(placed).chain(stock_events) {
            if let Err(e) = self.events.publish(event).await {
                warn!(order_id = %order.id, error = %e, "failed to publish checkout event");
            }
        }
    }
}

fn rejected(stage: CheckoutStage, error: &CheckoutError) {
    info!(stage = %stage, reason = %error, "checkout rejected");
}
