//! Session cart service.
//!
//! Loads the cart from the session store, applies one change and writes it
//! back before returning. Reads never write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::aggregates::{Cart, CartError};
use crate::domain::pricing::{CartTotals, LinePricing, PricingEngine, PricingError};
use crate::domain::value_objects::{Money, ProductId, SessionId};
use crate::ports::{CatalogError, ProductCatalog, SessionStore, StorageError};

/// Session key the cart is stored under.
pub const CART_SESSION_KEY: &str = "cart";

#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),
    #[error("cart storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl From<CatalogError> for CartServiceError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound(id) => Self::ProductNotFound(id),
            CatalogError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Cart contents priced at the captured prices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub lines: Vec<LinePricing>,
    pub line_count: usize,
    pub total_quantity: u64,
    pub totals: CartTotals,
}

/// Display line enriched with live product details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    /// `None` when the product has left the catalog.
    pub name: Option<String>,
    pub stock: Option<i64>,
    pub quantity: u32,
    pub unit_price: Money,
    pub sale_price: Option<Money>,
    pub effective_price: Money,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub line_count: usize,
    pub totals: CartTotals,
}

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn ProductCatalog>,
    sessions: Arc<dyn SessionStore>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn ProductCatalog>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { catalog, sessions }
    }

    /// Returns the session's cart, or an empty one. Never writes.
    pub async fn load(&self, session: &SessionId) -> Result<Cart, StorageError> {
        match self.sessions.get(session, CART_SESSION_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Cart::new()),
        }
    }

    async fn save(&self, session: &SessionId, cart: &Cart) -> Result<(), StorageError> {
        let value = serde_json::to_value(cart)?;
        self.sessions.set(session, CART_SESSION_KEY, value).await
    }

    #[instrument(skip(self), fields(session = %session))]
    pub async fn add_to_cart(&self, session: &SessionId, product_id: ProductId, quantity: i64) -> Result<CartSummary, CartServiceError> {
        let mut cart = self.load(session).await?;
        self.apply_from_catalog(&mut cart, product_id, quantity).await?;
        self.save(session, &cart).await?;
        debug!(lines = cart.line_count(), "cart updated");
        summarize(&cart)
    }

    /// Applies a quantity delta. Existing lines keep their captured prices;
    /// a positive delta on an absent product behaves like an add.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn update_cart_item(&self, session: &SessionId, product_id: ProductId, delta: i64) -> Result<CartSummary, CartServiceError> {
        let mut cart = self.load(session).await?;
        if cart.contains(product_id) {
            cart.adjust_quantity(product_id, delta)?;
        } else if delta > 0 {
            self.apply_from_catalog(&mut cart, product_id, delta).await?;
        } else {
            return summarize(&cart);
        }
        self.save(session, &cart).await?;
        summarize(&cart)
    }

    #[instrument(skip(self), fields(session = %session))]
    pub async fn remove_from_cart(&self, session: &SessionId, product_id: ProductId) -> Result<CartSummary, CartServiceError> {
        let mut cart = self.load(session).await?;
        if cart.remove_item(product_id) {
            self.save(session, &cart).await?;
            debug!("cart line removed");
        }
        summarize(&cart)
    }

    #[instrument(skip(self), fields(session = %session))]
    pub async fn clear_cart(&self, session: &SessionId) -> Result<(), CartServiceError> {
        self.save(session, &Cart::new()).await?;
        Ok(())
    }

    /// Takes ordered quantities out of the session's current cart. Lines
    /// added after the order was priced stay in the cart.
    #[instrument(skip(self, ordered), fields(session = %session))]
    pub async fn remove_ordered(&self, session: &SessionId, ordered: &[LinePricing]) -> Result<(), CartServiceError> {
        let mut cart = self.load(session).await?;
        let mut changed = false;
        for line in ordered.iter() {
            if !cart.contains(line.product_id) {
                continue;
            }
            cart.adjust_quantity(line.product_id, -i64::from(line.quantity))?;
            changed = true;
        }
        if changed {
            self.save(session, &cart).await?;
        }
        Ok(())
    }

    pub async fn cart_totals(&self, session: &SessionId) -> Result<CartTotals, CartServiceError> {
        let cart = self.load(session).await?;
        Ok(PricingEngine::price(&cart, &cart)?.totals)
    }

    /// Cart lines with the live product name and stock attached.
    /// The stored cart is left as it is.
    pub async fn view(&self, session: &SessionId) -> Result<CartView, CartServiceError> {
        let cart = self.load(session).await?;
        let pricing = PricingEngine::price(&cart, &cart)?;

        let mut lines = Vec::with_capacity(pricing.lines.len());
        for line in pricing.lines {
            let product = match self.catalog.lookup(line.product_id).await {
                Ok(product) => Some(product),
                Err(CatalogError::NotFound(_)) => None,
                Err(CatalogError::Storage(e)) => return Err(e.into()),
            };
            let sale_price = cart.item(line.product_id).and_then(|i| i.sale_price);
            lines.push(CartLineView {
                product_id: line.product_id,
                name: product.as_ref().map(|p| p.name.clone()),
                stock: product.as_ref().map(|p| p.stock),
                quantity: line.quantity,
                unit_price: line.list_price,
                sale_price,
                effective_price: line.effective_price,
                line_total: line.line_total,
            });
        }

        Ok(CartView { lines, line_count: cart.line_count(), totals: pricing.totals })
    }

    async fn apply_from_catalog(&self, cart: &mut Cart, product_id: ProductId, delta: i64) -> Result<(), CartServiceError> {
        let product = self.catalog.lookup(product_id).await?;
        if delta > 0 && !product.is_available() {
            return Err(CartServiceError::ProductUnavailable(product_id));
        }
        cart.add_item(product_id, delta, product.price, product.sale_price)?;
        Ok(())
    }
}

fn summarize(cart: &Cart) -> Result<CartSummary, CartServiceError> {
    let pricing = PricingEngine::price(cart, cart)?;
    Ok(CartSummary {
        lines: pricing.lines,
        line_count: cart.line_count(),
        total_quantity: cart.total_quantity(),
        totals: pricing.totals,
    })
}
