//! Produced interface: cart operations and checkout.
pub mod cart;
pub mod checkout;

pub use cart::{CartLineView, CartService, CartServiceError, CartSummary, CartView, CART_SESSION_KEY};
pub use checkout::{CheckoutCoordinator, CheckoutError, CheckoutRequest, CheckoutSettings, CheckoutStage, StockShortage};
