//! JSON HTTP surface over the cart service and checkout coordinator.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::domain::aggregates::CartError;
use crate::domain::pricing::{CartTotals, PricingError};
use crate::domain::value_objects::{OrderId, ProductId, SessionId, SessionIdError, UserId};
use crate::services::{CartService, CartServiceError, CartSummary, CartView, CheckoutCoordinator, CheckoutError, CheckoutRequest};

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub checkout: Arc<CheckoutCoordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-checkout"})) }))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/totals", get(cart_totals))
        .route("/api/v1/cart/:session/items", post(add_to_cart))
        .route("/api/v1/cart/:session/items/:product_id", patch(update_cart_item).delete(remove_from_cart))
        .route("/api/v1/checkout", post(checkout))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Session(SessionIdError),
    Cart(CartServiceError),
    Checkout(CheckoutError),
}

impl From<SessionIdError> for ApiError { fn from(e: SessionIdError) -> Self { Self::Session(e) } }
impl From<CartServiceError> for ApiError { fn from(e: CartServiceError) -> Self { Self::Cart(e) } }
impl From<CheckoutError> for ApiError { fn from(e: CheckoutError) -> Self { Self::Checkout(e) } }
impl From<validator::ValidationErrors> for ApiError { fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) } }

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) | Self::Session(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
            Self::Cart(e) => match e {
                CartServiceError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
                CartServiceError::ProductUnavailable(_) => (StatusCode::CONFLICT, "product_unavailable"),
                CartServiceError::Cart(CartError::InvalidPrice(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_price"),
                CartServiceError::Cart(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_quantity"),
                CartServiceError::Pricing(PricingError::MissingPrice(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "missing_price"),
                CartServiceError::Pricing(PricingError::Overflow) => (StatusCode::UNPROCESSABLE_ENTITY, "amount_out_of_range"),
                CartServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
            },
            Self::Checkout(e) => match e {
                CheckoutError::EmptyCart => (StatusCode::UNPROCESSABLE_ENTITY, "empty_cart"),
                CheckoutError::MissingShippingAddress => (StatusCode::UNPROCESSABLE_ENTITY, "missing_shipping_address"),
                CheckoutError::InvalidPaymentMethod(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_payment_method"),
                CheckoutError::InsufficientStock(_) => (StatusCode::CONFLICT, "insufficient_stock"),
                CheckoutError::MissingPrice(_) => (StatusCode::UNPROCESSABLE_ENTITY, "missing_price"),
                CheckoutError::AmountOutOfRange => (StatusCode::UNPROCESSABLE_ENTITY, "amount_out_of_range"),
                CheckoutError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
                CheckoutError::Catalog(_) => (StatusCode::INTERNAL_SERVER_ERROR, "catalog_failure"),
                CheckoutError::Persistence(_) | CheckoutError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure"),
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(m) => m.clone(),
            Self::Session(e) => e.to_string(),
            Self::Cart(CartServiceError::Storage(_)) | Self::Checkout(CheckoutError::Persistence(_) | CheckoutError::Session(_) | CheckoutError::Catalog(_)) => {
                "storage is temporarily unavailable, please retry".to_string()
            }
            Self::Cart(e) => e.to_string(),
            Self::Checkout(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        let mut body = json!({"error": code, "message": self.message()});
        if let Self::Checkout(CheckoutError::InsufficientStock(shortages)) = &self {
            body["shortages"] = json!(shortages);
        }
        (status, Json(body)).into_response()
    }
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(s.carts.view(&SessionId::new(session)?).await?))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode, ApiError> {
    s.carts.clear_cart(&SessionId::new(session)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cart_totals(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartTotals>, ApiError> {
    Ok(Json(s.carts.cart_totals(&SessionId::new(session)?).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: i64,
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 { 1 }

async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> Result<Json<CartSummary>, ApiError> {
    r.validate()?;
    let session = SessionId::new(session)?;
    Ok(Json(s.carts.add_to_cart(&session, ProductId::new(r.product_id), r.quantity).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = -1000, max = 1000))]
    pub delta: i64,
}

async fn update_cart_item(
    State(s): State<AppState>,
    Path((session, product_id)): Path<(String, i64)>,
    Json(r): Json<UpdateCartItemRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    r.validate()?;
    let session = SessionId::new(session)?;
    Ok(Json(s.carts.update_cart_item(&session, ProductId::new(product_id), r.delta).await?))
}

async fn remove_from_cart(State(s): State<AppState>, Path((session, product_id)): Path<(String, i64)>) -> Result<Json<CartSummary>, ApiError> {
    let session = SessionId::new(session)?;
    Ok(Json(s.carts.remove_from_cart(&session, ProductId::new(product_id)).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    pub session_id: String,
    pub user_id: i64,
    #[validate(length(max = 2000))]
    pub shipping_address: String,
    pub payment_method: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
}

async fn checkout(State(s): State<AppState>, Json(r): Json<CheckoutBody>) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    r.validate()?;
    let request = CheckoutRequest {
        session_id: SessionId::new(r.session_id)?,
        user_id: UserId::new(r.user_id),
        shipping_address: r.shipping_address,
        payment_method: r.payment_method,
    };
    let order_id = s.checkout.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(CheckoutResponse { order_id })))
}
