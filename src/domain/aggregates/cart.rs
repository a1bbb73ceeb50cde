//! Cart Aggregate
//!
//! A session-owned mapping of product to line item. Prices are captured when
//! a product is first added and are not refreshed afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    items: BTreeMap<ProductId, CartLineItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub quantity: u32,
    pub unit_price: Money,
    pub sale_price: Option<Money>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> impl Iterator<Item = (ProductId, &CartLineItem)> + '_ {
        self.items.iter().map(|(id, item)| (*id, item))
    }
    pub fn item(&self, product_id: ProductId) -> Option<&CartLineItem> { self.items.get(&product_id) }
    pub fn contains(&self, product_id: ProductId) -> bool { self.items.contains_key(&product_id) }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    /// Number of distinct products.
    pub fn line_count(&self) -> usize { self.items.len() }
    pub fn total_quantity(&self) -> u64 { self.items.values().map(|i| u64::from(i.quantity)).sum() }

    /// Applies a quantity delta to a product's line.
    ///
    /// A missing line is created at quantity zero with the given prices first.
    /// Lines whose quantity ends at or below zero are removed.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        delta: i64,
        unit_price: Option<Money>,
        sale_price: Option<Money>,
    ) -> Result<(), CartError> {
        let unit_price = match unit_price {
            Some(price) if !price.is_negative() => price,
            _ => return Err(CartError::InvalidPrice(product_id)),
        };
        if sale_price.is_some_and(|sale| sale.is_negative()) {
            return Err(CartError::InvalidPrice(product_id));
        }

        let current = self.items.get(&product_id).map_or(0, |i| i64::from(i.quantity));
        let next = current.saturating_add(delta);
        if next <= 0 {
            self.items.remove(&product_id);
            return Ok(());
        }
        let quantity = u32::try_from(next).map_err(|_| CartError::QuantityTooLarge(product_id))?;

        self.items
            .entry(product_id)
            .or_insert(CartLineItem { quantity: 0, unit_price, sale_price })
            .quantity = quantity;
        Ok(())
    }

    /// Applies a delta to an existing line without touching its captured prices.
    pub fn adjust_quantity(&mut self, product_id: ProductId, delta: i64) -> Result<(), CartError> {
        let item = self.items.get(&product_id).ok_or(CartError::ItemNotFound(product_id))?;
        let (price, sale) = (item.unit_price, item.sale_price);
        self.add_item(product_id, delta, Some(price), sale)
    }

    /// Removes a product's line. Returns whether anything was removed.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool { self.items.remove(&product_id).is_some() }

    pub fn clear(&mut self) { self.items.clear(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("product {0} has no valid price")]
    InvalidPrice(ProductId),
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),
    #[error("quantity for product {0} is too large")]
    QuantityTooLarge(ProductId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: rust_decimal::Decimal) -> Option<Money> { Some(Money::new(v)) }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.add_item(p1, 2, price(dec!(10)), None).unwrap();
        assert_eq!(cart.line_count(), 1);
        cart.add_item(p1, 1, price(dec!(10)), None).unwrap();
        assert_eq!(cart.item(p1).unwrap().quantity, 3); // Merged
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_prices_captured_on_first_add() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.add_item(p1, 1, price(dec!(10)), price(dec!(8))).unwrap();
        cart.add_item(p1, 1, price(dec!(12)), None).unwrap();
        let item = cart.item(p1).unwrap();
        assert_eq!(item.unit_price.amount(), dec!(10));
        assert_eq!(item.sale_price, price(dec!(8)));
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_negative_delta_to_zero_removes_line() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.add_item(p1, 2, price(dec!(5)), None).unwrap();
        cart.add_item(p1, -2, price(dec!(5)), None).unwrap();
        assert!(!cart.contains(p1));
        cart.add_item(p1, 1, price(dec!(5)), None).unwrap();
        cart.add_item(p1, -7, price(dec!(5)), None).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_non_positive_delta_on_absent_line_leaves_no_entry() {
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(9), 0, price(dec!(5)), None).unwrap();
        cart.add_item(ProductId::new(9), -1, price(dec!(5)), None).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_missing_price_rejected() {
        let mut cart = Cart::new();
        let err = cart.add_item(ProductId::new(3), 1, None, None).unwrap_err();
        assert_eq!(err, CartError::InvalidPrice(ProductId::new(3)));
        let err = cart.add_item(ProductId::new(3), 1, price(dec!(-1)), None).unwrap_err();
        assert_eq!(err, CartError::InvalidPrice(ProductId::new(3)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_negative_sale_price_rejected() {
        let mut cart = Cart::new();
        let err = cart.add_item(ProductId::new(3), 2, price(dec!(10.00)), price(dec!(-5.00))).unwrap_err();
        assert_eq!(err, CartError::InvalidPrice(ProductId::new(3)));
        assert!(cart.is_empty());
        cart.add_item(ProductId::new(3), 2, price(dec!(10.00)), price(dec!(0))).unwrap();
        assert_eq!(cart.item(ProductId::new(3)).unwrap().sale_price, price(dec!(0)));
    }

    #[test]
    fn test_add_then_remove_restores_empty_cart() {
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(4), 3, price(dec!(1.50)), None).unwrap();
        assert!(cart.remove_item(ProductId::new(4)));
        assert_eq!(cart, Cart::new());
        assert!(!cart.remove_item(ProductId::new(4)));
    }

    #[test]
    fn test_adjust_quantity_keeps_prices() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.add_item(p1, 1, price(dec!(10)), price(dec!(7))).unwrap();
        cart.adjust_quantity(p1, 4).unwrap();
        assert_eq!(cart.item(p1).unwrap().quantity, 5);
        assert_eq!(cart.adjust_quantity(ProductId::new(2), 1), Err(CartError::ItemNotFound(ProductId::new(2))));
    }

    #[test]
    fn test_session_blob_uses_string_keys() {
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(42), 2, price(dec!(100.00)), price(dec!(80.00))).unwrap();
        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(value["items"]["42"]["quantity"], 2);
        assert_eq!(value["items"]["42"]["unit_price"], "100.00");
        let back: Cart = serde_json::from_value(value).unwrap();
        assert_eq!(back, cart);
    }
}
