//! Sale-aware cart pricing.
//!
//! Pure computation over a cart and a price source. A sale price only counts
//! when it is not negative and strictly below the list price. Sums are exact;
//! the discount percentage is the only rounded figure (half-up, two places).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Cart, ProductSnapshot};
use crate::domain::value_objects::{Money, Percentage, ProductId};

/// List and sale price for one product.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricePoint {
    pub price: Option<Money>,
    pub sale_price: Option<Money>,
}

/// Where the engine reads prices from.
pub trait PriceLookup {
    fn price_point(&self, product_id: ProductId) -> Option<PricePoint>;
}

/// Prices captured in the cart when each product was added.
impl PriceLookup for Cart {
    fn price_point(&self, product_id: ProductId) -> Option<PricePoint> {
        self.item(product_id).map(|i| PricePoint { price: Some(i.unit_price), sale_price: i.sale_price })
    }
}

/// Live catalog prices.
impl PriceLookup for HashMap<ProductId, ProductSnapshot> {
    fn price_point(&self, product_id: ProductId) -> Option<PricePoint> {
        self.get(&product_id).map(|p| PricePoint { price: p.price, sale_price: p.sale_price })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub product_id: ProductId,
    pub quantity: u32,
    pub list_price: Money,
    pub effective_price: Money,
    pub line_subtotal: Money,
    pub line_total: Money,
    pub line_discount: Money,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub discount_percentage: Percentage,
    pub total: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPricing {
    pub lines: Vec<LinePricing>,
    pub totals: CartTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("product {0} has no price")]
    MissingPrice(ProductId),
    #[error("cart amount is out of range")]
    Overflow,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PricingEngine;

impl PricingEngine {
    /// Prices a single line.
    pub fn line(product_id: ProductId, quantity: u32, point: PricePoint) -> Result<LinePricing, PricingError> {
        let list_price = point.price.ok_or(PricingError::MissingPrice(product_id))?;
        let sale = point.sale_price.filter(|sale| !sale.is_negative() && *sale < list_price);

        let effective_price = sale.unwrap_or(list_price);
        let line_subtotal = list_price.checked_times(quantity).ok_or(PricingError::Overflow)?;
        let line_total = effective_price.checked_times(quantity).ok_or(PricingError::Overflow)?;

        Ok(LinePricing {
            product_id,
            quantity,
            list_price,
            effective_price,
            line_subtotal,
            line_total,
            line_discount: line_subtotal - line_total,
        })
    }

    /// Prices every line of `cart` using `lookup` and aggregates the totals.
    pub fn price<L: PriceLookup + ?Sized>(cart: &Cart, lookup: &L) -> Result<CartPricing, PricingError> {
        let lines = cart
            .items()
            .map(|(id, item)| {
                let point = lookup.price_point(id).ok_or(PricingError::MissingPrice(id))?;
                Self::line(id, item.quantity, point)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let totals = Self::totals(&lines)?;
        Ok(CartPricing { lines, totals })
    }

    pub fn totals(lines: &[LinePricing]) -> Result<CartTotals, PricingError> {
        let sum = |field: fn(&LinePricing) -> Money| {
            lines
                .iter()
                .try_fold(Money::ZERO, |acc, line| acc.checked_add(field(line)))
                .ok_or(PricingError::Overflow)
        };
        let subtotal = sum(|l| l.line_subtotal)?;
        let discount_total = sum(|l| l.line_discount)?;
        let total = sum(|l| l.line_total)?;

        Ok(CartTotals {
            subtotal,
            discount_total,
            discount_percentage: Percentage::of(discount_total, subtotal),
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Availability;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money(v: Decimal) -> Money { Money::new(v) }

    fn point(price: Decimal, sale: Option<Decimal>) -> PricePoint {
        PricePoint { price: Some(money(price)), sale_price: sale.map(money) }
    }

    fn sample_cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(1), 2, Some(money(dec!(100.00))), Some(money(dec!(80.00)))).unwrap();
        cart.add_item(ProductId::new(2), 1, Some(money(dec!(50.00))), None).unwrap();
        cart
    }

    #[test]
    fn test_mixed_sale_cart() {
        let pricing = PricingEngine::price(&sample_cart(), &sample_cart()).unwrap();
        let totals = pricing.totals;
        assert_eq!(totals.subtotal.amount(), dec!(250.00));
        assert_eq!(totals.discount_total.amount(), dec!(40.00));
        assert_eq!(totals.total.amount(), dec!(210.00));
        assert_eq!(totals.discount_percentage.value().to_string(), "16.00");
        assert_eq!(pricing.lines.len(), 2);
    }

    #[test]
    fn test_total_is_subtotal_minus_discount() {
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(1), 3, Some(money(dec!(19.99))), Some(money(dec!(14.49)))).unwrap();
        cart.add_item(ProductId::new(2), 7, Some(money(dec!(0.33))), Some(money(dec!(0.40)))).unwrap();
        cart.add_item(ProductId::new(3), 1, Some(money(dec!(1250.10))), Some(money(dec!(0)))).unwrap();
        let totals = PricingEngine::price(&cart, &cart).unwrap().totals;
        assert_eq!(totals.total, totals.subtotal - totals.discount_total);
        assert!(totals.discount_percentage.value() >= Decimal::ZERO);
        assert!(totals.discount_percentage.value() <= Decimal::ONE_HUNDRED);
        assert_eq!(totals.discount_percentage.value().scale(), 2);
    }

    #[test]
    fn test_sale_at_or_above_price_is_not_a_discount() {
        let line = PricingEngine::line(ProductId::new(1), 4, point(dec!(10), Some(dec!(10)))).unwrap();
        assert_eq!(line.line_discount, Money::ZERO);
        assert_eq!(line.effective_price.amount(), dec!(10));
        let line = PricingEngine::line(ProductId::new(1), 4, point(dec!(10), Some(dec!(11)))).unwrap();
        assert_eq!(line.line_discount, Money::ZERO);
        assert_eq!(line.line_total.amount(), dec!(40));
    }

    #[test]
    fn test_qualifying_sale_discount() {
        let line = PricingEngine::line(ProductId::new(1), 3, point(dec!(10), Some(dec!(7.25)))).unwrap();
        assert_eq!(line.line_discount.amount(), dec!(8.25));
        assert_eq!(line.line_subtotal.amount(), dec!(30));
        assert_eq!(line.line_total.amount(), dec!(21.75));
        let free = PricingEngine::line(ProductId::new(2), 2, point(dec!(5), Some(dec!(0)))).unwrap();
        assert_eq!(free.line_discount.amount(), dec!(10));
        assert_eq!(free.line_total, Money::ZERO);
    }

    #[test]
    fn test_negative_sale_price_is_ignored() {
        let line = PricingEngine::line(ProductId::new(1), 2, point(dec!(10.00), Some(dec!(-5.00)))).unwrap();
        assert_eq!(line.effective_price.amount(), dec!(10.00));
        assert_eq!(line.line_discount, Money::ZERO);
        assert_eq!(line.line_total.amount(), dec!(20.00));

        let cart = sample_cart();
        let live: HashMap<_, _> = [1, 2]
            .into_iter()
            .map(|id| {
                let id = ProductId::new(id);
                (id, ProductSnapshot {
                    id, name: format!("P{id}"), price: Some(money(dec!(10.00))), sale_price: Some(money(dec!(-5.00))),
                    stock: 10, availability: Availability::Available,
                })
            })
            .collect();
        let totals = PricingEngine::price(&cart, &live).unwrap().totals;
        assert_eq!(totals.total.amount(), dec!(30.00));
        assert_eq!(totals.discount_total, Money::ZERO);
        assert_eq!(totals.discount_percentage.value().to_string(), "0.00");
    }

    #[test]
    fn test_amounts_out_of_range_fail() {
        let huge = point(Decimal::MAX, None);
        assert_eq!(PricingEngine::line(ProductId::new(1), 2, huge), Err(PricingError::Overflow));

        let line = PricingEngine::line(ProductId::new(1), 1, huge).unwrap();
        assert_eq!(PricingEngine::totals(&[line.clone(), line]), Err(PricingError::Overflow));
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let totals = PricingEngine::price(&Cart::new(), &Cart::new()).unwrap().totals;
        assert_eq!(totals, CartTotals::default());
        assert_eq!(totals.discount_percentage.value().to_string(), "0.00");
    }

    #[test]
    fn test_missing_price_fails_fast() {
        let cart = sample_cart();
        let mut live = HashMap::new();
        live.insert(ProductId::new(1), ProductSnapshot {
            id: ProductId::new(1), name: "Lamp".into(), price: None, sale_price: None, stock: 5,
            availability: Availability::Available,
        });
        let err = PricingEngine::price(&cart, &live).unwrap_err();
        assert_eq!(err, PricingError::MissingPrice(ProductId::new(1)));
    }

    #[test]
    fn test_live_prices_can_differ_from_captured() {
        let cart = sample_cart();
        let live: HashMap<_, _> = [(1, dec!(90), None), (2, dec!(50), Some(dec!(45)))]
            .into_iter()
            .map(|(id, price, sale): (i64, Decimal, Option<Decimal>)| {
                let id = ProductId::new(id);
                (id, ProductSnapshot {
                    id, name: format!("P{id}"), price: Some(money(price)), sale_price: sale.map(money),
                    stock: 10, availability: Availability::Available,
                })
            })
            .collect();
        let totals = PricingEngine::price(&cart, &live).unwrap().totals;
        assert_eq!(totals.subtotal.amount(), dec!(230));
        assert_eq!(totals.total.amount(), dec!(225));
    }
}
