//! Product snapshot as seen by the cart and checkout

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Availability { #[default] Available, Unavailable }

/// Read-only view of a catalog product at lookup time.
///
/// `price` is optional because the catalog does not enforce it; the cart
/// refuses such products and pricing treats them as a data-integrity failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Option<Money>,
    pub sale_price: Option<Money>,
    pub stock: i64,
    #[serde(default)]
    pub availability: Availability,
}

impl ProductSnapshot {
    pub fn is_available(&self) -> bool { self.availability == Availability::Available }
    pub fn has_stock_for(&self, quantity: u32) -> bool { self.stock >= i64::from(quantity) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(stock: i64, availability: Availability) -> ProductSnapshot {
        ProductSnapshot { id: ProductId::new(1), name: "Kettle".into(), price: Some(Money::new(dec!(10))), sale_price: None, stock, availability }
    }

    #[test]
    fn test_stock_check() {
        let p = product(2, Availability::Available);
        assert!(p.has_stock_for(2));
        assert!(!p.has_stock_for(3));
        assert!(!product(-1, Availability::Available).has_stock_for(0));
    }

    #[test]
    fn test_availability_defaults_to_available() {
        let p: ProductSnapshot = serde_json::from_str(r#"{"id": 1, "name": "Kettle", "price": "10", "sale_price": null, "stock": 0}"#).unwrap();
        assert!(p.is_available());
        assert!(!product(5, Availability::Unavailable).is_available());
    }
}
