//! Price lookups supplied by the caller.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Synchronous last-price lookup. `None` means no usable price.
pub trait PriceFeed {
    fn price(&self, symbol: &str) -> Option<Decimal>;
}

impl PriceFeed for BTreeMap<String, Decimal> {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied().filter(|p| *p > Decimal::ZERO)
    }
}

impl PriceFeed for HashMap<String, Decimal> {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied().filter(|p| *p > Decimal::ZERO)
    }
}

/// Last known prices, kept by the engine between updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    prices: BTreeMap<String, Decimal>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price. Non-positive prices are refused.
    pub fn set(&mut self, symbol: &str, price: Decimal, at: DateTime<Utc>) -> bool {
        if price <= Decimal::ZERO {
            return false;
        }
        self.prices.insert(symbol.to_uppercase(), price);
        self.updated_at = Some(at);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.prices.iter().map(|(s, p)| (s.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl PriceFeed for PriceBook {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.price(&symbol.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_book() {
        let mut book = PriceBook::new();
        assert!(book.set("aapl", dec!(150.25), Utc::now()));
        assert!(!book.set("BAD", dec!(0), Utc::now()));
        assert!(!book.set("NEG", dec!(-1), Utc::now()));

        assert_eq!(book.price("AAPL"), Some(dec!(150.25)));
        assert_eq!(book.price("aapl"), Some(dec!(150.25)));
        assert_eq!(book.price("BAD"), None);
        assert_eq!(book.len(), 1);
        assert!(book.updated_at().is_some());
    }

    #[test]
    fn test_map_feeds_hide_unusable_prices() {
        let mut map = HashMap::new();
        map.insert("ZERO".to_string(), Decimal::ZERO);
        map.insert("MSFT".to_string(), dec!(400));

        assert_eq!(map.price("ZERO"), None);
        assert_eq!(map.price("MSFT"), Some(dec!(400)));
        assert_eq!(map.price("NONE"), None);
    }
}
