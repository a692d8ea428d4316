//! API types for the tier-obfuscated order book
//!
//! The book never exposes a price or size; each level is a count of open
//! orders in one volume tier on one side

use circuit_types::{Amount, OrderSide, VolumeTier};
use serde::{Deserialize, Serialize};

/// One tier on one side of the book
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLevel {
    /// The volume tier
    pub tier: VolumeTier,
    /// The number of open orders in the tier
    pub order_count: usize,
    /// The smallest total volume consistent with the count
    pub min_volume: Amount,
    /// The largest total volume consistent with the count
    pub max_volume: Amount,
}

impl TierLevel {
    /// An empty level for the given tier
    pub fn empty(tier: VolumeTier) -> Self {
        Self { tier, order_count: 0, min_volume: 0, max_volume: 0 }
    }

    /// Add an order to the level
    pub fn add_order(&mut self) {
        self.order_count += 1;
        self.min_volume = self.min_volume.saturating_add(self.tier.min_size());
        self.max_volume = self.max_volume.saturating_add(self.tier.max_size());
    }
}

/// The tier-obfuscated order book
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOrderBook {
    /// The buy side levels, one per tier in ascending order
    pub buys: Vec<TierLevel>,
    /// The sell side levels, one per tier in ascending order
    pub sells: Vec<TierLevel>,
}

impl Default for ApiOrderBook {
    fn default() -> Self {
        let levels = || VolumeTier::ALL.iter().map(|t| TierLevel::empty(*t)).collect();
        Self { buys: levels(), sells: levels() }
    }
}

impl ApiOrderBook {
    /// Add an open order to the book
    pub fn add_order(&mut self, side: OrderSide, tier: VolumeTier) {
        let levels = match side {
            OrderSide::Buy => &mut self.buys,
            OrderSide::Sell => &mut self.sells,
        };
        levels[tier.index()].add_order();
    }

    /// The level of the given side and tier
    pub fn level(&self, side: OrderSide, tier: VolumeTier) -> &TierLevel {
        match side {
            OrderSide::Buy => &self.buys[tier.index()],
            OrderSide::Sell => &self.sells[tier.index()],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests accumulating orders into the book
    #[test]
    fn test_add_orders() {
        let mut book = ApiOrderBook::default();
        book.add_order(OrderSide::Buy, VolumeTier::Medium);
        book.add_order(OrderSide::Buy, VolumeTier::Medium);
        book.add_order(OrderSide::Sell, VolumeTier::Whale);

        let level = book.level(OrderSide::Buy, VolumeTier::Medium);
        assert_eq!(level.order_count, 2);
        assert_eq!(level.min_volume, 2 * VolumeTier::Medium.min_size());
        assert_eq!(book.level(OrderSide::Sell, VolumeTier::Whale).order_count, 1);
        assert_eq!(book.level(OrderSide::Sell, VolumeTier::Small).order_count, 0);
    }
}
