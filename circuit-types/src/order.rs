//! The private order fields committed to and proven over

use std::fmt::{Display, Formatter, Result as FmtResult};

use constants::{MAX_ORDER_SIZE, MAX_PRICE};
use serde::{Deserialize, Serialize};

use crate::{
    Amount, Price,
    fixed_point::{parse_price, parse_size},
    tier::VolumeTier,
};

/// The side of the market an order is on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy bitcoin
    #[default]
    Buy = 0,
    /// Sell bitcoin
    Sell,
}

impl OrderSide {
    /// The byte encoding of the side
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse a side from its byte encoding
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(OrderSide::Buy),
            1 => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl Display for OrderSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// The private inputs of an order
///
/// Known only to the order's owner; everything that leaves the client is
/// derived from these fields and a blinding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInput {
    /// The limit price in USD cents
    pub price: Price,
    /// The size in satoshis
    pub size: Amount,
    /// The side of the order
    pub side: OrderSide,
    /// A per-account unique nonce
    pub nonce: u64,
}

impl OrderInput {
    /// Constructor
    pub fn new(price: Price, size: Amount, side: OrderSide, nonce: u64) -> Self {
        Self { price, size, side, nonce }
    }

    /// Build an order from decimal USD price and BTC size strings
    pub fn from_decimal(price: &str, size: &str, side: OrderSide, nonce: u64) -> Result<Self, String> {
        let price = parse_price(price)?;
        let size = parse_size(size)?;
        Ok(Self::new(price, size, side, nonce))
    }

    /// Check the order's fields against the protocol bounds, returning the
    /// size's volume tier
    pub fn validate(&self) -> Result<VolumeTier, String> {
        if self.price == 0 {
            return Err("price must be positive".to_string());
        }
        if self.price > MAX_PRICE {
            return Err(format!("price {} exceeds maximum {MAX_PRICE}", self.price));
        }
        if self.size == 0 {
            return Err("size must be positive".to_string());
        }
        if self.size > MAX_ORDER_SIZE {
            return Err(format!("size {} exceeds maximum {MAX_ORDER_SIZE}", self.size));
        }

        VolumeTier::for_size(self.size).ok_or_else(|| format!("no tier for size {}", self.size))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests validation of a well formed order
    #[test]
    fn test_validate_valid() {
        let order = OrderInput::from_decimal("67500.00", "0.001", OrderSide::Buy, 1).unwrap();
        assert_eq!(order.price, 6_750_000);
        assert_eq!(order.size, 100_000);
        assert_eq!(order.validate(), Ok(VolumeTier::Small));
    }

    /// Tests that out of range fields are rejected
    #[test]
    fn test_validate_invalid() {
        assert!(OrderInput::new(0, 1, OrderSide::Buy, 1).validate().is_err());
        assert!(OrderInput::new(1, 0, OrderSide::Sell, 1).validate().is_err());
        assert!(OrderInput::new(MAX_PRICE + 1, 1, OrderSide::Buy, 1).validate().is_err());
        assert!(OrderInput::new(1, MAX_ORDER_SIZE + 1, OrderSide::Buy, 1).validate().is_err());
        assert!(OrderInput::new(MAX_PRICE, MAX_ORDER_SIZE, OrderSide::Buy, 1).validate().is_ok());
    }

    /// Tests the side byte encoding
    #[test]
    fn test_side_bytes() {
        for side in [OrderSide::Buy, OrderSide::Sell] {
            assert_eq!(OrderSide::from_byte(side.to_byte()), Some(side));
        }
        assert_eq!(OrderSide::from_byte(2), None);
    }
}
