//! The order commitment engine
//!
//! A commitment is a domain separated hash over Pedersen commitments to the
//! price and size, the public side, and the nonce nullifier. The Pedersen
//! points are the values the validity proof range checks

use circuit_types::{Commitment, Nullifier, OrderInput, OrderSide};
use constants::COMMITMENT_DOMAIN;
use shadow_crypto::{
    RistrettoPoint, blinding::Blinding, hash::hash_parts, pedersen::commit_value,
};

use crate::errors::ProverError;

/// Commit to an order under the given blinding
///
/// Deterministic in `(input, blinding)`; fails only on out of range fields
pub fn commit(input: &OrderInput, blinding: &Blinding) -> Result<Commitment, ProverError> {
    let opening = open_fields(input, blinding)?;
    Ok(opening.commitment)
}

/// The Pedersen commitments underlying an order commitment
#[derive(Clone, Debug)]
pub(crate) struct FieldCommitments {
    /// The commitment to the price
    pub price: RistrettoPoint,
    /// The commitment to the size
    pub size: RistrettoPoint,
    /// The order commitment computed over the field commitments
    pub commitment: Commitment,
}

/// Compute the field commitments of an order
pub(crate) fn open_fields(
    input: &OrderInput,
    blinding: &Blinding,
) -> Result<FieldCommitments, ProverError> {
    input.validate().map_err(ProverError::InvalidInput)?;

    let price = commit_value(input.price, &blinding.price_blinding());
    let size = commit_value(input.size, &blinding.size_blinding());
    let nullifier = Nullifier::from_nonce(input.nonce);
    let commitment = commitment_from_points(&price, &size, input.side, &nullifier);

    Ok(FieldCommitments { price, size, commitment })
}

/// Compute an order commitment from its public components
pub(crate) fn commitment_from_points(
    price: &RistrettoPoint,
    size: &RistrettoPoint,
    side: OrderSide,
    nullifier: &Nullifier,
) -> Commitment {
    let price_bytes = price.compress().to_bytes();
    let size_bytes = size.compress().to_bytes();
    Commitment(hash_parts(
        COMMITMENT_DOMAIN,
        &[&price_bytes, &size_bytes, &[side.to_byte()], nullifier.as_bytes()],
    ))
}

#[cfg(test)]
mod test {
    use circuit_types::OrderSide;

    use super::*;

    /// The number of samples drawn in the hiding tests
    const N_SAMPLES: usize = 200;

    /// Get a valid order for testing
    fn test_order() -> OrderInput {
        OrderInput::from_decimal("67500.00", "0.001", OrderSide::Buy, 1).unwrap()
    }

    /// Tests that commitments are deterministic in the input and blinding
    #[test]
    fn test_deterministic() {
        let blinding = Blinding::random();
        let order = test_order();
        assert_eq!(commit(&order, &blinding).unwrap(), commit(&order, &blinding).unwrap());
    }

    /// Tests that every field of the order is bound by the commitment
    #[test]
    fn test_binding() {
        let blinding = Blinding::random();
        let order = test_order();
        let base = commit(&order, &blinding).unwrap();

        let mutations = [
            OrderInput { price: order.price + 1, ..order.clone() },
            OrderInput { size: order.size * 2, ..order.clone() },
            OrderInput { side: OrderSide::Sell, ..order.clone() },
            OrderInput { nonce: order.nonce + 1, ..order.clone() },
        ];
        for mutated in mutations {
            assert_ne!(commit(&mutated, &blinding).unwrap(), base);
        }
    }

    /// Tests that invalid orders are rejected
    #[test]
    fn test_invalid_input() {
        let blinding = Blinding::random();
        for order in [
            OrderInput { price: 0, ..test_order() },
            OrderInput { size: 0, ..test_order() },
        ] {
            assert!(matches!(commit(&order, &blinding), Err(ProverError::InvalidInput(_))));
        }
    }

    /// Tests that distinct blindings over the same order give distinct
    /// commitments
    #[test]
    fn test_hiding_distinct() {
        let order = test_order();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..N_SAMPLES {
            assert!(seen.insert(commit(&order, &Blinding::random()).unwrap()));
        }
    }

    /// Tests that the bit distribution of commitments does not depend on the
    /// committed price and size
    #[test]
    fn test_hiding_no_bias() {
        /// The fraction of set bits across many fresh commitments to `order`
        fn set_bit_fraction(order: &OrderInput) -> f64 {
            let mut ones = 0u32;
            for _ in 0..N_SAMPLES {
                let commitment = commit(order, &Blinding::random()).unwrap();
                ones += commitment.as_bytes().iter().map(|b| b.count_ones()).sum::<u32>();
            }
            ones as f64 / (N_SAMPLES * 256) as f64
        }

        let small = OrderInput::new(1, 1, OrderSide::Buy, 1);
        let large = OrderInput::new(constants::MAX_PRICE, constants::MAX_ORDER_SIZE, OrderSide::Buy, 1);
        for order in [small, large] {
            let fraction = set_bit_fraction(&order);
            assert!((0.45..0.55).contains(&fraction), "biased commitment bits: {fraction}");
        }
    }
}
