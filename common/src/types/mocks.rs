//! Mock orders for testing
//!
//! The commitments and proofs are random bytes; they are suitable for state
//! and aggregation tests that do not verify proofs

use circuit_types::{Commitment, Nullifier, OrderSide, Proof, PublicInputs, VolumeTier};
use rand::{Rng, thread_rng};

use super::{AccountId, order::Order};

/// The owner of mock orders
pub const MOCK_OWNER: &str = "0x00000000000000000000000000000000000000aa";

/// Build random public inputs for the given side and tier
pub fn mock_public_inputs(side: OrderSide, size_tier: VolumeTier) -> PublicInputs {
    let mut rng = thread_rng();
    PublicInputs {
        commitment: Commitment(rng.r#gen()),
        side,
        size_tier,
        nullifier: Nullifier::from_nonce(rng.r#gen()),
        timestamp: util::get_current_time_seconds(),
    }
}

/// Build a mock order created at the given time
pub fn mock_order_at(created_at: u64) -> Order {
    mock_order_with(MOCK_OWNER.to_string(), OrderSide::Buy, VolumeTier::Small, created_at)
}

/// Build a mock order with the given parameters
pub fn mock_order_with(
    owner: AccountId,
    side: OrderSide,
    tier: VolumeTier,
    created_at: u64,
) -> Order {
    let public_inputs = mock_public_inputs(side, tier);
    Order::new_with_timestamp(
        owner,
        public_inputs.commitment,
        Proof(vec![0u8; 32]),
        public_inputs,
        created_at,
    )
}
