//! The aggregate statement of a batch
//!
//! The statement is a deterministic function of the batch id and the ordered
//! public inputs of its members. It carries only tier-level volume, never an
//! individual price or size

use constants::{
    BATCH_BASE_GAS, BATCH_ROOT_DOMAIN, NUM_VOLUME_TIERS, PER_ORDER_GAS, STATEMENT_DOMAIN,
};
use serde::{Deserialize, Serialize};
use shadow_crypto::hash::{DIGEST_LEN, hash_parts};
use util::hex::hex_array;
use uuid::Uuid;

use crate::{Amount, OrderSide, PublicInputs, tier::VolumeTier};

/// Estimate the gas cost of settling a batch of the given size
///
/// Monotonic in the order count and independent of any live oracle
pub fn estimate_gas(order_count: usize) -> u64 {
    BATCH_BASE_GAS + PER_ORDER_GAS * order_count as u64
}

/// A tier-level summary of one side of a batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideSummary {
    /// The number of orders on this side
    pub order_count: usize,
    /// The number of orders in each volume tier, indexed by tier
    pub tier_counts: [usize; NUM_VOLUME_TIERS],
    /// The smallest total volume consistent with the tier counts
    pub min_volume: Amount,
    /// The largest total volume consistent with the tier counts
    pub max_volume: Amount,
}

impl SideSummary {
    /// Add an order of the given tier to the summary
    pub fn add(&mut self, tier: VolumeTier) {
        self.order_count += 1;
        self.tier_counts[tier.index()] += 1;
        self.min_volume = self.min_volume.saturating_add(tier.min_size());
        self.max_volume = self.max_volume.saturating_add(tier.max_size());
    }

    /// The number of orders in the given tier
    pub fn count_in(&self, tier: VolumeTier) -> usize {
        self.tier_counts[tier.index()]
    }

    /// Byte encoding used in the statement digest
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 * (3 + NUM_VOLUME_TIERS));
        out.extend_from_slice(&(self.order_count as u64).to_le_bytes());
        for count in self.tier_counts {
            out.extend_from_slice(&(count as u64).to_le_bytes());
        }
        out.extend_from_slice(&self.min_volume.to_le_bytes());
        out.extend_from_slice(&self.max_volume.to_le_bytes());
        out
    }
}

/// The public statement a batch proof attests to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatement {
    /// The batch the statement describes
    pub batch_id: Uuid,
    /// The number of member orders
    pub member_count: usize,
    /// A hash chain over the member commitments, in selection order
    #[serde(with = "hex_array")]
    pub member_root: [u8; DIGEST_LEN],
    /// The buy side summary
    pub buy: SideSummary,
    /// The sell side summary
    pub sell: SideSummary,
    /// The estimated gas cost of settling the batch
    pub gas_estimate: u64,
}

impl AggregateStatement {
    /// Build the statement of a batch from its members' public inputs
    pub fn from_members(batch_id: Uuid, members: &[PublicInputs]) -> Self {
        let mut member_root = [0u8; DIGEST_LEN];
        let mut buy = SideSummary::default();
        let mut sell = SideSummary::default();

        for member in members {
            member_root =
                hash_parts(BATCH_ROOT_DOMAIN, &[&member_root, member.commitment.as_bytes()]);
            match member.side {
                OrderSide::Buy => buy.add(member.size_tier),
                OrderSide::Sell => sell.add(member.size_tier),
            }
        }

        Self {
            batch_id,
            member_count: members.len(),
            member_root,
            buy,
            sell,
            gas_estimate: estimate_gas(members.len()),
        }
    }

    /// The summary of the given side
    pub fn side(&self, side: OrderSide) -> &SideSummary {
        match side {
            OrderSide::Buy => &self.buy,
            OrderSide::Sell => &self.sell,
        }
    }

    /// The largest total volume consistent with the statement, both sides
    pub fn max_volume(&self) -> Amount {
        self.buy.max_volume.saturating_add(self.sell.max_volume)
    }

    /// The smallest total volume consistent with the statement, both sides
    pub fn min_volume(&self) -> Amount {
        self.buy.min_volume.saturating_add(self.sell.min_volume)
    }

    /// A digest binding every field of the statement
    pub fn digest(&self) -> [u8; DIGEST_LEN] {
        hash_parts(
            STATEMENT_DOMAIN,
            &[
                self.batch_id.as_bytes(),
                &(self.member_count as u64).to_le_bytes(),
                &self.member_root,
                &self.buy.to_bytes(),
                &self.sell.to_bytes(),
                &self.gas_estimate.to_le_bytes(),
            ],
        )
    }
}
