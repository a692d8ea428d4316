//! Volume tiers bucket order sizes into coarse public ranges
//!
//! An order's tier is a public input; its proof attests that the hidden size
//! lies within the tier's bounds. The order book and aggregate statements
//! are built from tiers rather than sizes

use std::fmt::{Display, Formatter, Result as FmtResult};

use constants::{LARGE_TIER_MAX, MAX_ORDER_SIZE, MEDIUM_TIER_MAX, NUM_VOLUME_TIERS, SMALL_TIER_MAX};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// A coarse size bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTier {
    /// Less than 0.01 BTC
    Small = 0,
    /// At least 0.01 BTC and less than 0.1 BTC
    Medium,
    /// At least 0.1 BTC and less than 1 BTC
    Large,
    /// At least 1 BTC
    Whale,
}

impl VolumeTier {
    /// All tiers, in ascending order
    pub const ALL: [VolumeTier; NUM_VOLUME_TIERS] =
        [VolumeTier::Small, VolumeTier::Medium, VolumeTier::Large, VolumeTier::Whale];

    /// The inclusive size bounds of the tier
    pub fn bounds(&self) -> (Amount, Amount) {
        match self {
            VolumeTier::Small => (1, SMALL_TIER_MAX),
            VolumeTier::Medium => (SMALL_TIER_MAX + 1, MEDIUM_TIER_MAX),
            VolumeTier::Large => (MEDIUM_TIER_MAX + 1, LARGE_TIER_MAX),
            VolumeTier::Whale => (LARGE_TIER_MAX + 1, MAX_ORDER_SIZE),
        }
    }

    /// The smallest size in the tier
    pub fn min_size(&self) -> Amount {
        self.bounds().0
    }

    /// The largest size in the tier
    pub fn max_size(&self) -> Amount {
        self.bounds().1
    }

    /// The tier containing the given size, if the size is valid
    pub fn for_size(size: Amount) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| {
            let (min, max) = tier.bounds();
            (min..=max).contains(&size)
        })
    }

    /// The tier's position in `ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The byte encoding of the tier
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse a tier from its byte encoding
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(b as usize).copied()
    }
}

impl Display for VolumeTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VolumeTier::Small => write!(f, "small"),
            VolumeTier::Medium => write!(f, "medium"),
            VolumeTier::Large => write!(f, "large"),
            VolumeTier::Whale => write!(f, "whale"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that the tiers partition the valid size range
    #[test]
    fn test_tiers_partition() {
        let mut expected_min = 1;
        for tier in VolumeTier::ALL {
            let (min, max) = tier.bounds();
            assert_eq!(min, expected_min);
            assert!(max >= min);
            expected_min = max + 1;
        }
        assert_eq!(expected_min, MAX_ORDER_SIZE + 1);
    }

    /// Tests tier lookup at the boundaries
    #[test]
    fn test_for_size() {
        assert_eq!(VolumeTier::for_size(0), None);
        assert_eq!(VolumeTier::for_size(1), Some(VolumeTier::Small));
        assert_eq!(VolumeTier::for_size(100_000), Some(VolumeTier::Small));
        assert_eq!(VolumeTier::for_size(1_000_000), Some(VolumeTier::Medium));
        assert_eq!(VolumeTier::for_size(99_999_999), Some(VolumeTier::Large));
        assert_eq!(VolumeTier::for_size(MAX_ORDER_SIZE), Some(VolumeTier::Whale));
        assert_eq!(VolumeTier::for_size(MAX_ORDER_SIZE + 1), None);
    }
}
