//! Commitments, public inputs, and the opaque proofs bound to them

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use shadow_crypto::hash::{DIGEST_LEN, compute_nullifier};
use util::hex::{bytes_to_hex_string, hex_array, hex_bytes};

use crate::{OrderInput, OrderSide, Timestamp, tier::VolumeTier};

/// The byte length of the canonical public input encoding
pub const PUBLIC_INPUTS_LEN: usize = DIGEST_LEN + 1 + 1 + DIGEST_LEN + 8;

/// A binding, hiding commitment to an order's private fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex_array")] pub [u8; DIGEST_LEN]);

impl Commitment {
    /// The commitment bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", bytes_to_hex_string(&self.0))
    }
}

/// The nullifier of an order's nonce
///
/// Public so that nonce reuse is detectable without opening the commitment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nullifier(#[serde(with = "hex_array")] pub [u8; DIGEST_LEN]);

impl Nullifier {
    /// Compute the nullifier of a nonce
    pub fn from_nonce(nonce: u64) -> Self {
        Self(compute_nullifier(nonce))
    }

    /// The nullifier bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl Display for Nullifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", bytes_to_hex_string(&self.0))
    }
}

/// The public inputs of an order validity proof
///
/// Field order is significant; the canonical encoding is absorbed into the
/// proof transcript in this order
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicInputs {
    /// The order commitment
    pub commitment: Commitment,
    /// The side of the order
    pub side: OrderSide,
    /// The volume tier of the order's size
    pub size_tier: VolumeTier,
    /// The nullifier of the order's nonce
    pub nullifier: Nullifier,
    /// The time at which the order was created
    pub timestamp: Timestamp,
}

impl PublicInputs {
    /// Derive the public inputs of an order from its private fields
    pub fn for_order(
        commitment: Commitment,
        input: &OrderInput,
        timestamp: Timestamp,
    ) -> Result<Self, String> {
        let size_tier = input.validate()?;
        Ok(Self {
            commitment,
            side: input.side,
            size_tier,
            nullifier: Nullifier::from_nonce(input.nonce),
            timestamp,
        })
    }

    /// The canonical byte encoding
    pub fn to_bytes(&self) -> [u8; PUBLIC_INPUTS_LEN] {
        let mut out = [0u8; PUBLIC_INPUTS_LEN];
        let mut cursor = 0;
        let mut put = |bytes: &[u8]| {
            out[cursor..cursor + bytes.len()].copy_from_slice(bytes);
            cursor += bytes.len();
        };

        put(self.commitment.as_bytes());
        put(&[self.side.to_byte()]);
        put(&[self.size_tier.to_byte()]);
        put(self.nullifier.as_bytes());
        put(&self.timestamp.to_le_bytes());
        out
    }

    /// Parse public inputs from their canonical encoding
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_INPUTS_LEN {
            return None;
        }

        let (commitment, rest) = bytes.split_at(DIGEST_LEN);
        let side = OrderSide::from_byte(rest[0])?;
        let size_tier = VolumeTier::from_byte(rest[1])?;
        let (nullifier, timestamp) = rest[2..].split_at(DIGEST_LEN);

        Some(Self {
            commitment: Commitment(commitment.try_into().ok()?),
            side,
            size_tier,
            nullifier: Nullifier(nullifier.try_into().ok()?),
            timestamp: u64::from_le_bytes(timestamp.try_into().ok()?),
        })
    }
}

/// An opaque proof of order validity
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl Proof {
    /// The proof bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An opaque proof of batch validity
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchProof(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl BatchProof {
    /// The proof bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
