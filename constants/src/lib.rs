//! Defines system-wide constants for node execution

#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(missing_docs)]

// -------------------------
// | System-Wide Constants |
// -------------------------

/// The number of satoshis in a single bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// The maximum price an order may specify, in cents
///
/// Prices are range-checked against this bound in-proof, so it must leave
/// `MAX_PRICE - price` representable in 64 bits
pub const MAX_PRICE: u64 = 100_000_000_000_000;

/// The maximum size an order may specify, in satoshis
///
/// This is the total supply of bitcoin
pub const MAX_ORDER_SIZE: u64 = 21_000_000 * SATS_PER_BTC;

/// The bitlength of the range proofs used to bound order fields
pub const RANGE_PROOF_BITS: usize = 64;

/// The number of values range checked in a single order proof
///
/// Each of price and size is bounded from below and above
pub const ORDER_PROOF_N_VALUES: usize = 4;

// ----------------
// | Volume Tiers |
// ----------------

/// The inclusive upper bound of the small volume tier, in satoshis
pub const SMALL_TIER_MAX: u64 = 999_999;

/// The inclusive upper bound of the medium volume tier, in satoshis
pub const MEDIUM_TIER_MAX: u64 = 9_999_999;

/// The inclusive upper bound of the large volume tier, in satoshis
pub const LARGE_TIER_MAX: u64 = 99_999_999;

/// The number of volume tiers in the system
pub const NUM_VOLUME_TIERS: usize = 4;

// ---------------------
// | Domain Separators |
// ---------------------

/// The domain separator for order commitments
pub const COMMITMENT_DOMAIN: &[u8] = b"shadowsats:order-commitment:v1";

/// The domain separator for nonce nullifiers
pub const NULLIFIER_DOMAIN: &[u8] = b"shadowsats:nonce-nullifier:v1";

/// The domain separator for deriving the price blinding from a blinding seed
pub const PRICE_BLINDING_DOMAIN: &[u8] = b"shadowsats:blinding:price";

/// The domain separator for deriving the size blinding from a blinding seed
pub const SIZE_BLINDING_DOMAIN: &[u8] = b"shadowsats:blinding:size";

/// The domain separator for batch member roots
pub const BATCH_ROOT_DOMAIN: &[u8] = b"shadowsats:batch-root:v1";

/// The domain separator for aggregate statement digests
pub const STATEMENT_DOMAIN: &[u8] = b"shadowsats:aggregate-statement:v1";

/// The Fiat-Shamir transcript label for order validity proofs
pub const ORDER_TRANSCRIPT_LABEL: &[u8] = b"shadowsats-valid-order";

/// The domain separator for mock proofs
pub const MOCK_PROOF_DOMAIN: &[u8] = b"shadowsats:mock-proof";

// -------------------
// | Batch Constants |
// -------------------

/// The fixed gas overhead of settling a batch, covering the batch proof
/// verification and the settlement call itself
pub const BATCH_BASE_GAS: u64 = 300_000;

/// The marginal gas cost of each order in a batch
pub const PER_ORDER_GAS: u64 = 45_000;

/// The default maximum number of orders in a batch
pub const DEFAULT_MAX_BATCH_ORDERS: usize = 10;

/// The number of times the aggregator re-reads the pool after losing claim
/// races before settling for a partially filled batch
pub const MAX_CLAIM_ROUNDS: usize = 5;

// -----------------
// | System Topics |
// -----------------

/// The topic on which all batch status changes are published
pub const BATCH_STATUS_TOPIC: &str = "batch-status";

/// The topic on which all order status changes are published
pub const ORDER_STATUS_TOPIC: &str = "order-status";
