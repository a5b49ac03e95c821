//! Zerocoin-style anonymity layer: denominations, coins, deterministic
//! mints, per-denomination anonymity sets, spends and the chain-wide
//! spent-serial budget.

pub mod accumulator;
pub mod coin;
pub mod denomination;
pub mod mint;
pub mod receipt;
pub mod serials;
pub mod spend;
pub mod witness;

pub use accumulator::{AccumulatorMap, AnonymitySet};
pub use coin::{
    pubcoin_hash, seed_to_coin, serial_hash, stake_hash, zerocoin_seed, PrivateCoin, PublicCoin,
};
pub use denomination::{closest_denomination, Denomination, DENOMINATIONS};
pub use mint::{DeterministicMint, MintTracker};
pub use receipt::{SpendReceipt, SpendStatus};
pub use serials::{AnonymitySetBudget, BlockUndo, SpentSerial};
pub use spend::{CoinSpend, SpendType};
pub use witness::{CoinWitnessData, CHECKPOINT_INTERVAL};
