//! Static per-network consensus parameters.

use core::fmt;
use core::str::FromStr;

use num_bigint::BigUint;
use num_traits::One;

use crate::block::{BlockLane, PowAlgorithm};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Sizing of the memory-hard hash caches and datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowHashParams {
    /// 64-byte items in the keyed scratchpad.
    pub keyed_cache_items: usize,
    pub keyed_rounds: u32,
    /// Blocks per dataset epoch.
    pub dataset_epoch_length: u32,
    /// 64-byte items in the light epoch cache.
    pub dataset_cache_items: usize,
    /// 64-byte items in the full epoch dataset.
    pub dataset_items: u64,
    pub dataset_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusParams {
    pub network: Network,
    /// Limit for the stake lane and for blocks carrying no algorithm tag.
    pub pow_limit: BigUint,
    pub keyed_pow_limit: BigUint,
    pub dataset_pow_limit: BigUint,
    pub sha256d_pow_limit: BigUint,

    pub pos_target_spacing: i64,
    pub keyed_target_spacing: i64,
    pub dataset_target_spacing: i64,
    pub sha256d_target_spacing: i64,

    pub dgw_pow_window: usize,
    pub dgw_pos_window: usize,

    pub key_block_epoch: u64,
    pub key_block_lag: u64,

    pub pow_hash: PowHashParams,
}

fn limit_bits(bits: u32) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

impl ConsensusParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main | Network::Test => Self {
                network,
                pow_limit: limit_bits(255),
                keyed_pow_limit: limit_bits(240),
                dataset_pow_limit: limit_bits(228),
                sha256d_pow_limit: limit_bits(240),
                pos_target_spacing: 60,
                keyed_target_spacing: 600,
                dataset_target_spacing: 172,
                sha256d_target_spacing: 1200,
                dgw_pow_window: 60,
                dgw_pos_window: 120,
                key_block_epoch: 2048,
                key_block_lag: 64,
                pow_hash: PowHashParams {
                    keyed_cache_items: 1 << 18,
                    keyed_rounds: 256,
                    dataset_epoch_length: 30_000,
                    dataset_cache_items: 1 << 16,
                    dataset_items: 1 << 22,
                    dataset_rounds: 64,
                },
            },
            Network::Regtest => Self {
                network,
                pow_limit: limit_bits(255),
                keyed_pow_limit: limit_bits(255),
                dataset_pow_limit: limit_bits(255),
                sha256d_pow_limit: limit_bits(255),
                pos_target_spacing: 60,
                keyed_target_spacing: 600,
                dataset_target_spacing: 172,
                sha256d_target_spacing: 1200,
                dgw_pow_window: 60,
                dgw_pos_window: 120,
                key_block_epoch: 16,
                key_block_lag: 4,
                pow_hash: PowHashParams {
                    keyed_cache_items: 1 << 8,
                    keyed_rounds: 16,
                    dataset_epoch_length: 64,
                    dataset_cache_items: 1 << 6,
                    dataset_items: 1 << 10,
                    dataset_rounds: 8,
                },
            },
        }
    }

    pub fn pow_limit_for(&self, lane: BlockLane) -> &BigUint {
        match lane {
            BlockLane::Stake => &self.pow_limit,
            BlockLane::Work(PowAlgorithm::KeyedMemoryHard) => &self.keyed_pow_limit,
            BlockLane::Work(PowAlgorithm::EpochDataset) => &self.dataset_pow_limit,
            BlockLane::Work(PowAlgorithm::Sha256d) => &self.sha256d_pow_limit,
        }
    }

    pub fn target_spacing(&self, lane: BlockLane) -> i64 {
        match lane {
            BlockLane::Stake => self.pos_target_spacing,
            BlockLane::Work(PowAlgorithm::KeyedMemoryHard) => self.keyed_target_spacing,
            BlockLane::Work(PowAlgorithm::EpochDataset) => self.dataset_target_spacing,
            BlockLane::Work(PowAlgorithm::Sha256d) => self.sha256d_target_spacing,
        }
    }

    pub fn dgw_window(&self, lane: BlockLane) -> usize {
        match lane {
            BlockLane::Stake => self.dgw_pos_window,
            BlockLane::Work(_) => self.dgw_pow_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_names_parse() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("regtest".parse::<Network>().unwrap(), Network::Regtest);
        assert!("signet".parse::<Network>().is_err());
    }

    #[test]
    fn main_limits_are_ordered() {
        let p = ConsensusParams::for_network(Network::Main);
        assert!(p.dataset_pow_limit < p.keyed_pow_limit);
        assert!(p.keyed_pow_limit < p.pow_limit);
        assert_eq!(p.pow_limit.bits(), 255);
    }
}
