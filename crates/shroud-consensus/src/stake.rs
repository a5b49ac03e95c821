use num_bigint::BigUint;
use num_traits::One;

use crate::block::BlockHeader;
use crate::constants::COIN;
use crate::error::{ConsensusError, ErrorCode};
use crate::hash::sha256d_parts;
use crate::pow::{hash_to_biguint, target_from_bits};

/// Weight brackets for staked denominations, as (minimum value, percent).
const WEIGHT_BRACKETS: [(u64, u64); 4] = [
    (10_000 * COIN, 70),
    (1_000 * COIN, 80),
    (100 * COIN, 90),
    (10 * COIN, 100),
];

/// Effective stake weight of an input worth `value`. Larger denominations
/// are discounted; anything below the smallest denomination has no weight.
pub fn stake_weight(value: u64) -> u64 {
    for (min, percent) in WEIGHT_BRACKETS {
        if value >= min {
            return ((value as u128 * percent as u128) / 100) as u64;
        }
    }
    0
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakeKernel {
    pub stake_modifier: u64,
    pub time_block_from: u32,
    /// Serialized identity of the staked coin (outpoint or serial hash).
    pub uniqueness: Vec<u8>,
    pub time_tx: u32,
}

pub fn stake_kernel_hash(k: &StakeKernel) -> [u8; 32] {
    sha256d_parts(&[
        &k.stake_modifier.to_le_bytes(),
        &k.time_block_from.to_le_bytes(),
        &k.uniqueness,
        &k.time_tx.to_le_bytes(),
    ])
}

/// `hash < target * weight`, with the product saturating at 2^256 - 1.
pub fn stake_target_hit(hash: &[u8; 32], target: &BigUint, weight: u64) -> bool {
    let max: BigUint = (BigUint::one() << 256u32) - BigUint::one();
    let mut weighted = target * BigUint::from(weight);
    if weighted > max {
        weighted = max;
    }
    hash_to_biguint(hash) < weighted
}

/// Checks the kernel of a stake block and returns its kernel hash.
pub fn check_proof_of_stake(
    header: &BlockHeader,
    kernel: &StakeKernel,
    stake_value: u64,
    pow_limit: &BigUint,
) -> Result<[u8; 32], ConsensusError> {
    if !header.proof_of_stake {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrStakeInvalid,
            "header is not a stake block",
        ));
    }
    if kernel.time_tx != header.time {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrStakeInvalid,
            "kernel time differs from block time",
        ));
    }
    if kernel.time_tx < kernel.time_block_from {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrStakeInvalid,
            "kernel time precedes staked coin",
        ));
    }
    let weight = stake_weight(stake_value);
    if weight == 0 {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrStakeInvalid,
            "stake below minimum denomination",
        ));
    }
    let target = target_from_bits(header.bits, pow_limit)?;
    let hash = stake_kernel_hash(kernel);
    if !stake_target_hit(&hash, &target, weight) {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrStakeInvalid,
            "kernel hash above weighted target",
        ));
    }
    Ok(hash)
}
