use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::constants::MEDIAN_TIME_SPAN;
use crate::error::{ConsensusError, ErrorCode};

/// Decoded compact ("nBits") target with the flags the packed form can carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactTarget {
    pub target: BigUint,
    pub negative: bool,
    pub overflow: bool,
}

pub fn decode_compact(bits: u32) -> CompactTarget {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;
    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        BigUint::from(word)
    } else {
        BigUint::from(word) << (8 * (size - 3))
    };
    let negative = word != 0 && (bits & 0x0080_0000) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    CompactTarget {
        target,
        negative,
        overflow,
    }
}

fn low_u64(v: &BigUint) -> u64 {
    v.iter_u64_digits().next().unwrap_or(0)
}

pub fn encode_compact(target: &BigUint) -> u32 {
    let mut size = target.bits().div_ceil(8) as u32;
    let mut compact = if size <= 3 {
        (low_u64(target) << (8 * (3 - size))) as u32
    } else {
        low_u64(&(target >> (8 * (size - 3)))) as u32
    };
    // Keep the sign bit clear by moving one byte into the exponent.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Block hashes compare as little-endian 256-bit integers.
pub fn hash_to_biguint(hash: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_le(hash)
}

/// Validates `bits` against `pow_limit` and returns the decoded target.
pub fn target_from_bits(bits: u32, pow_limit: &BigUint) -> Result<BigUint, ConsensusError> {
    let c = decode_compact(bits);
    if c.negative {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrTargetInvalid,
            "negative target",
        ));
    }
    if c.overflow {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrTargetInvalid,
            "target overflow",
        ));
    }
    if c.target.is_zero() {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrTargetInvalid,
            "zero target",
        ));
    }
    if &c.target > pow_limit {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrTargetInvalid,
            "target above pow limit",
        ));
    }
    Ok(c.target)
}

pub fn check_proof_of_work(
    hash: &[u8; 32],
    bits: u32,
    pow_limit: &BigUint,
) -> Result<(), ConsensusError> {
    let target = target_from_bits(bits, pow_limit)?;
    if hash_to_biguint(hash) > target {
        return Err(ConsensusError::new(
            ErrorCode::BlockErrPowInvalid,
            "hash above target",
        ));
    }
    Ok(())
}

// block_proof computes the expected number of hashes for one block:
//   work = 2^256 / (target + 1)
// Invalid targets contribute no work.
pub fn block_proof(bits: u32) -> BigUint {
    let c = decode_compact(bits);
    if c.negative || c.overflow || c.target.is_zero() {
        return BigUint::zero();
    }
    let two256: BigUint = BigUint::one() << 256usize;
    two256 / (c.target + BigUint::one())
}

pub fn chain_work(bits: &[u32]) -> BigUint {
    bits.iter().fold(BigUint::zero(), |acc, b| acc + block_proof(*b))
}

/// Median of the last `MEDIAN_TIME_SPAN` timestamps, newest last.
pub fn median_time_past(times: &[u32]) -> Option<u32> {
    if times.is_empty() {
        return None;
    }
    let start = times.len().saturating_sub(MEDIAN_TIME_SPAN);
    let mut window: Vec<u32> = times[start..].to_vec();
    window.sort_unstable();
    Some(window[window.len() / 2])
}
