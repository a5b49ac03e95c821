//! Dark Gravity Wave retargeting, run independently per difficulty lane.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use tracing::{debug, trace};

use crate::block::{BlockHeader, BlockLane};
use crate::chain::{AncestorSource, BlockIndexEntry};
use crate::error::ConsensusError;
use crate::params::ConsensusParams;
use crate::pow::{decode_compact, encode_compact};

/// Required `bits` for `header`, whose parent is `prev`.
pub fn next_work_required<C: AncestorSource + ?Sized>(
    prev: Option<&BlockIndexEntry>,
    header: &BlockHeader,
    chain: &C,
    params: &ConsensusParams,
) -> Result<u32, ConsensusError> {
    let lane = header.lane()?;
    Ok(dark_gravity_wave(prev, chain, params, lane))
}

/// Walks back from `prev` by height and collects the most recent
/// same-lane blocks until the lane window is full.
fn same_lane_window<C: AncestorSource + ?Sized>(
    prev: &BlockIndexEntry,
    chain: &C,
    lane: BlockLane,
    window: usize,
) -> Vec<BlockIndexEntry> {
    let mut samples = Vec::with_capacity(window);
    let mut cursor = Some(prev.clone());
    while let Some(entry) = cursor {
        if entry.lane == lane {
            samples.push(entry.clone());
            if samples.len() == window {
                break;
            }
        }
        if entry.height == 0 {
            break;
        }
        cursor = chain.ancestor(entry.height - 1);
    }
    samples
}

pub fn dark_gravity_wave<C: AncestorSource + ?Sized>(
    prev: Option<&BlockIndexEntry>,
    chain: &C,
    params: &ConsensusParams,
    lane: BlockLane,
) -> u32 {
    let limit = params.pow_limit_for(lane);
    let limit_bits = encode_compact(limit);
    let window = params.dgw_window(lane).max(2);

    let Some(prev) = prev else {
        return limit_bits;
    };

    let samples = same_lane_window(prev, chain, lane, window);
    if samples.len() < window {
        debug!(
            ?lane,
            found = samples.len(),
            window,
            "difficulty bootstrap: too few same-lane blocks"
        );
        return limit_bits;
    }

    let mut avg = BigUint::zero();
    for (i, s) in samples.iter().enumerate() {
        let target = decode_compact(s.bits).target;
        avg = if i == 0 {
            target
        } else {
            let n = BigUint::from(i as u64);
            (avg * &n + target) / (n + BigUint::one())
        };
    }

    // samples[0] is the newest; ordering comes from height alone.
    let newest = i64::from(samples[0].time);
    let oldest = i64::from(samples[window - 1].time);
    let target_timespan = window as i64 * params.target_spacing(lane);
    let actual = (newest - oldest).clamp(target_timespan / 4, target_timespan * 4);

    let mut next = avg * BigUint::from(actual as u64) / BigUint::from(target_timespan as u64);
    if &next > limit {
        next = limit.clone();
    }
    if next.is_zero() {
        next = BigUint::one();
    }

    let bits = encode_compact(&next);
    trace!(?lane, actual, target_timespan, bits = format_args!("{bits:08x}"), "retarget");
    bits
}
