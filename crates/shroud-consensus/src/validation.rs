//! Header acceptance.
//!
//! [`ProofEngine`] computes the per-algorithm work hash. [`HeaderValidator`]
//! walks a header through
//! `Unvalidated -> HeaderHashed -> DifficultyChecked -> Accepted`, stopping in
//! `Rejected(code)` at the first failing check.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::block::{BlockHeader, BlockLane, PowAlgorithm};
use crate::budget::{check_superblock_payouts, BudgetParams, Payout};
use crate::chain::{AncestorSource, BlockIndexEntry};
use crate::constants::{MAX_FUTURE_BLOCK_TIME, MEDIAN_TIME_SPAN};
use crate::difficulty::next_work_required;
use crate::encode::dataset_header_input;
use crate::error::{ConsensusError, ErrorCode};
use crate::hash::sha256d;
use crate::keyblock::KeyBlockContext;
use crate::params::ConsensusParams;
use crate::pow::{check_proof_of_work, median_time_past};
use crate::powhash::{dataset_hash, epoch_number, DatasetHash, DatasetLookup, EpochCache};
use crate::stake::{check_proof_of_stake, StakeKernel};

pub fn dataset_header_hash(header: &BlockHeader) -> [u8; 32] {
    sha256d(&dataset_header_input(header))
}

/// Epoch-dataset seal of `header` at `nonce`, over either the light cache
/// or a full dataset.
pub fn dataset_seal<D: DatasetLookup + ?Sized>(
    header: &BlockHeader,
    dataset: &D,
    nonce: u64,
    rounds: u32,
) -> DatasetHash {
    dataset_hash(dataset, &dataset_header_hash(header), nonce, rounds)
}

#[derive(Debug)]
pub struct ProofEngine {
    params: ConsensusParams,
    key_blocks: KeyBlockContext,
    epoch_cache: RwLock<Option<Arc<EpochCache>>>,
}

impl ProofEngine {
    pub fn new(params: ConsensusParams) -> Self {
        let key_blocks = KeyBlockContext::new(&params);
        Self {
            params,
            key_blocks,
            epoch_cache: RwLock::new(None),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn key_blocks(&self) -> &KeyBlockContext {
        &self.key_blocks
    }

    pub fn on_tip_changed<C: AncestorSource + ?Sized>(
        &self,
        tip_height: u64,
        chain: &C,
    ) -> Result<bool, ConsensusError> {
        self.key_blocks.on_tip_changed(tip_height, chain)
    }

    /// Light cache for `epoch`, built on first use and kept until the next
    /// epoch is requested.
    pub fn epoch_cache(&self, epoch: u32) -> Result<Arc<EpochCache>, ConsensusError> {
        if let Some(cache) = self.epoch_cache.read().as_ref() {
            if cache.epoch() == epoch {
                return Ok(Arc::clone(cache));
            }
        }
        let p = &self.params.pow_hash;
        let cache = EpochCache::build(epoch, p.dataset_cache_items, p.dataset_items).map_err(|e| {
            warn!(epoch, error = %e, "epoch cache unavailable");
            ConsensusError::new(
                ErrorCode::BlockErrDatasetUnavailable,
                "epoch cache allocation failed",
            )
        })?;
        let cache = Arc::new(cache);
        *self.epoch_cache.write() = Some(Arc::clone(&cache));
        debug!(epoch, "epoch cache built");
        Ok(cache)
    }

    /// Work hash of `header` for its algorithm. Dataset headers must also
    /// carry the matching mix hash.
    pub fn pow_hash<C: AncestorSource + ?Sized>(
        &self,
        header: &BlockHeader,
        chain: &C,
    ) -> Result<[u8; 32], ConsensusError> {
        let algo = header.pow_algorithm().ok_or_else(|| {
            ConsensusError::new(ErrorCode::BlockErrAlgorithmInvalid, "no work algorithm")
        })?;
        match algo {
            PowAlgorithm::Sha256d => Ok(header.hash()),
            PowAlgorithm::KeyedMemoryHard => self.key_blocks.keyed_pow_hash(header, chain),
            PowAlgorithm::EpochDataset => {
                let p = &self.params.pow_hash;
                let cache = self.epoch_cache(epoch_number(header.height, p.dataset_epoch_length))?;
                let seal = dataset_seal(header, cache.as_ref(), header.nonce64, p.dataset_rounds);
                if seal.mix_hash != header.mix_hash {
                    return Err(ConsensusError::new(
                        ErrorCode::BlockErrMixHashInvalid,
                        "mix hash mismatch",
                    ));
                }
                Ok(seal.final_hash)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderState {
    Unvalidated,
    HeaderHashed,
    DifficultyChecked,
    Accepted,
    Rejected(ErrorCode),
}

/// Inputs to header acceptance that do not come from the header or chain.
#[derive(Clone, Debug, Default)]
pub struct HeaderContext<'a> {
    /// Network-adjusted current time.
    pub now: i64,
    /// Kernel and staked value for a stake block.
    pub stake: Option<(&'a StakeKernel, u64)>,
    pub payouts: &'a [Payout<'a>],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedHeader {
    pub entry: BlockIndexEntry,
    /// Work hash, or the kernel hash for stake blocks.
    pub proof_hash: [u8; 32],
}

pub struct HeaderValidator<'a, C: AncestorSource + ?Sized> {
    engine: &'a ProofEngine,
    chain: &'a C,
    header: &'a BlockHeader,
    state: HeaderState,
    lane: Option<BlockLane>,
    work_hash: Option<[u8; 32]>,
}

impl<'a, C: AncestorSource + ?Sized> HeaderValidator<'a, C> {
    pub fn new(engine: &'a ProofEngine, chain: &'a C, header: &'a BlockHeader) -> Self {
        Self {
            engine,
            chain,
            header,
            state: HeaderState::Unvalidated,
            lane: None,
            work_hash: None,
        }
    }

    pub fn state(&self) -> HeaderState {
        self.state
    }

    fn reject<T>(&mut self, e: ConsensusError) -> Result<T, ConsensusError> {
        self.state = HeaderState::Rejected(e.code);
        debug!(
            height = self.header.height,
            code = e.code.as_str(),
            msg = e.msg,
            "header rejected"
        );
        Err(e)
    }

    fn hash_step(&mut self) -> Result<(), ConsensusError> {
        let lane = self.header.lane()?;
        if let BlockLane::Work(_) = lane {
            self.work_hash = Some(self.engine.pow_hash(self.header, self.chain)?);
        }
        self.lane = Some(lane);
        self.state = HeaderState::HeaderHashed;
        Ok(())
    }

    fn context_step(&mut self, now: i64) -> Result<(), ConsensusError> {
        let h = self.header;
        let prev = if h.height == 0 {
            None
        } else {
            let prev = self
                .chain
                .ancestor(u64::from(h.height) - 1)
                .filter(|p| p.hash == h.prev_block_hash)
                .ok_or_else(|| {
                    ConsensusError::new(ErrorCode::BlockErrLinkageInvalid, "parent not on chain")
                })?;
            let times = self.chain.recent_times(prev.height, MEDIAN_TIME_SPAN);
            if let Some(mtp) = median_time_past(&times) {
                if h.time <= mtp {
                    return Err(ConsensusError::new(
                        ErrorCode::BlockErrTimestampOld,
                        "time not after median time past",
                    ));
                }
            }
            Some(prev)
        };
        if i64::from(h.time) > now + MAX_FUTURE_BLOCK_TIME {
            return Err(ConsensusError::new(
                ErrorCode::BlockErrTimestampFuture,
                "time too far in the future",
            ));
        }
        let required = next_work_required(prev.as_ref(), h, self.chain, self.engine.params())?;
        if h.bits != required {
            return Err(ConsensusError::new(
                ErrorCode::BlockErrBadDiffBits,
                "bits differ from required difficulty",
            ));
        }
        self.state = HeaderState::DifficultyChecked;
        Ok(())
    }

    fn proof_step(&mut self, ctx: &HeaderContext<'_>) -> Result<[u8; 32], ConsensusError> {
        let params = self.engine.params();
        let lane = self.lane.map_or_else(|| self.header.lane(), Ok)?;
        let limit = params.pow_limit_for(lane);
        let proof_hash = match (lane, self.work_hash) {
            (BlockLane::Work(_), Some(hash)) => {
                check_proof_of_work(&hash, self.header.bits, limit)?;
                hash
            }
            (BlockLane::Stake, _) => {
                let (kernel, value) = ctx.stake.ok_or_else(|| {
                    ConsensusError::new(ErrorCode::BlockErrStakeInvalid, "stake kernel missing")
                })?;
                check_proof_of_stake(self.header, kernel, value, limit)?
            }
            (BlockLane::Work(_), None) => {
                return Err(ConsensusError::new(
                    ErrorCode::BlockErrPowInvalid,
                    "work hash not computed",
                ))
            }
        };
        check_superblock_payouts(
            BudgetParams::get(params.network),
            u64::from(self.header.height),
            ctx.payouts,
        )?;
        Ok(proof_hash)
    }

    /// Runs every check in order.
    pub fn validate(&mut self, ctx: &HeaderContext<'_>) -> Result<ValidatedHeader, ConsensusError> {
        if self.state != HeaderState::Unvalidated {
            return Err(ConsensusError::new(
                ErrorCode::BlockErrParse,
                "header already validated",
            ));
        }
        if let Err(e) = self.hash_step() {
            return self.reject(e);
        }
        if let Err(e) = self.context_step(ctx.now) {
            return self.reject(e);
        }
        let proof_hash = match self.proof_step(ctx) {
            Ok(h) => h,
            Err(e) => return self.reject(e),
        };
        let entry = match BlockIndexEntry::from_header(self.header, u64::from(self.header.height)) {
            Ok(e) => e,
            Err(e) => return self.reject(e),
        };
        self.state = HeaderState::Accepted;
        Ok(ValidatedHeader { entry, proof_hash })
    }
}
