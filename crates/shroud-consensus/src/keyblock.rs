//! Key-block rotation for the keyed memory-hard hash.
//!
//! Every `epoch` blocks the hash is re-keyed with the hash of an older block,
//! `lag` blocks behind the epoch boundary. [`KeyBlockContext`] owns the
//! current key and its scratchpad. Validators hash under the read lock, so a
//! rotation (write lock) can never be observed half-applied.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::block::BlockHeader;
use crate::chain::AncestorSource;
use crate::encode::keyed_seal_input;
use crate::error::{ConsensusError, ErrorCode};
use crate::params::ConsensusParams;
use crate::powhash::KeyedCache;

pub fn key_block_height(height: u64, epoch: u64, lag: u64) -> u64 {
    let epoch = epoch.max(1);
    height.saturating_sub(lag) / epoch * epoch
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBlockInfo {
    pub height: u64,
    pub hash: [u8; 32],
    pub cache_ready: bool,
}

#[derive(Debug)]
struct KeyBlockState {
    height: u64,
    hash: [u8; 32],
    cache: Option<Arc<KeyedCache>>,
}

#[derive(Debug)]
pub struct KeyBlockContext {
    state: RwLock<KeyBlockState>,
    epoch: u64,
    lag: u64,
    cache_items: usize,
    rounds: u32,
}

impl KeyBlockContext {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            state: RwLock::new(KeyBlockState {
                height: 0,
                hash: [0u8; 32],
                cache: None,
            }),
            epoch: params.key_block_epoch,
            lag: params.key_block_lag,
            cache_items: params.pow_hash.keyed_cache_items,
            rounds: params.pow_hash.keyed_rounds,
        }
    }

    pub fn required_key_height(&self, height: u64) -> u64 {
        key_block_height(height, self.epoch, self.lag)
    }

    pub fn info(&self) -> KeyBlockInfo {
        let s = self.state.read();
        KeyBlockInfo {
            height: s.height,
            hash: s.hash,
            cache_ready: s.cache.is_some(),
        }
    }

    fn key_for<C: AncestorSource + ?Sized>(
        &self,
        height: u64,
        chain: &C,
    ) -> Result<(u64, [u8; 32]), ConsensusError> {
        let kh = self.required_key_height(height);
        let entry = chain.ancestor(kh).ok_or_else(|| {
            ConsensusError::new(ErrorCode::BlockErrKeyBlockMissing, "key block not on chain")
        })?;
        Ok((kh, entry.hash))
    }

    /// Re-keys for the block after `tip_height`. Returns whether a rotation
    /// happened. A reorg that replaces the key block at the same height also
    /// rotates.
    pub fn on_tip_changed<C: AncestorSource + ?Sized>(
        &self,
        tip_height: u64,
        chain: &C,
    ) -> Result<bool, ConsensusError> {
        let (kh, key) = self.key_for(tip_height + 1, chain)?;
        {
            let s = self.state.read();
            if s.height == kh && s.hash == key && s.cache.is_some() {
                return Ok(false);
            }
        }

        // Build outside the lock; validators keep using the old key meanwhile.
        let built = KeyedCache::build(key, self.cache_items);
        let mut s = self.state.write();
        s.height = kh;
        s.hash = key;
        match built {
            Ok(cache) => {
                s.cache = Some(Arc::new(cache));
                info!(
                    key_height = kh,
                    key_hash = %hex::encode(key),
                    "keyed hash rotated"
                );
                Ok(true)
            }
            Err(e) => {
                s.cache = None;
                warn!(key_height = kh, error = %e, "keyed cache unavailable");
                Err(ConsensusError::new(
                    ErrorCode::BlockErrDatasetUnavailable,
                    "keyed cache allocation failed",
                ))
            }
        }
    }

    /// Keyed work hash of `header`, keyed by the key block its height requires.
    pub fn keyed_pow_hash<C: AncestorSource + ?Sized>(
        &self,
        header: &BlockHeader,
        chain: &C,
    ) -> Result<[u8; 32], ConsensusError> {
        let (kh, key) = self.key_for(u64::from(header.height), chain)?;
        let input = keyed_seal_input(header);
        {
            let s = self.state.read();
            if s.height == kh && s.hash == key {
                if let Some(cache) = s.cache.as_ref() {
                    return Ok(cache.hash(&input, self.rounds));
                }
            }
        }

        debug!(key_height = kh, "hashing with a temporary keyed cache");
        let tmp = KeyedCache::build(key, self.cache_items).map_err(|e| {
            warn!(key_height = kh, error = %e, "temporary keyed cache unavailable");
            ConsensusError::new(
                ErrorCode::BlockErrDatasetUnavailable,
                "keyed cache allocation failed",
            )
        })?;
        Ok(tmp.hash(&input, self.rounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockLane, PowAlgorithm};
    use crate::chain::{BlockIndexEntry, MemoryChain};
    use crate::params::Network;

    fn chain_with(len: u64, salt: u8) -> MemoryChain {
        let mut chain = MemoryChain::new();
        for h in 0..len {
            chain.push(BlockIndexEntry {
                height: h,
                hash: [h as u8 ^ salt; 32],
                prev_hash: [0u8; 32],
                time: h as u32,
                bits: 0x207f_ffff,
                lane: BlockLane::Work(PowAlgorithm::KeyedMemoryHard),
            });
        }
        chain
    }

    #[test]
    fn key_height_schedule() {
        assert_eq!(key_block_height(0, 2048, 64), 0);
        assert_eq!(key_block_height(2048 + 63, 2048, 64), 0);
        assert_eq!(key_block_height(2048 + 64, 2048, 64), 2048);
        assert_eq!(key_block_height(3 * 2048 + 100, 2048, 64), 3 * 2048);
    }

    #[test]
    fn rotation_happens_once_per_key() {
        let params = ConsensusParams::for_network(Network::Regtest);
        let ctx = KeyBlockContext::new(&params);
        let chain = chain_with(40, 0);

        assert!(ctx.on_tip_changed(3, &chain).unwrap());
        assert_eq!(ctx.info().height, 0);
        assert!(!ctx.on_tip_changed(4, &chain).unwrap());

        // regtest: epoch 16, lag 4; next height 20 keys off block 16.
        assert!(ctx.on_tip_changed(19, &chain).unwrap());
        assert_eq!(ctx.info().height, 16);
        assert!(ctx.info().cache_ready);
    }

    #[test]
    fn reorg_at_key_height_rotates() {
        let params = ConsensusParams::for_network(Network::Regtest);
        let ctx = KeyBlockContext::new(&params);
        let a = chain_with(30, 0);
        let b = chain_with(30, 0x5a);
        assert!(ctx.on_tip_changed(25, &a).unwrap());
        let before = ctx.info();
        assert!(ctx.on_tip_changed(25, &b).unwrap());
        assert_eq!(ctx.info().height, before.height);
        assert_ne!(ctx.info().hash, before.hash);
    }

    #[test]
    fn historical_header_uses_temporary_cache() {
        let params = ConsensusParams::for_network(Network::Regtest);
        let ctx = KeyBlockContext::new(&params);
        let chain = chain_with(60, 0);
        ctx.on_tip_changed(50, &chain).unwrap();

        let mut old = BlockHeader {
            height: 21,
            ..BlockHeader::default()
        };
        old.set_algorithm(PowAlgorithm::KeyedMemoryHard);
        let via_ctx = ctx.keyed_pow_hash(&old, &chain).unwrap();

        let key = chain.ancestor(16).unwrap().hash;
        let direct = KeyedCache::build(key, params.pow_hash.keyed_cache_items)
            .unwrap()
            .hash(&keyed_seal_input(&old), params.pow_hash.keyed_rounds);
        assert_eq!(via_ctx, direct);
        // The current key is untouched.
        assert_eq!(ctx.info().height, 32);
    }

    #[test]
    fn missing_key_block_is_rejection() {
        let params = ConsensusParams::for_network(Network::Regtest);
        let ctx = KeyBlockContext::new(&params);
        let chain = chain_with(10, 0);
        let h = BlockHeader {
            height: 500,
            ..BlockHeader::default()
        };
        let err = ctx.keyed_pow_hash(&h, &chain).unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockErrKeyBlockMissing);
    }
}
