//! Background witness precomputation.
//!
//! [`Precomputer`] advances cached witnesses toward the newest checkpoint
//! of each anonymity set, a bounded amount per cycle. [`FlushWorker`] periodically writes the
//! cache to the store and flushes once more when stopped.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use shroud_consensus::zerocoin::{pubcoin_hash, AccumulatorMap, CoinWitnessData, PublicCoin};
use tracing::{debug, info, warn};

use crate::error::NodeResult;
use crate::witness_cache::{PrecomputeStore, WitnessCache, WitnessKey};

pub const DEFAULT_BLOCKS_PER_CYCLE: u32 = 100;
pub const MIN_BLOCKS_PER_CYCLE: u32 = 100;
pub const MAX_BLOCKS_PER_CYCLE: u32 = 2_000;

/// Rounds down to a multiple of ten, then clamps to the allowed range.
pub fn clamp_blocks_per_cycle(n: u32) -> u32 {
    (n - n % 10).clamp(MIN_BLOCKS_PER_CYCLE, MAX_BLOCKS_PER_CYCLE)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub witnesses: usize,
    pub folded: usize,
    pub misses: usize,
}

pub struct Precomputer {
    cache: Arc<WitnessCache>,
    blocks_per_cycle: AtomicU32,
}

impl Precomputer {
    pub fn new(cache: Arc<WitnessCache>, blocks_per_cycle: u32) -> Self {
        Self {
            cache,
            blocks_per_cycle: AtomicU32::new(clamp_blocks_per_cycle(blocks_per_cycle)),
        }
    }

    pub fn cache(&self) -> &Arc<WitnessCache> {
        &self.cache
    }

    pub fn set_blocks_per_cycle(&self, n: u32) -> u32 {
        let n = clamp_blocks_per_cycle(n);
        self.blocks_per_cycle.store(n, Ordering::Relaxed);
        n
    }

    pub fn blocks_per_cycle(&self) -> u32 {
        self.blocks_per_cycle.load(Ordering::Relaxed)
    }

    /// Starts tracking a witness for a mint confirmed at `height`.
    pub fn track(&self, coin: &PublicCoin, txid: [u8; 32], height: u32) -> WitnessKey {
        let key = pubcoin_hash(coin);
        if !self.cache.contains(&key) {
            self.cache
                .add_to_cache(key, CoinWitnessData::new(coin, txid, height));
        }
        key
    }

    /// Advances one witness, never past the newest checkpoint of its set.
    /// `None` when it is not cached.
    pub fn precompute(
        &self,
        key: &WitnessKey,
        sets: &AccumulatorMap,
        height: u32,
    ) -> Option<usize> {
        let mut w = self.cache.get_witness_data(key)?;
        let set = sets.set(w.denom);
        let limit = set.latest_checkpoint().map_or(0, |(_, prefix)| prefix);
        let folded = w.advance_until(set, limit, self.blocks_per_cycle() as usize, height);
        self.cache.add_to_cache(*key, w);
        Some(folded)
    }

    /// One cycle over every cached witness.
    pub fn run_cycle(&self, sets: &AccumulatorMap, height: u32) -> CycleSummary {
        let mut summary = CycleSummary::default();
        for key in self.cache.keys() {
            match self.precompute(&key, sets, height) {
                Some(n) => {
                    summary.witnesses += 1;
                    summary.folded += n;
                }
                None => summary.misses += 1,
            }
        }
        debug!(
            witnesses = summary.witnesses,
            folded = summary.folded,
            height,
            "precompute cycle"
        );
        summary
    }
}

/// Periodic cache-to-store writer.
pub struct FlushWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    pub fn spawn(
        cache: Arc<WitnessCache>,
        store: Arc<dyn PrecomputeStore>,
        interval: Duration,
    ) -> NodeResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("precompute-flush".into())
            .spawn(move || flush_loop(&cache, store.as_ref(), interval, &stop_flag))?;
        info!(interval_secs = interval.as_secs(), "precompute flush worker started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the worker after its final flush.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("precompute flush worker panicked");
            }
        }
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn flush_once(cache: &WitnessCache, store: &dyn PrecomputeStore) {
    let start = Instant::now();
    match cache.flush_to_disk(store) {
        Ok(n) => debug!(
            written = n,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "precomputes dumped"
        ),
        Err(e) => warn!(error = %e, "precompute flush failed"),
    }
}

fn flush_loop(
    cache: &WitnessCache,
    store: &dyn PrecomputeStore,
    interval: Duration,
    stop: &AtomicBool,
) {
    let poll = interval.min(Duration::from_millis(250));
    let mut last = Instant::now();
    while !stop.load(Ordering::Relaxed) {
        thread::park_timeout(poll);
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if cache.needs_flush() || last.elapsed() >= interval {
            flush_once(cache, store);
            last = Instant::now();
        }
    }
    flush_once(cache, store);
    info!("precompute flush worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_consensus::zerocoin::{seed_to_coin, zerocoin_seed, Denomination};

    fn coin(i: u32) -> PublicCoin {
        seed_to_coin(&zerocoin_seed(b"precompute", i), Denomination::Ten).public_coin()
    }

    #[test]
    fn blocks_per_cycle_bounds() {
        assert_eq!(clamp_blocks_per_cycle(0), 100);
        assert_eq!(clamp_blocks_per_cycle(109), 100);
        assert_eq!(clamp_blocks_per_cycle(555), 550);
        assert_eq!(clamp_blocks_per_cycle(5_000), 2_000);
    }

    #[test]
    fn cycles_fold_at_most_the_bound() {
        let mut sets = AccumulatorMap::new();
        for i in 0..250 {
            sets.add(coin(i));
        }
        sets.checkpoint_all();
        let p = Precomputer::new(Arc::new(WitnessCache::new(10, 10)), 100);
        let key = p.track(&coin(0), [1u8; 32], 5);

        assert_eq!(p.run_cycle(&sets, 20).folded, 100);
        assert_eq!(p.precompute(&key, &sets, 21), Some(100));
        assert_eq!(p.precompute(&key, &sets, 22), Some(50));
        assert_eq!(p.precompute(&key, &sets, 23), Some(0));
        let w = p.cache().get_witness_data(&key).unwrap();
        assert!(w.is_current(sets.set(Denomination::Ten)));
        assert_eq!(w.height_precomputed, 23);
        assert_eq!(p.precompute(&[0u8; 32], &sets, 23), None);
    }

    #[test]
    fn witnesses_stop_at_the_latest_checkpoint() {
        let mut sets = AccumulatorMap::new();
        let p = Precomputer::new(Arc::new(WitnessCache::new(10, 10)), 100);
        let key = p.track(&coin(0), [1u8; 32], 1);
        sets.add(coin(0));
        assert_eq!(p.precompute(&key, &sets, 2), Some(0));

        for i in 1..6 {
            sets.add(coin(i));
        }
        let cp = sets.set_mut(Denomination::Ten).checkpoint();
        sets.add(coin(6));
        assert_eq!(p.precompute(&key, &sets, 10), Some(6));
        let w = p.cache().get_witness_data(&key).unwrap();
        assert_eq!(w.accumulator, cp);
        assert!(!w.is_current(sets.set(Denomination::Ten)));
    }
}
