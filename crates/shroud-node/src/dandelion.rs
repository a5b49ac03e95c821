//! Dandelion++ stem relay.
//!
//! Each new transaction is tracked as a stem until its stem window closes.
//! While tracked it is forwarded to a single randomly chosen peer, and
//! each processing round queues it to send with a small probability.
//! Expired stems are dropped; flooding them is up to the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, trace};

use crate::time::AdjustedClock;

pub type NodeId = i64;

/// Origin used for transactions created by this node.
pub const LOCAL_NODE: NodeId = -1;

/// Relay timing and probabilities. The defaults are tuning values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayPolicy {
    /// Seconds a transaction stays in the stem phase.
    pub stem_duration: i64,
    /// Minimum seconds between two target choices for one stem.
    pub reroll_interval: i64,
    pub fluff_one_in: u32,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            stem_duration: 120,
            reroll_interval: 5,
            fluff_one_in: 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stem {
    pub stem_end: i64,
    pub origin: NodeId,
    pub last_reroll: Option<i64>,
    pub target: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub expired: usize,
    pub rerolled: usize,
    pub queued: usize,
}

struct RelayState {
    stems: BTreeMap<[u8; 32], Stem>,
    pending: BTreeSet<[u8; 32]>,
    rng: ChaCha20Rng,
}

pub struct DandelionRelay {
    policy: RelayPolicy,
    clock: Arc<dyn AdjustedClock>,
    state: Mutex<RelayState>,
}

impl DandelionRelay {
    pub fn new(policy: RelayPolicy, clock: Arc<dyn AdjustedClock>, rng: ChaCha20Rng) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(RelayState {
                stems: BTreeMap::new(),
                pending: BTreeSet::new(),
                rng,
            }),
        }
    }

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    /// Starts tracking `hash`. Returns false if it is already tracked.
    pub fn add(&self, hash: [u8; 32], stem_end: i64, origin: NodeId) -> bool {
        let mut s = self.state.lock();
        if s.stems.contains_key(&hash) {
            return false;
        }
        s.stems.insert(
            hash,
            Stem {
                stem_end,
                origin,
                last_reroll: None,
                target: None,
            },
        );
        trace!(hash = %hex::encode(hash), origin, stem_end, "stem added");
        true
    }

    pub fn add_with_default_stem(&self, hash: [u8; 32], origin: NodeId) -> bool {
        let end = self.clock.adjusted_time() + self.policy.stem_duration;
        self.add(hash, end, origin)
    }

    /// One relay round over the current peer snapshot.
    pub fn process(&self, peers: &[NodeId]) -> ProcessSummary {
        let now = self.clock.adjusted_time();
        let policy = self.policy;
        let mut guard = self.state.lock();
        let RelayState {
            stems,
            pending,
            rng,
        } = &mut *guard;
        let mut summary = ProcessSummary::default();
        let mut expired = Vec::new();

        for (hash, stem) in stems.iter_mut() {
            if now >= stem.stem_end {
                expired.push(*hash);
                continue;
            }
            if pending.contains(hash) {
                continue;
            }
            if matches!(stem.last_reroll, Some(t) if now - t < policy.reroll_interval) {
                continue;
            }
            let candidates: Vec<NodeId> =
                peers.iter().copied().filter(|p| *p != stem.origin).collect();
            if candidates.is_empty() {
                continue;
            }
            stem.target = Some(candidates[rng.gen_range(0..candidates.len())]);
            stem.last_reroll = Some(now);
            summary.rerolled += 1;
            if rng.gen_ratio(1, policy.fluff_one_in.max(1)) {
                pending.insert(*hash);
                summary.queued += 1;
            }
        }

        for hash in &expired {
            stems.remove(hash);
            pending.remove(hash);
        }
        summary.expired = expired.len();
        if summary != ProcessSummary::default() {
            debug!(
                expired = summary.expired,
                rerolled = summary.rerolled,
                queued = summary.queued,
                tracked = stems.len(),
                "dandelion round"
            );
        }
        summary
    }

    pub fn is_correct_node_to_send(&self, hash: &[u8; 32], node: NodeId) -> bool {
        self.forward_target(hash) == Some(node)
    }

    pub fn forward_target(&self, hash: &[u8; 32]) -> Option<NodeId> {
        self.state.lock().stems.get(hash).and_then(|s| s.target)
    }

    /// Records that `hash` went to `node`. Only the chosen target ends the
    /// stem; returns whether it did.
    pub fn set_inventory_sent(&self, hash: &[u8; 32], node: NodeId) -> bool {
        let mut s = self.state.lock();
        if s.stems.get(hash).and_then(|st| st.target) != Some(node) {
            return false;
        }
        s.stems.remove(hash);
        s.pending.remove(hash);
        true
    }

    /// Stops tracking `hash`.
    pub fn mark_sent(&self, hash: &[u8; 32]) -> bool {
        let mut s = self.state.lock();
        s.pending.remove(hash);
        s.stems.remove(hash).is_some()
    }

    pub fn is_in_stem_phase(&self, hash: &[u8; 32]) -> bool {
        let now = self.clock.adjusted_time();
        self.state
            .lock()
            .stems
            .get(hash)
            .is_some_and(|s| now < s.stem_end)
    }

    /// End of the stem window, or 0 for an untracked hash.
    pub fn time_stem_phase_end(&self, hash: &[u8; 32]) -> i64 {
        self.state.lock().stems.get(hash).map_or(0, |s| s.stem_end)
    }

    /// Untracked hashes are always safe to send.
    pub fn is_queued_to_send(&self, hash: &[u8; 32]) -> bool {
        let s = self.state.lock();
        !s.stems.contains_key(hash) || s.pending.contains(hash)
    }

    /// Queued hashes whose forward target is `node`.
    pub fn queued_for(&self, node: NodeId) -> Vec<[u8; 32]> {
        let s = self.state.lock();
        s.pending
            .iter()
            .filter(|h| s.stems.get(*h).and_then(|st| st.target) == Some(node))
            .copied()
            .collect()
    }

    pub fn tracked_len(&self) -> usize {
        self.state.lock().stems.len()
    }
}
