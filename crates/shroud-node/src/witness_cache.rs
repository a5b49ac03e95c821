//! Bounded LRU of coin witnesses with a dirty overflow map.
//!
//! Live entries sit in an arena-backed recency list indexed by key. An
//! entry pushed out of the list moves to the dirty map and stays there
//! until it is read again (promoted back into the list) or flushed.
//! A cached key is always in exactly one of the list or the dirty map.

use std::collections::HashMap;

use parking_lot::Mutex;
use shroud_consensus::zerocoin::CoinWitnessData;
use shroud_store::Store;
use tracing::{debug, trace};

pub const DEFAULT_CACHE_CAPACITY: usize = 2_000;
pub const DEFAULT_DIRTY_THRESHOLD: usize = 1_000;

pub type WitnessKey = [u8; 32];

/// Backing storage for flushed witnesses.
pub trait PrecomputeStore: Send + Sync {
    /// Writes every entry in one atomic batch.
    fn write_precomputes(&self, entries: &[(WitnessKey, CoinWitnessData)]) -> Result<(), String>;

    fn read_precompute(&self, key: &WitnessKey) -> Result<Option<CoinWitnessData>, String>;

    fn erase_precompute(&self, key: &WitnessKey) -> Result<(), String>;

    /// Visits stored witnesses until `f` returns false.
    fn load_precomputes(
        &self,
        f: &mut dyn FnMut(WitnessKey, CoinWitnessData) -> bool,
    ) -> Result<(), String>;
}

impl PrecomputeStore for Store {
    fn write_precomputes(&self, entries: &[(WitnessKey, CoinWitnessData)]) -> Result<(), String> {
        let batch = self.begin_write()?;
        for (key, w) in entries {
            batch.put_precompute(key, w)?;
        }
        batch.commit()
    }

    fn read_precompute(&self, key: &WitnessKey) -> Result<Option<CoinWitnessData>, String> {
        Store::read_precompute(self, key)
    }

    fn erase_precompute(&self, key: &WitnessKey) -> Result<(), String> {
        Store::erase_precompute(self, key)
    }

    fn load_precomputes(
        &self,
        f: &mut dyn FnMut(WitnessKey, CoinWitnessData) -> bool,
    ) -> Result<(), String> {
        Store::load_precomputes(self, f)
    }
}

struct Node {
    key: WitnessKey,
    data: CoinWitnessData,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Lru {
    capacity: usize,
    dirty_threshold: usize,
    // Freed slots keep stale contents until reused.
    slots: Vec<Node>,
    free: Vec<usize>,
    // Most recent at head.
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<WitnessKey, usize>,
    dirty: HashMap<WitnessKey, CoinWitnessData>,
}

impl Lru {
    fn node(&self, i: usize) -> &Node {
        &self.slots[i]
    }

    fn node_mut(&mut self, i: usize) -> &mut Node {
        &mut self.slots[i]
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = {
            let n = self.node(i);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, i: usize) {
        let old = self.head;
        {
            let n = self.node_mut(i);
            n.prev = None;
            n.next = old;
        }
        if let Some(h) = old {
            self.node_mut(h).prev = Some(i);
        }
        self.head = Some(i);
        if self.tail.is_none() {
            self.tail = Some(i);
        }
    }

    fn touch(&mut self, i: usize) {
        if self.head != Some(i) {
            self.unlink(i);
            self.push_front(i);
        }
    }

    fn release(&mut self, i: usize) -> (WitnessKey, CoinWitnessData) {
        self.unlink(i);
        self.free.push(i);
        let n = &self.slots[i];
        (n.key, n.data.clone())
    }

    fn insert_front(&mut self, key: WitnessKey, data: CoinWitnessData) {
        let node = Node {
            key,
            data,
            prev: None,
            next: None,
        };
        let i = match self.free.pop() {
            Some(i) => {
                self.slots[i] = node;
                i
            }
            None => {
                self.slots.push(node);
                self.slots.len() - 1
            }
        };
        self.index.insert(key, i);
        self.push_front(i);
        self.evict_if_full();
    }

    fn evict_if_full(&mut self) {
        while self.index.len() > self.capacity {
            let Some(t) = self.tail else { return };
            let (key, data) = self.release(t);
            self.index.remove(&key);
            trace!(key = %hex::encode(key), "witness evicted to dirty map");
            self.dirty.insert(key, data);
        }
    }

    fn add(&mut self, key: WitnessKey, data: CoinWitnessData) {
        self.dirty.remove(&key);
        match self.index.get(&key).copied() {
            Some(i) => {
                self.node_mut(i).data = data;
                self.touch(i);
            }
            None => self.insert_front(key, data),
        }
    }

    fn get(&mut self, key: &WitnessKey) -> Option<CoinWitnessData> {
        if let Some(data) = self.dirty.remove(key) {
            self.insert_front(*key, data.clone());
            return Some(data);
        }
        let i = *self.index.get(key)?;
        self.touch(i);
        Some(self.node(i).data.clone())
    }

    fn remove(&mut self, key: &WitnessKey) -> bool {
        let dirty = self.dirty.remove(key).is_some();
        let live = match self.index.remove(key) {
            Some(i) => {
                self.release(i);
                true
            }
            None => false,
        };
        dirty || live
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.index.clear();
        self.dirty.clear();
    }

    /// Live entries from most to least recent.
    fn live(&self) -> Vec<(WitnessKey, CoinWitnessData)> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = self.node(i);
            out.push((n.key, n.data.clone()));
            cur = n.next;
        }
        out
    }
}

/// Thread-safe witness cache. Every public operation holds the one lock for
/// its whole duration.
pub struct WitnessCache {
    inner: Mutex<Lru>,
}

impl WitnessCache {
    pub fn new(capacity: usize, dirty_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(Lru {
                capacity: capacity.max(1),
                dirty_threshold,
                slots: Vec::new(),
                free: Vec::new(),
                head: None,
                tail: None,
                index: HashMap::new(),
                dirty: HashMap::new(),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_DIRTY_THRESHOLD)
    }

    /// Inserts or refreshes `key` as most recent.
    pub fn add_to_cache(&self, key: WitnessKey, data: CoinWitnessData) {
        self.inner.lock().add(key, data);
    }

    /// Cached witness for `key`; a miss means it has to be recomputed.
    pub fn get_witness_data(&self, key: &WitnessKey) -> Option<CoinWitnessData> {
        self.inner.lock().get(key)
    }

    pub fn contains(&self, key: &WitnessKey) -> bool {
        let l = self.inner.lock();
        l.index.contains_key(key) || l.dirty.contains_key(key)
    }

    pub fn remove(&self, key: &WitnessKey) -> bool {
        self.inner.lock().remove(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dirty_len(&self) -> usize {
        self.inner.lock().dirty.len()
    }

    pub fn needs_flush(&self) -> bool {
        let l = self.inner.lock();
        l.dirty.len() >= l.dirty_threshold
    }

    /// Every cached key, live entries first.
    pub fn keys(&self) -> Vec<WitnessKey> {
        let l = self.inner.lock();
        let mut out: Vec<WitnessKey> = l.live().into_iter().map(|(k, _)| k).collect();
        out.extend(l.dirty.keys().copied());
        out
    }

    /// Writes dirty and live entries to `store`. The live list is kept;
    /// the dirty map is emptied only once the write has succeeded.
    pub fn flush_to_disk(&self, store: &dyn PrecomputeStore) -> Result<usize, String> {
        let mut l = self.inner.lock();
        let mut entries: Vec<(WitnessKey, CoinWitnessData)> =
            l.dirty.iter().map(|(k, v)| (*k, v.clone())).collect();
        entries.extend(l.live());
        store.write_precomputes(&entries)?;
        let dirty = l.dirty.len();
        l.dirty.clear();
        debug!(written = entries.len(), dirty, "witness cache flushed");
        Ok(entries.len())
    }

    /// Fills the cache from `store`, stopping at capacity. Returns how many
    /// entries were loaded.
    pub fn load_from_store(&self, store: &dyn PrecomputeStore) -> Result<usize, String> {
        let mut l = self.inner.lock();
        let room = l.capacity.saturating_sub(l.index.len());
        let mut loaded = 0usize;
        store.load_precomputes(&mut |key, data| {
            if loaded >= room {
                return false;
            }
            if !l.index.contains_key(&key) && !l.dirty.contains_key(&key) {
                l.insert_front(key, data);
                loaded += 1;
            }
            true
        })?;
        debug!(loaded, "witness cache loaded");
        Ok(loaded)
    }
}
