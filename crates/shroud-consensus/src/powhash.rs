//! Memory-hard work hashes.
//!
//! Two SHA3-based constructions share the same shape: a table of 64-byte
//! items is derived from a seed, and the hash walks the table with
//! data-dependent reads.
//!
//! * [`KeyedCache`] is seeded by a key-block hash and rotated every key epoch.
//! * [`EpochCache`] is the light per-epoch cache; [`EpochDataset`] is the full
//!   dataset expanded from it. Both answer the same item lookups, so light
//!   verification and full mining produce identical results.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::hash::{sha3_256, sha3_256_parts, sha3_512_parts};

const KEYED_DOMAIN: &[u8] = b"shroud/keyed-cache";
const EPOCH_DOMAIN: &[u8] = b"shroud/epoch-cache";
const DATASET_PARENTS: u64 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PowHashError {
    /// The table could not be allocated.
    ResourceExhausted { items: u64 },
    /// Construction was stopped by the caller.
    Cancelled,
    /// Zero-sized table requested.
    EmptyTable,
}

impl fmt::Display for PowHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowHashError::ResourceExhausted { items } => {
                write!(f, "cannot allocate {items} work-hash items")
            }
            PowHashError::Cancelled => write!(f, "work-hash table construction cancelled"),
            PowHashError::EmptyTable => write!(f, "work-hash table must not be empty"),
        }
    }
}

impl std::error::Error for PowHashError {}

type Item = [u8; 64];

fn index_of(item: &[u8], len: u64) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&item[..8]);
    u64::from_le_bytes(buf) % len
}

fn alloc_items(n: u64) -> Result<Vec<Item>, PowHashError> {
    if n == 0 {
        return Err(PowHashError::EmptyTable);
    }
    let len = usize::try_from(n).map_err(|_| PowHashError::ResourceExhausted { items: n })?;
    let mut v: Vec<Item> = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| PowHashError::ResourceExhausted { items: n })?;
    Ok(v)
}

// Sequential fill followed by one data-dependent mixing pass.
fn fill_table(seed: Item, n: u64, cancel: Option<&AtomicBool>) -> Result<Vec<Item>, PowHashError> {
    let mut items = alloc_items(n)?;
    items.push(seed);
    for i in 1..n as usize {
        if i % 4096 == 0 && cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(PowHashError::Cancelled);
        }
        let next = sha3_512_parts(&[&items[i - 1]]);
        items.push(next);
    }
    for i in 0..n as usize {
        let j = index_of(&items[i], n) as usize;
        let prev = items[(i + n as usize - 1) % n as usize];
        items[i] = sha3_512_parts(&[&prev, &items[j]]);
    }
    Ok(items)
}

// ----- keyed memory-hard hash -----

pub struct KeyedCache {
    key: [u8; 32],
    items: Vec<Item>,
}

impl fmt::Debug for KeyedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("key", &hex::encode(self.key))
            .field("items", &self.items.len())
            .finish()
    }
}

impl KeyedCache {
    pub fn build(key: [u8; 32], items: usize) -> Result<Self, PowHashError> {
        let seed = sha3_512_parts(&[KEYED_DOMAIN, &key]);
        let items = fill_table(seed, items as u64, None)?;
        Ok(Self { key, items })
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn hash(&self, input: &[u8], rounds: u32) -> [u8; 32] {
        let n = self.items.len() as u64;
        let mut mix = sha3_512_parts(&[&self.key, input]);
        for _ in 0..rounds {
            let j = index_of(&mix, n) as usize;
            mix = sha3_512_parts(&[&mix, &self.items[j]]);
        }
        sha3_256(&mix)
    }
}

// ----- epoch dataset hash -----

pub fn epoch_number(height: u32, epoch_length: u32) -> u32 {
    height / epoch_length.max(1)
}

/// Seed chain: epoch 0 uses the zero seed, each later epoch hashes the previous.
pub fn epoch_seed(epoch: u32) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for _ in 0..epoch {
        seed = sha3_256(&seed);
    }
    seed
}

/// Uniform item access over either the light cache or the full dataset.
pub trait DatasetLookup {
    fn dataset_len(&self) -> u64;
    fn item(&self, index: u64) -> Item;
}

pub struct EpochCache {
    epoch: u32,
    dataset_len: u64,
    items: Vec<Item>,
}

impl fmt::Debug for EpochCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochCache")
            .field("epoch", &self.epoch)
            .field("items", &self.items.len())
            .field("dataset_len", &self.dataset_len)
            .finish()
    }
}

impl EpochCache {
    pub fn build(epoch: u32, cache_items: usize, dataset_len: u64) -> Result<Self, PowHashError> {
        if dataset_len == 0 {
            return Err(PowHashError::EmptyTable);
        }
        let seed = sha3_512_parts(&[EPOCH_DOMAIN, &epoch_seed(epoch)]);
        let items = fill_table(seed, cache_items as u64, None)?;
        Ok(Self {
            epoch,
            dataset_len,
            items,
        })
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    fn derive_item(&self, index: u64) -> Item {
        let n = self.items.len() as u64;
        let mut mix = sha3_512_parts(&[&self.items[(index % n) as usize], &index.to_le_bytes()]);
        for p in 0..DATASET_PARENTS {
            let parent = index_of(&mix, n) ^ p;
            mix = sha3_512_parts(&[&mix, &self.items[(parent % n) as usize]]);
        }
        mix
    }
}

impl DatasetLookup for EpochCache {
    fn dataset_len(&self) -> u64 {
        self.dataset_len
    }

    fn item(&self, index: u64) -> Item {
        self.derive_item(index)
    }
}

pub struct EpochDataset {
    epoch: u32,
    items: Vec<Item>,
}

impl fmt::Debug for EpochDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochDataset")
            .field("epoch", &self.epoch)
            .field("items", &self.items.len())
            .finish()
    }
}

impl EpochDataset {
    /// Expands the full dataset from `cache`. `cancel` is polled while
    /// building; setting it aborts with [`PowHashError::Cancelled`].
    pub fn build(cache: &EpochCache, cancel: &AtomicBool) -> Result<Self, PowHashError> {
        let n = cache.dataset_len;
        let mut items = alloc_items(n)?;
        for i in 0..n {
            if i % 1024 == 0 && cancel.load(Ordering::Relaxed) {
                return Err(PowHashError::Cancelled);
            }
            items.push(cache.derive_item(i));
        }
        Ok(Self {
            epoch: cache.epoch,
            items,
        })
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl DatasetLookup for EpochDataset {
    fn dataset_len(&self) -> u64 {
        self.items.len() as u64
    }

    fn item(&self, index: u64) -> Item {
        self.items[index as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetHash {
    pub final_hash: [u8; 32],
    pub mix_hash: [u8; 32],
}

pub fn dataset_hash<D: DatasetLookup + ?Sized>(
    dataset: &D,
    header_hash: &[u8; 32],
    nonce: u64,
    rounds: u32,
) -> DatasetHash {
    let n = dataset.dataset_len();
    let nonce_bytes = nonce.to_le_bytes();
    let mut mix = sha3_512_parts(&[header_hash, &nonce_bytes]);
    for _ in 0..rounds {
        let idx = index_of(&mix, n);
        mix = sha3_512_parts(&[&mix, &dataset.item(idx)]);
    }
    let mix_hash = sha3_256(&mix);
    let final_hash = sha3_256_parts(&[header_hash, &nonce_bytes, &mix_hash]);
    DatasetHash {
        final_hash,
        mix_hash,
    }
}
