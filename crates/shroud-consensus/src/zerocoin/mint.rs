use std::collections::HashMap;

use crate::hash::sha256d;

use super::coin::{pubcoin_hash, seed_to_coin, serial_hash, stake_hash, zerocoin_seed, PrivateCoin};
use super::denomination::Denomination;

pub const DETERMINISTIC_MINT_VERSION: u8 = 1;

/// Wallet-side record of a mint derived from a master seed. The coin itself
/// is recomputed from `(master seed, count)` when needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicMint {
    pub version: u8,
    pub count: u32,
    pub seed_hash: [u8; 20],
    pub serial_hash: [u8; 32],
    pub pubcoin_hash: [u8; 32],
    pub stake_hash: [u8; 32],
    pub txid: [u8; 32],
    pub height: u32,
    pub denom: Denomination,
    pub is_used: bool,
}

pub fn master_seed_hash(master_seed: &[u8]) -> [u8; 20] {
    let h = sha256d(master_seed);
    let mut out = [0u8; 20];
    out.copy_from_slice(&h[..20]);
    out
}

impl DeterministicMint {
    pub fn generate(master_seed: &[u8], count: u32, denom: Denomination) -> (Self, PrivateCoin) {
        let coin = seed_to_coin(&zerocoin_seed(master_seed, count), denom);
        let serial = coin.serial_bytes();
        let mint = Self {
            version: DETERMINISTIC_MINT_VERSION,
            count,
            seed_hash: master_seed_hash(master_seed),
            serial_hash: serial_hash(&serial),
            pubcoin_hash: pubcoin_hash(&coin.public_coin()),
            stake_hash: stake_hash(&serial),
            txid: [0u8; 32],
            height: 0,
            denom,
            is_used: false,
        };
        (mint, coin)
    }

    /// Unspent to spent. Returns false if the mint was already spent.
    pub fn mark_spent(&mut self) -> bool {
        if self.is_used {
            return false;
        }
        self.is_used = true;
        true
    }
}

/// In-memory index of a wallet's mints by serial hash and pubcoin hash.
#[derive(Debug, Default)]
pub struct MintTracker {
    by_serial: HashMap<[u8; 32], DeterministicMint>,
    by_pubcoin: HashMap<[u8; 32], [u8; 32]>,
}

impl MintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mint. Returns true when it was new.
    pub fn add(&mut self, mint: DeterministicMint) -> bool {
        self.by_pubcoin.insert(mint.pubcoin_hash, mint.serial_hash);
        self.by_serial.insert(mint.serial_hash, mint).is_none()
    }

    pub fn get_by_serial_hash(&self, hash: &[u8; 32]) -> Option<&DeterministicMint> {
        self.by_serial.get(hash)
    }

    pub fn get_by_pubcoin_hash(&self, hash: &[u8; 32]) -> Option<&DeterministicMint> {
        self.by_pubcoin
            .get(hash)
            .and_then(|serial| self.by_serial.get(serial))
    }

    pub fn has_pubcoin_hash(&self, hash: &[u8; 32]) -> bool {
        self.by_pubcoin.contains_key(hash)
    }

    pub fn set_used(&mut self, serial_hash: &[u8; 32], used: bool) -> bool {
        match self.by_serial.get_mut(serial_hash) {
            Some(m) => {
                m.is_used = used;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, serial_hash: &[u8; 32]) -> Option<DeterministicMint> {
        let mint = self.by_serial.remove(serial_hash)?;
        self.by_pubcoin.remove(&mint.pubcoin_hash);
        Some(mint)
    }

    /// Unspent mints, optionally restricted to confirmed ones, ordered by
    /// height then count.
    pub fn list_unspent(&self, confirmed_only: bool) -> Vec<&DeterministicMint> {
        let mut out: Vec<_> = self
            .by_serial
            .values()
            .filter(|m| !m.is_used && (!confirmed_only || m.height > 0))
            .collect();
        out.sort_by_key(|m| (m.height, m.count));
        out
    }

    /// Sum of unspent face values.
    pub fn balance(&self) -> u64 {
        self.by_serial
            .values()
            .filter(|m| !m.is_used)
            .map(|m| m.denom.amount())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}
