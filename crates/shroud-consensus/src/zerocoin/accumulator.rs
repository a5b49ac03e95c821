//! Per-denomination anonymity sets.
//!
//! Every mint extends a running hash accumulator:
//! `acc' = SHA3-256("acc" || denom || acc || pubcoin)`. A checkpoint is an
//! accumulator value that spends may reference; it names the set prefix
//! that existed when the value was produced.

use std::collections::HashMap;

use crate::hash::{sha256d_parts, sha3_256_parts};

use super::coin::PublicCoin;
use super::denomination::{Denomination, DENOMINATIONS};

pub fn accumulator_step(denom: Denomination, acc: &[u8; 32], coin: &PublicCoin) -> [u8; 32] {
    sha3_256_parts(&[
        b"acc",
        &denom.to_int().to_le_bytes(),
        acc,
        &coin.to_bytes(),
    ])
}

pub fn empty_accumulator(denom: Denomination) -> [u8; 32] {
    sha3_256_parts(&[b"acc-empty", &denom.to_int().to_le_bytes()])
}

#[derive(Clone, Debug)]
pub struct AnonymitySet {
    denom: Denomination,
    members: Vec<PublicCoin>,
    /// `values[n]` is the accumulator after the first `n` members.
    values: Vec<[u8; 32]>,
    checkpoints: HashMap<[u8; 32], usize>,
}

impl AnonymitySet {
    pub fn new(denom: Denomination) -> Self {
        Self {
            denom,
            members: Vec::new(),
            values: vec![empty_accumulator(denom)],
            checkpoints: HashMap::new(),
        }
    }

    pub fn denom(&self) -> Denomination {
        self.denom
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn value(&self) -> [u8; 32] {
        self.value_at(self.members.len()).unwrap_or_default()
    }

    pub fn value_at(&self, prefix: usize) -> Option<[u8; 32]> {
        self.values.get(prefix).copied()
    }

    pub fn members(&self) -> &[PublicCoin] {
        &self.members
    }

    pub fn add(&mut self, coin: PublicCoin) {
        let next = accumulator_step(self.denom, &self.value(), &coin);
        self.members.push(coin);
        self.values.push(next);
    }

    /// Removes the newest member, dropping checkpoints that covered it.
    pub fn pop(&mut self) -> Option<PublicCoin> {
        let coin = self.members.pop()?;
        self.values.pop();
        let len = self.members.len();
        self.checkpoints.retain(|_, prefix| *prefix <= len);
        Some(coin)
    }

    /// Registers the current value as a checkpoint and returns it.
    pub fn checkpoint(&mut self) -> [u8; 32] {
        let value = self.value();
        self.checkpoints.insert(value, self.members.len());
        value
    }

    pub fn has_checkpoint(&self, checkpoint: &[u8; 32]) -> bool {
        self.checkpoints.contains_key(checkpoint)
    }

    /// Unregisters `checkpoint` when the block that produced it is
    /// disconnected.
    pub fn forget_checkpoint(&mut self, checkpoint: &[u8; 32]) -> bool {
        self.checkpoints.remove(checkpoint).is_some()
    }

    /// The checkpoint covering the longest prefix, with that prefix length.
    pub fn latest_checkpoint(&self) -> Option<([u8; 32], usize)> {
        self.checkpoints
            .iter()
            .max_by_key(|(_, prefix)| **prefix)
            .map(|(value, prefix)| (*value, *prefix))
    }

    /// The set prefix named by `checkpoint`.
    pub fn members_at(&self, checkpoint: &[u8; 32]) -> Option<&[PublicCoin]> {
        let prefix = *self.checkpoints.get(checkpoint)?;
        self.members.get(..prefix)
    }

    pub fn position(&self, coin: &PublicCoin) -> Option<usize> {
        self.members.iter().position(|m| m == coin)
    }
}

/// The four denomination sets side by side.
#[derive(Clone, Debug)]
pub struct AccumulatorMap {
    sets: [AnonymitySet; 4],
}

impl Default for AccumulatorMap {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(denom: Denomination) -> usize {
    match denom {
        Denomination::Ten => 0,
        Denomination::OneHundred => 1,
        Denomination::OneThousand => 2,
        Denomination::TenThousand => 3,
    }
}

impl AccumulatorMap {
    pub fn new() -> Self {
        Self {
            sets: DENOMINATIONS.map(AnonymitySet::new),
        }
    }

    pub fn set(&self, denom: Denomination) -> &AnonymitySet {
        &self.sets[slot(denom)]
    }

    pub fn set_mut(&mut self, denom: Denomination) -> &mut AnonymitySet {
        &mut self.sets[slot(denom)]
    }

    pub fn add(&mut self, coin: PublicCoin) {
        self.set_mut(coin.denom).add(coin);
    }

    /// Checkpoints every set and returns the values that were not
    /// registered before.
    pub fn checkpoint_all(&mut self) -> Vec<(Denomination, [u8; 32])> {
        let mut added = Vec::new();
        for set in &mut self.sets {
            let value = set.value();
            if !set.has_checkpoint(&value) {
                set.checkpoint();
                added.push((set.denom, value));
            }
        }
        added
    }

    /// Current accumulator value per denomination.
    pub fn checkpoint_hashes(&self) -> [(Denomination, [u8; 32]); 4] {
        DENOMINATIONS.map(|d| (d, self.set(d).value()))
    }

    /// Single commitment over all four values, stored in block metadata.
    pub fn combined_checkpoint(&self) -> [u8; 32] {
        let values = self.checkpoint_hashes().map(|(_, v)| v);
        sha256d_parts(&[&values[0], &values[1], &values[2], &values[3]])
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zerocoin::coin::{seed_to_coin, zerocoin_seed};

    fn coin(i: u32, denom: Denomination) -> PublicCoin {
        seed_to_coin(&zerocoin_seed(b"acc-test", i), denom).public_coin()
    }

    #[test]
    fn accumulator_is_order_dependent() {
        let mut a = AnonymitySet::new(Denomination::Ten);
        let mut b = AnonymitySet::new(Denomination::Ten);
        a.add(coin(1, Denomination::Ten));
        a.add(coin(2, Denomination::Ten));
        b.add(coin(2, Denomination::Ten));
        b.add(coin(1, Denomination::Ten));
        assert_ne!(a.value(), b.value());
        assert_ne!(a.value(), empty_accumulator(Denomination::Ten));
    }

    #[test]
    fn checkpoints_name_prefixes() {
        let mut set = AnonymitySet::new(Denomination::Ten);
        set.add(coin(1, Denomination::Ten));
        let cp1 = set.checkpoint();
        set.add(coin(2, Denomination::Ten));
        set.add(coin(3, Denomination::Ten));
        let cp3 = set.checkpoint();

        assert_eq!(set.members_at(&cp1).unwrap().len(), 1);
        assert_eq!(set.members_at(&cp3).unwrap().len(), 3);
        assert!(set.members_at(&[0u8; 32]).is_none());

        assert_eq!(set.latest_checkpoint(), Some((cp3, 3)));

        set.pop();
        assert!(!set.has_checkpoint(&cp3));
        assert!(set.has_checkpoint(&cp1));
        assert_eq!(set.value_at(2), Some(set.value()));
        assert_eq!(set.latest_checkpoint(), Some((cp1, 1)));

        assert!(set.forget_checkpoint(&cp1));
        assert!(!set.forget_checkpoint(&cp1));
        assert_eq!(set.latest_checkpoint(), None);
    }

    #[test]
    fn map_routes_by_denomination() {
        let mut map = AccumulatorMap::new();
        let before = map.combined_checkpoint();
        map.add(coin(1, Denomination::OneHundred));
        assert_eq!(map.set(Denomination::OneHundred).len(), 1);
        assert!(map.set(Denomination::Ten).is_empty());
        assert_ne!(map.combined_checkpoint(), before);

        assert_eq!(map.checkpoint_all().len(), 4);
        let hashes = map.checkpoint_hashes();
        for (d, v) in hashes {
            assert!(map.set(d).has_checkpoint(&v));
        }
        assert!(map.checkpoint_all().is_empty());
        map.reset();
        assert_eq!(map.combined_checkpoint(), before);
    }
}
