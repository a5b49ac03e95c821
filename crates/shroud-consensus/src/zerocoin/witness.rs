use super::accumulator::{accumulator_step, empty_accumulator, AnonymitySet};
use super::coin::PublicCoin;
use super::denomination::Denomination;

/// Checkpoints land on every tenth block.
pub const CHECKPOINT_INTERVAL: u32 = 10;

/// Spend witness state for one coin, advanced incrementally over the
/// anonymity set so that spending does not replay the whole set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinWitnessData {
    pub denom: Denomination,
    pub height_checkpoint: u32,
    pub height_mint_added: u32,
    pub height_acc_start: u32,
    pub height_precomputed: u32,
    pub mints_added: u32,
    pub txid: [u8; 32],
    /// Encoded public coin.
    pub coin: [u8; 32],
    /// Accumulator over the first `mints_added` set members.
    pub accumulator: [u8; 32],
}

impl CoinWitnessData {
    pub fn new(coin: &PublicCoin, txid: [u8; 32], height: u32) -> Self {
        let mut w = Self {
            denom: coin.denom,
            height_checkpoint: 0,
            height_mint_added: 0,
            height_acc_start: 0,
            height_precomputed: 0,
            mints_added: 0,
            txid,
            coin: coin.to_bytes(),
            accumulator: empty_accumulator(coin.denom),
        };
        w.set_height_mint_added(height);
        w
    }

    /// Records the mint height; the first usable checkpoint is the next
    /// multiple of ten strictly above it.
    pub fn set_height_mint_added(&mut self, height: u32) {
        self.height_mint_added = height;
        self.height_checkpoint =
            height.saturating_add(CHECKPOINT_INTERVAL - height % CHECKPOINT_INTERVAL);
        self.height_acc_start = height - height % CHECKPOINT_INTERVAL;
    }

    pub fn public_coin(&self) -> Option<PublicCoin> {
        PublicCoin::from_bytes(&self.coin, self.denom)
    }

    /// Folds up to `max_mints` further set members into the accumulator and
    /// marks the witness precomputed to `height`. Returns how many were
    /// folded. A set shorter than what was already folded (after a reorg)
    /// resets the witness to the empty accumulator first.
    pub fn advance(&mut self, set: &AnonymitySet, max_mints: usize, height: u32) -> usize {
        self.advance_until(set, set.len(), max_mints, height)
    }

    /// Like [`advance`](Self::advance), but never folds past the first
    /// `limit` members, so the witness can stop on a checkpoint.
    pub fn advance_until(
        &mut self,
        set: &AnonymitySet,
        limit: usize,
        max_mints: usize,
        height: u32,
    ) -> usize {
        let limit = limit.min(set.len());
        let done = self.mints_added as usize;
        if done > limit || set.value_at(done) != Some(self.accumulator) {
            self.reset();
        }
        let start = self.mints_added as usize;
        let end = limit.min(start.saturating_add(max_mints));
        for coin in &set.members()[start..end] {
            self.accumulator = accumulator_step(self.denom, &self.accumulator, coin);
        }
        let folded = end - start;
        self.mints_added += folded as u32;
        self.height_precomputed = self.height_precomputed.max(height);
        folded
    }

    pub fn reset(&mut self) {
        self.mints_added = 0;
        self.height_precomputed = 0;
        self.accumulator = empty_accumulator(self.denom);
    }

    /// Whether the witness has caught up with `set`.
    pub fn is_current(&self, set: &AnonymitySet) -> bool {
        self.mints_added as usize == set.len() && self.accumulator == set.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zerocoin::coin::{seed_to_coin, zerocoin_seed};

    fn coin(i: u32) -> PublicCoin {
        seed_to_coin(&zerocoin_seed(b"witness", i), Denomination::Ten).public_coin()
    }

    #[test]
    fn checkpoint_heights() {
        let w = CoinWitnessData::new(&coin(0), [1u8; 32], 123);
        assert_eq!(w.height_mint_added, 123);
        assert_eq!(w.height_checkpoint, 130);
        assert_eq!(w.height_acc_start, 120);

        let w = CoinWitnessData::new(&coin(0), [1u8; 32], 120);
        assert_eq!(w.height_checkpoint, 130);
        assert_eq!(w.height_acc_start, 120);

        let w = CoinWitnessData::new(&coin(0), [1u8; 32], u32::MAX - 1);
        assert_eq!(w.height_checkpoint, u32::MAX);
        assert_eq!(w.height_acc_start, u32::MAX - 5);
    }

    #[test]
    fn advance_in_steps_matches_set() {
        let mut set = AnonymitySet::new(Denomination::Ten);
        for i in 0..25 {
            set.add(coin(i));
        }
        let mut w = CoinWitnessData::new(&coin(3), [0u8; 32], 10);
        assert_eq!(w.advance(&set, 10, 11), 10);
        assert_eq!(Some(w.accumulator), set.value_at(10));
        assert_eq!(w.advance(&set, 10, 12), 10);
        assert_eq!(w.advance(&set, 10, 13), 5);
        assert!(w.is_current(&set));
        assert_eq!(w.advance(&set, 10, 14), 0);
        assert_eq!(w.height_precomputed, 14);
    }

    #[test]
    fn advance_stops_at_limit() {
        let mut set = AnonymitySet::new(Denomination::Ten);
        for i in 0..8 {
            set.add(coin(i));
        }
        let cp = set.checkpoint();
        set.add(coin(8));
        set.add(coin(9));

        let mut w = CoinWitnessData::new(&coin(2), [0u8; 32], 3);
        assert_eq!(w.advance_until(&set, 8, 100, 20), 8);
        assert_eq!(w.accumulator, cp);
        assert!(!w.is_current(&set));

        // A witness already past the limit starts over.
        w.advance(&set, 100, 21);
        assert!(w.is_current(&set));
        assert_eq!(w.advance_until(&set, 8, 100, 22), 8);
        assert_eq!(w.accumulator, cp);
    }

    #[test]
    fn reorg_resets_witness() {
        let mut set = AnonymitySet::new(Denomination::Ten);
        for i in 0..5 {
            set.add(coin(i));
        }
        let mut w = CoinWitnessData::new(&coin(0), [0u8; 32], 1);
        w.advance(&set, 100, 5);
        set.pop();
        set.pop();
        set.add(coin(99));
        assert!(!w.is_current(&set));
        assert_eq!(w.advance(&set, 100, 6), 4);
        assert!(w.is_current(&set));
    }
}
