use std::collections::{HashMap, HashSet};

use rand::RngCore;
use tracing::{debug, warn};

use crate::blacklist::Blacklist;
use crate::error::{ConsensusError, ErrorCode};
use crate::tx::TxSummary;

use super::accumulator::AccumulatorMap;
use super::coin::{pubcoin_hash, PrivateCoin, PublicCoin};
use super::denomination::Denomination;
use super::spend::{CoinSpend, SpendType};
use super::witness::{CoinWitnessData, CHECKPOINT_INTERVAL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpentSerial {
    pub txid: [u8; 32],
    pub height: u32,
}

/// Zerocoin changes made by one connected block, kept to disconnect it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockUndo {
    pub height: u32,
    pub mints: Vec<PublicCoin>,
    pub spent_serials: Vec<[u8; 32]>,
    /// Checkpoints first registered by this block.
    pub checkpoints: Vec<(Denomination, [u8; 32])>,
}

impl BlockUndo {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }
}

/// Chain-wide zerocoin state: the anonymity sets, the mint index and the
/// spent serials.
#[derive(Debug, Default)]
pub struct AnonymitySetBudget {
    accumulators: AccumulatorMap,
    pubcoins: HashSet<[u8; 32]>,
    spent: HashMap<[u8; 32], SpentSerial>,
}

impl AnonymitySetBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulators(&self) -> &AccumulatorMap {
        &self.accumulators
    }

    pub fn accumulators_mut(&mut self) -> &mut AccumulatorMap {
        &mut self.accumulators
    }

    pub fn has_mint(&self, coin: &PublicCoin) -> bool {
        self.pubcoins.contains(&pubcoin_hash(coin))
    }

    /// Adds a mint to its denomination set.
    pub fn add_mint(
        &mut self,
        coin: PublicCoin,
        blacklist: &Blacklist,
    ) -> Result<(), ConsensusError> {
        let hash = pubcoin_hash(&coin);
        if blacklist.contains_pubcoin_hash(&hash) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrBlacklisted,
                "pubcoin is blacklisted",
            ));
        }
        if !self.pubcoins.insert(hash) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrMintDuplicate,
                "pubcoin already minted",
            ));
        }
        self.accumulators.add(coin);
        Ok(())
    }

    /// Removes the newest mint of `denom` when it is `coin`, for block
    /// disconnection.
    pub fn undo_mint(&mut self, coin: &PublicCoin) -> bool {
        let set = self.accumulators.set_mut(coin.denom);
        if set.members().last() != Some(coin) {
            return false;
        }
        set.pop();
        self.pubcoins.remove(&pubcoin_hash(coin));
        true
    }

    /// Ring for spends of `denom` at `checkpoint`, with blacklisted pubcoins
    /// left out.
    pub fn ring_for(
        &self,
        denom: Denomination,
        checkpoint: &[u8; 32],
        blacklist: &Blacklist,
    ) -> Option<Vec<PublicCoin>> {
        let members = self.accumulators.set(denom).members_at(checkpoint)?;
        Some(
            members
                .iter()
                .filter(|c| !blacklist.contains_pubcoin_hash(&pubcoin_hash(c)))
                .copied()
                .collect(),
        )
    }

    /// Checks a spend against the current state without recording it.
    pub fn verify_spend(
        &self,
        spend: &CoinSpend,
        message: &[u8; 32],
        blacklist: &Blacklist,
    ) -> Result<(), ConsensusError> {
        let serial_hash = spend.serial_hash();
        if blacklist.contains_serial_hash(&serial_hash) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrBlacklisted,
                "serial is blacklisted",
            ));
        }
        if self.is_serial_spent(&serial_hash) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrDoubleSpend,
                "serial already spent",
            ));
        }
        let ring = self
            .ring_for(spend.denom, &spend.accumulator_checkpoint, blacklist)
            .ok_or_else(|| {
                ConsensusError::new(
                    ErrorCode::TxErrAccumulatorUnknown,
                    "unknown accumulator checkpoint",
                )
            })?;
        if !spend.verify(&ring, message) {
            debug!(
                denom = %spend.denom,
                ring = ring.len(),
                "coin spend proof rejected"
            );
            return Err(ConsensusError::new(
                ErrorCode::TxErrSpendProofInvalid,
                "coin spend proof invalid",
            ));
        }
        Ok(())
    }

    pub fn record_spend(
        &mut self,
        serial_hash: [u8; 32],
        txid: [u8; 32],
        height: u32,
    ) -> Result<(), ConsensusError> {
        if self.spent.contains_key(&serial_hash) {
            return Err(ConsensusError::new(
                ErrorCode::TxErrDoubleSpend,
                "serial already spent",
            ));
        }
        self.spent.insert(serial_hash, SpentSerial { txid, height });
        Ok(())
    }

    /// Forgets a spend when its block is disconnected.
    pub fn undo_spend(&mut self, serial_hash: &[u8; 32]) -> Option<SpentSerial> {
        self.spent.remove(serial_hash)
    }

    pub fn is_serial_spent(&self, serial_hash: &[u8; 32]) -> bool {
        self.spent.contains_key(serial_hash)
    }

    pub fn spent_serial(&self, serial_hash: &[u8; 32]) -> Option<SpentSerial> {
        self.spent.get(serial_hash).copied()
    }

    pub fn spent_count(&self) -> usize {
        self.spent.len()
    }

    // ----- block connection -----

    /// Records the mints and spent serials of a checked transaction in the
    /// block described by `undo`. A failure leaves the budget as it was
    /// before this transaction.
    pub fn apply_transaction(
        &mut self,
        undo: &mut BlockUndo,
        summary: &TxSummary,
        blacklist: &Blacklist,
    ) -> Result<(), ConsensusError> {
        let (mints_mark, spends_mark) = (undo.mints.len(), undo.spent_serials.len());
        let result = self.apply_summary(undo, summary, blacklist);
        if result.is_err() {
            for serial in undo.spent_serials.drain(spends_mark..).rev() {
                self.undo_spend(&serial);
            }
            for coin in undo.mints.drain(mints_mark..).rev() {
                self.undo_mint(&coin);
            }
        }
        result
    }

    fn apply_summary(
        &mut self,
        undo: &mut BlockUndo,
        summary: &TxSummary,
        blacklist: &Blacklist,
    ) -> Result<(), ConsensusError> {
        for coin in &summary.mints {
            self.add_mint(*coin, blacklist)?;
            undo.mints.push(*coin);
        }
        for serial in &summary.spent_serials {
            self.record_spend(*serial, summary.txid, undo.height)?;
            undo.spent_serials.push(*serial);
        }
        Ok(())
    }

    /// Closes the block: on every `CHECKPOINT_INTERVAL`th height all four
    /// sets are checkpointed.
    pub fn finish_block(&mut self, undo: &mut BlockUndo) {
        if undo.height % CHECKPOINT_INTERVAL == 0 {
            undo.checkpoints = self.accumulators.checkpoint_all();
            debug!(
                height = undo.height,
                added = undo.checkpoints.len(),
                "accumulator checkpoint"
            );
        }
    }

    /// Reverts everything `undo` recorded, newest first.
    pub fn disconnect_block(&mut self, undo: &BlockUndo) {
        for (denom, value) in &undo.checkpoints {
            self.accumulators.set_mut(*denom).forget_checkpoint(value);
        }
        for serial in undo.spent_serials.iter().rev() {
            self.undo_spend(serial);
        }
        for coin in undo.mints.iter().rev() {
            if !self.undo_mint(coin) {
                warn!(height = undo.height, denom = %coin.denom, "mint to undo is not the newest");
            }
        }
    }

    /// Builds a spend of `coin` from its precomputed witness. The witness
    /// accumulator must be a registered checkpoint; the set prefix it names
    /// is the ring.
    pub fn spend_from_witness<R: RngCore>(
        &self,
        coin: &PrivateCoin,
        witness: &CoinWitnessData,
        message: &[u8; 32],
        spend_type: SpendType,
        blacklist: &Blacklist,
        rng: &mut R,
    ) -> Result<CoinSpend, ConsensusError> {
        if witness.denom != coin.denom || witness.coin != coin.public_coin().to_bytes() {
            return Err(ConsensusError::new(
                ErrorCode::TxErrSpendProofInvalid,
                "witness belongs to another coin",
            ));
        }
        let ring = self
            .ring_for(witness.denom, &witness.accumulator, blacklist)
            .ok_or_else(|| {
                ConsensusError::new(
                    ErrorCode::TxErrAccumulatorUnknown,
                    "witness is not at a checkpoint",
                )
            })?;
        CoinSpend::create(coin, &ring, witness.accumulator, message, spend_type, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zerocoin::coin::{seed_to_coin, zerocoin_seed, PrivateCoin};
    use crate::zerocoin::spend::SpendType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn coin(i: u32) -> PrivateCoin {
        seed_to_coin(&zerocoin_seed(b"budget", i), Denomination::Ten)
    }

    fn funded(n: u32) -> (AnonymitySetBudget, [u8; 32]) {
        let mut budget = AnonymitySetBudget::new();
        let bl = Blacklist::default();
        for i in 0..n {
            budget.add_mint(coin(i).public_coin(), &bl).unwrap();
        }
        let cp = budget.accumulators_mut().set_mut(Denomination::Ten).checkpoint();
        (budget, cp)
    }

    #[test]
    fn duplicate_mint_rejected() {
        let (mut budget, _) = funded(2);
        let err = budget
            .add_mint(coin(1).public_coin(), &Blacklist::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrMintDuplicate);
    }

    #[test]
    fn spend_lifecycle() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let (mut budget, cp) = funded(4);
        let bl = Blacklist::default();
        let ring = budget.ring_for(Denomination::Ten, &cp, &bl).unwrap();
        let msg = [7u8; 32];
        let spend =
            CoinSpend::create(&coin(2), &ring, cp, &msg, SpendType::Spend, &mut rng).unwrap();

        budget.verify_spend(&spend, &msg, &bl).unwrap();
        budget.record_spend(spend.serial_hash(), [1u8; 32], 10).unwrap();
        assert!(budget.is_serial_spent(&spend.serial_hash()));
        assert_eq!(
            budget.verify_spend(&spend, &msg, &bl).unwrap_err().code,
            ErrorCode::TxErrDoubleSpend
        );
        assert_eq!(
            budget
                .record_spend(spend.serial_hash(), [2u8; 32], 11)
                .unwrap_err()
                .code,
            ErrorCode::TxErrDoubleSpend
        );

        let undone = budget.undo_spend(&spend.serial_hash()).unwrap();
        assert_eq!(undone.height, 10);
        budget.verify_spend(&spend, &msg, &bl).unwrap();
    }

    #[test]
    fn unknown_checkpoint_and_bad_proof() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let (budget, cp) = funded(3);
        let bl = Blacklist::default();
        let ring = budget.ring_for(Denomination::Ten, &cp, &bl).unwrap();
        let spend =
            CoinSpend::create(&coin(0), &ring, cp, &[0u8; 32], SpendType::Spend, &mut rng)
                .unwrap();

        let mut moved = spend.clone();
        moved.accumulator_checkpoint = [9u8; 32];
        assert_eq!(
            budget.verify_spend(&moved, &[0u8; 32], &bl).unwrap_err().code,
            ErrorCode::TxErrAccumulatorUnknown
        );
        assert_eq!(
            budget.verify_spend(&spend, &[1u8; 32], &bl).unwrap_err().code,
            ErrorCode::TxErrSpendProofInvalid
        );
    }

    #[test]
    fn blacklisted_serial_and_pubcoin() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let (mut budget, cp) = funded(3);
        let mut bl = Blacklist::default();
        let ring = budget.ring_for(Denomination::Ten, &cp, &bl).unwrap();
        let spend =
            CoinSpend::create(&coin(1), &ring, cp, &[0u8; 32], SpendType::Spend, &mut rng)
                .unwrap();

        bl.add_serial_hash(spend.serial_hash());
        assert_eq!(
            budget.verify_spend(&spend, &[0u8; 32], &bl).unwrap_err().code,
            ErrorCode::TxErrBlacklisted
        );

        let mut bl = Blacklist::default();
        let banned = coin(10).public_coin();
        bl.add_pubcoin_hash(pubcoin_hash(&banned));
        assert_eq!(
            budget.add_mint(banned, &bl).unwrap_err().code,
            ErrorCode::TxErrBlacklisted
        );

        // A blacklisted member drops out of the ring, so an existing spend
        // over the full ring no longer verifies.
        bl.add_pubcoin_hash(pubcoin_hash(&coin(0).public_coin()));
        assert_eq!(budget.ring_for(Denomination::Ten, &cp, &bl).unwrap().len(), 2);
        assert_eq!(
            budget.verify_spend(&spend, &[0u8; 32], &bl).unwrap_err().code,
            ErrorCode::TxErrSpendProofInvalid
        );
    }

    fn mint_summary(txid: u8, coins: &[PrivateCoin]) -> TxSummary {
        TxSummary {
            txid: [txid; 32],
            fee: 0,
            spent_serials: Vec::new(),
            mints: coins.iter().map(PrivateCoin::public_coin).collect(),
        }
    }

    #[test]
    fn blocks_checkpoint_on_the_interval() {
        let bl = Blacklist::default();
        let mut budget = AnonymitySetBudget::new();

        let mut undo = BlockUndo::new(7);
        budget
            .apply_transaction(&mut undo, &mint_summary(1, &[coin(0), coin(1)]), &bl)
            .unwrap();
        budget.finish_block(&mut undo);
        assert!(undo.checkpoints.is_empty());
        assert_eq!(undo.mints.len(), 2);

        let mut undo10 = BlockUndo::new(10);
        budget.finish_block(&mut undo10);
        assert_eq!(undo10.checkpoints.len(), 4);
        let set = budget.accumulators().set(Denomination::Ten);
        assert_eq!(set.latest_checkpoint(), Some((set.value(), 2)));

        budget.disconnect_block(&undo10);
        assert_eq!(budget.accumulators().set(Denomination::Ten).latest_checkpoint(), None);
        budget.disconnect_block(&undo);
        assert!(!budget.has_mint(&coin(0).public_coin()));
        assert!(budget.accumulators().set(Denomination::Ten).is_empty());
    }

    #[test]
    fn failed_transaction_leaves_block_untouched() {
        let bl = Blacklist::default();
        let (mut budget, _) = funded(1);
        let mut undo = BlockUndo::new(3);
        budget
            .apply_transaction(&mut undo, &mint_summary(1, &[coin(5)]), &bl)
            .unwrap();

        // The second mint collides with coin(0) from the funded set.
        let err = budget
            .apply_transaction(&mut undo, &mint_summary(2, &[coin(6), coin(0)]), &bl)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrMintDuplicate);
        assert_eq!(undo.mints, vec![coin(5).public_coin()]);
        assert!(!budget.has_mint(&coin(6).public_coin()));
        assert_eq!(budget.accumulators().set(Denomination::Ten).len(), 2);

        let spend = TxSummary {
            txid: [3; 32],
            fee: 0,
            spent_serials: vec![[8u8; 32], [8u8; 32]],
            mints: Vec::new(),
        };
        assert_eq!(
            budget.apply_transaction(&mut undo, &spend, &bl).unwrap_err().code,
            ErrorCode::TxErrDoubleSpend
        );
        assert!(!budget.is_serial_spent(&[8u8; 32]));
        assert!(undo.spent_serials.is_empty());
    }

    #[test]
    fn spend_built_from_witness() {
        let mut rng = ChaCha20Rng::seed_from_u64(34);
        let (budget, cp) = funded(5);
        let bl = Blacklist::default();
        let set = budget.accumulators().set(Denomination::Ten);

        let mut w = CoinWitnessData::new(&coin(3).public_coin(), [4u8; 32], 1);
        w.advance(set, 100, 9);
        assert_eq!(w.accumulator, cp);
        let msg = [6u8; 32];
        let spend = budget
            .spend_from_witness(&coin(3), &w, &msg, SpendType::Spend, &bl, &mut rng)
            .unwrap();
        assert_eq!(spend.accumulator_checkpoint, cp);
        assert_eq!(spend.ring_size(), 5);
        budget.verify_spend(&spend, &msg, &bl).unwrap();

        let err = budget
            .spend_from_witness(&coin(2), &w, &msg, SpendType::Spend, &bl, &mut rng)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrSpendProofInvalid);

        let mut partial = CoinWitnessData::new(&coin(3).public_coin(), [4u8; 32], 1);
        partial.advance(set, 4, 9);
        let err = budget
            .spend_from_witness(&coin(3), &partial, &msg, SpendType::Spend, &bl, &mut rng)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TxErrAccumulatorUnknown);
    }

    #[test]
    fn undo_mint_only_pops_newest() {
        let (mut budget, _) = funded(3);
        assert!(!budget.undo_mint(&coin(0).public_coin()));
        assert!(budget.undo_mint(&coin(2).public_coin()));
        assert!(!budget.has_mint(&coin(2).public_coin()));
        assert_eq!(budget.accumulators().set(Denomination::Ten).len(), 2);
    }
}
