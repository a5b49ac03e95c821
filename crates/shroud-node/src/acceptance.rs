//! Block and transaction acceptance.
//!
//! [`BlockAcceptor`] extends an in-memory header chain, running each header
//! through the consensus validator at the adjusted time and re-keying the
//! memory-hard hash as the tip moves. Connecting a block also applies its
//! private transactions to the shared anonymity-set budget and checkpoints
//! the accumulators on the interval; disconnecting reverts both.
//! [`TxAcceptor`] checks private transactions against that budget, holds
//! them in a pool until they are mined, and hands them to the Dandelion
//! relay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use shroud_consensus::zerocoin::{pubcoin_hash, AnonymitySetBudget, BlockUndo};
use shroud_consensus::{
    check_private_transaction, connect_block_transactions, Blacklist, BlockHeader, BlockIndexEntry,
    ConsensusError, ErrorCode, HeaderContext, HeaderValidator, MemoryChain, Payout, ProofEngine,
    ResolvedInputs, StakeKernel, Transaction, TxSummary, ValidatedHeader,
};
use tracing::{debug, info, warn};

use crate::dandelion::{DandelionRelay, NodeId};
use crate::error::NodeResult;
use crate::time::AdjustedClock;

/// Anonymity-set budget shared by block and transaction acceptance.
pub type SharedBudget = Arc<Mutex<AnonymitySetBudget>>;

pub struct BlockAcceptor {
    engine: Arc<ProofEngine>,
    chain: RwLock<MemoryChain>,
    clock: Arc<dyn AdjustedClock>,
    budget: SharedBudget,
    blacklist: Arc<Blacklist>,
    /// One entry per chain block, tip last.
    undo: Mutex<Vec<BlockUndo>>,
}

impl BlockAcceptor {
    pub fn new(engine: Arc<ProofEngine>, clock: Arc<dyn AdjustedClock>) -> Self {
        Self {
            engine,
            chain: RwLock::new(MemoryChain::new()),
            clock,
            budget: SharedBudget::default(),
            blacklist: Arc::new(Blacklist::default()),
            undo: Mutex::new(Vec::new()),
        }
    }

    /// Connects blocks into `budget`, filtering with `blacklist`.
    pub fn with_anonymity_set(mut self, budget: SharedBudget, blacklist: Arc<Blacklist>) -> Self {
        self.budget = budget;
        self.blacklist = blacklist;
        self
    }

    pub fn engine(&self) -> &Arc<ProofEngine> {
        &self.engine
    }

    pub fn budget(&self) -> &SharedBudget {
        &self.budget
    }

    pub fn chain(&self) -> RwLockReadGuard<'_, MemoryChain> {
        self.chain.read()
    }

    pub fn tip(&self) -> Option<BlockIndexEntry> {
        self.chain.read().tip().cloned()
    }

    /// Validates `header` as the next block and appends it.
    pub fn accept_header(
        &self,
        header: &BlockHeader,
        stake: Option<(&StakeKernel, u64)>,
        payouts: &[Payout<'_>],
    ) -> NodeResult<ValidatedHeader> {
        self.connect_block(header, stake, payouts, &[])
    }

    /// Validates `header` as the next block, applies its private
    /// transactions and appends it. Nothing changes when either step fails.
    pub fn connect_block(
        &self,
        header: &BlockHeader,
        stake: Option<(&StakeKernel, u64)>,
        payouts: &[Payout<'_>],
        txs: &[(Transaction, ResolvedInputs)],
    ) -> NodeResult<ValidatedHeader> {
        let mut chain = self.chain.write();
        if u64::from(header.height) != chain.len() as u64 {
            return Err(ConsensusError::new(
                ErrorCode::BlockErrLinkageInvalid,
                "header does not extend the tip",
            )
            .into());
        }
        let ctx = HeaderContext {
            now: self.clock.adjusted_time(),
            stake,
            payouts,
        };
        let accepted = match HeaderValidator::new(&self.engine, &*chain, header).validate(&ctx) {
            Ok(v) => v,
            Err(e) => {
                info!(height = header.height, reason = e.code.as_str(), "block header rejected");
                return Err(e.into());
            }
        };
        let undo = {
            let mut budget = self.budget.lock();
            match connect_block_transactions(&mut budget, header.height, txs, &self.blacklist) {
                Ok(undo) => undo,
                Err(e) => {
                    info!(
                        height = header.height,
                        reason = e.code.as_str(),
                        "block transactions rejected"
                    );
                    return Err(e.into());
                }
            }
        };
        let (mints, spends, checkpointed) =
            (undo.mints.len(), undo.spent_serials.len(), !undo.checkpoints.is_empty());
        chain.push(accepted.entry.clone());
        self.undo.lock().push(undo);
        let height = accepted.entry.height;
        if let Err(e) = self.engine.on_tip_changed(height, &*chain) {
            warn!(height, error = %e, "key block rotation failed");
        }
        info!(
            height,
            hash = %hex::encode(accepted.entry.hash),
            lane = ?accepted.entry.lane,
            txs = txs.len(),
            mints,
            spends,
            checkpointed,
            "block connected"
        );
        Ok(accepted)
    }

    /// Drops the tip for a reorg, reverts its private transactions and
    /// re-keys for the new tip.
    pub fn disconnect_tip(&self) -> Option<BlockIndexEntry> {
        let mut chain = self.chain.write();
        let old = chain.pop()?;
        if let Some(undo) = self.undo.lock().pop() {
            self.budget.lock().disconnect_block(&undo);
        }
        if let Some(tip) = chain.tip().map(|t| t.height) {
            if let Err(e) = self.engine.on_tip_changed(tip, &*chain) {
                warn!(height = tip, error = %e, "key block rotation failed");
            }
        }
        debug!(height = old.height, "tip disconnected");
        Some(old)
    }
}

/// Transactions accepted but not yet mined, with the serials and pubcoins
/// they claim.
#[derive(Default)]
struct TxPool {
    txs: HashMap<[u8; 32], TxSummary>,
    serials: HashSet<[u8; 32]>,
    pubcoins: HashSet<[u8; 32]>,
}

impl TxPool {
    fn conflict(&self, summary: &TxSummary) -> Option<ConsensusError> {
        if self.txs.contains_key(&summary.txid)
            || summary.spent_serials.iter().any(|s| self.serials.contains(s))
        {
            return Some(ConsensusError::new(
                ErrorCode::TxErrDoubleSpend,
                "serial spent by a pending transaction",
            ));
        }
        if summary.mints.iter().any(|c| self.pubcoins.contains(&pubcoin_hash(c))) {
            return Some(ConsensusError::new(
                ErrorCode::TxErrMintDuplicate,
                "pubcoin minted by a pending transaction",
            ));
        }
        None
    }

    fn insert(&mut self, summary: TxSummary) {
        self.serials.extend(summary.spent_serials.iter().copied());
        self.pubcoins.extend(summary.mints.iter().map(pubcoin_hash));
        self.txs.insert(summary.txid, summary);
    }

    fn remove(&mut self, txid: &[u8; 32]) -> Option<TxSummary> {
        let summary = self.txs.remove(txid)?;
        for serial in &summary.spent_serials {
            self.serials.remove(serial);
        }
        for coin in &summary.mints {
            self.pubcoins.remove(&pubcoin_hash(coin));
        }
        Some(summary)
    }
}

pub struct TxAcceptor {
    budget: SharedBudget,
    blacklist: Arc<Blacklist>,
    relay: Arc<DandelionRelay>,
    pool: Mutex<TxPool>,
}

impl TxAcceptor {
    pub fn new(
        budget: SharedBudget,
        blacklist: Arc<Blacklist>,
        relay: Arc<DandelionRelay>,
    ) -> Self {
        Self {
            budget,
            blacklist,
            relay,
            pool: Mutex::new(TxPool::default()),
        }
    }

    pub fn relay(&self) -> &Arc<DandelionRelay> {
        &self.relay
    }

    pub fn budget(&self) -> &SharedBudget {
        &self.budget
    }

    /// Checks `tx` against the chain budget and the pending pool, keeps it
    /// until it is mined, and starts its stem relay from `origin`.
    pub fn accept_transaction(
        &self,
        tx: &Transaction,
        resolved: &ResolvedInputs,
        origin: NodeId,
    ) -> NodeResult<TxSummary> {
        let checked = {
            let budget = self.budget.lock();
            check_private_transaction(tx, resolved, &budget, &self.blacklist)
        };
        let summary = checked.map_err(|e| {
            debug!(reason = e.code.as_str(), origin, "transaction rejected");
            e
        })?;

        let mut pool = self.pool.lock();
        if let Some(e) = pool.conflict(&summary) {
            debug!(reason = e.code.as_str(), origin, "transaction conflicts with pool");
            return Err(e.into());
        }
        pool.insert(summary.clone());
        drop(pool);

        self.relay.add_with_default_stem(summary.txid, origin);
        info!(
            txid = %hex::encode(summary.txid),
            fee = summary.fee,
            spends = summary.spent_serials.len(),
            mints = summary.mints.len(),
            "transaction accepted"
        );
        Ok(summary)
    }

    /// Drops transactions that were mined. Returns how many were pending.
    pub fn remove_mined(&self, txids: &[[u8; 32]]) -> usize {
        let mut pool = self.pool.lock();
        txids.iter().filter(|txid| pool.remove(txid).is_some()).count()
    }

    pub fn is_pending(&self, txid: &[u8; 32]) -> bool {
        self.pool.lock().txs.contains_key(txid)
    }

    pub fn pending_len(&self) -> usize {
        self.pool.lock().txs.len()
    }
}
