pub mod blacklist;
pub mod block;
pub mod budget;
pub mod chain;
pub mod commitment;
pub mod compactsize;
pub mod constants;
pub mod difficulty;
pub mod encode;
pub mod error;
pub mod hash;
pub mod keyblock;
pub mod params;
pub mod pow;
pub mod powhash;
pub mod rangeproof;
pub mod stake;
pub mod tx;
pub mod validation;
mod wire_read;
pub mod zerocoin;

pub use blacklist::{Blacklist, OutPointKind};
pub use block::{block_hash, parse_block_header_bytes, BlockHeader, BlockLane, PowAlgorithm};
pub use budget::{block_rewards, check_superblock_payouts, BudgetParams, Payout, RewardTuple};
pub use chain::{AncestorSource, BlockIndexEntry, MemoryChain};
pub use commitment::{blind_sum, verify_commitment_balance, BlindingFactor, Commitment};
pub use difficulty::{dark_gravity_wave, next_work_required};
pub use error::{ConsensusError, ErrorCode};
pub use keyblock::{key_block_height, KeyBlockContext, KeyBlockInfo};
pub use params::{ConsensusParams, Network};
pub use pow::{check_proof_of_work, decode_compact, encode_compact};
pub use rangeproof::{
    create_range_proof, range_proof_info, select_range_proof_parameters, verify_range_proof,
    RangeProofInfo, RangeProofParams,
};
pub use stake::{check_proof_of_stake, stake_weight, StakeKernel};
pub use tx::{
    check_private_transaction, connect_block_transactions, OutPoint, ResolvedInputs, Transaction,
    TxIn, TxOut, TxSummary,
};
pub use validation::{HeaderContext, HeaderState, HeaderValidator, ProofEngine, ValidatedHeader};
