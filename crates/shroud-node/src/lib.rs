//! `shroud-node`: runtime services around the consensus core.
//!
//! Dandelion stem relay, the witness cache with its precompute and flush
//! workers, block and transaction acceptance, the mining dataset worker
//! and node configuration.

pub mod acceptance;
pub mod config;
pub mod dandelion;
pub mod error;
pub mod mining;
pub mod precompute;
pub mod time;
pub mod witness_cache;

pub use acceptance::{BlockAcceptor, SharedBudget, TxAcceptor};
pub use config::{load_config, NodeConfig, CONFIG_FILE_NAME};
pub use dandelion::{DandelionRelay, NodeId, ProcessSummary, RelayPolicy, LOCAL_NODE};
pub use error::{NodeError, NodeResult};
pub use mining::{solve_header, DatasetState, DatasetWorker};
pub use precompute::{clamp_blocks_per_cycle, FlushWorker, Precomputer};
pub use time::{AdjustedClock, ManualClock, SystemClock};
pub use witness_cache::{PrecomputeStore, WitnessCache};
