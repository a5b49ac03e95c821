//! Node error types.

use shroud_consensus::powhash::PowHashError;
use shroud_consensus::ConsensusError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    /// A block or transaction broke a consensus rule.
    #[error("consensus: {0}")]
    Consensus(#[from] ConsensusError),

    /// The persistent store failed.
    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset or cache construction failed.
    #[error("work hash: {0}")]
    PowHash(#[from] PowHashError),
}

impl NodeError {
    /// Reason string of a consensus rejection, if this is one.
    pub fn consensus_code(&self) -> Option<&'static str> {
        match self {
            NodeError::Consensus(e) => Some(e.code.as_str()),
            _ => None,
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
