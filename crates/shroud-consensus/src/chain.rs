use crate::block::{BlockHeader, BlockLane};
use crate::error::ConsensusError;

/// Compact per-block facts the proof and difficulty code needs from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub height: u64,
    pub hash: [u8; 32],
    pub prev_hash: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub lane: BlockLane,
}

impl BlockIndexEntry {
    pub fn from_header(header: &BlockHeader, height: u64) -> Result<Self, ConsensusError> {
        Ok(Self {
            height,
            hash: header.hash(),
            prev_hash: header.prev_block_hash,
            time: header.time,
            bits: header.bits,
            lane: header.lane()?,
        })
    }
}

/// Ancestor lookup on the active chain.
pub trait AncestorSource {
    fn ancestor(&self, height: u64) -> Option<BlockIndexEntry>;

    /// Timestamps of up to `count` blocks ending at `height`, oldest first.
    fn recent_times(&self, height: u64, count: usize) -> Vec<u32> {
        let mut out = Vec::with_capacity(count);
        let mut h = height;
        while out.len() < count {
            match self.ancestor(h) {
                Some(e) => out.push(e.time),
                None => break,
            }
            if h == 0 {
                break;
            }
            h -= 1;
        }
        out.reverse();
        out
    }
}

/// Active chain held in memory, indexed by height.
#[derive(Clone, Debug, Default)]
pub struct MemoryChain {
    entries: Vec<BlockIndexEntry>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BlockIndexEntry) {
        self.entries.push(entry);
    }

    pub fn tip(&self) -> Option<&BlockIndexEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the tip and returns it.
    pub fn pop(&mut self) -> Option<BlockIndexEntry> {
        self.entries.pop()
    }

    pub fn find(&self, hash: &[u8; 32]) -> Option<&BlockIndexEntry> {
        self.entries.iter().rev().find(|e| &e.hash == hash)
    }
}

impl AncestorSource for MemoryChain {
    fn ancestor(&self, height: u64) -> Option<BlockIndexEntry> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.entries.get(h))
            .cloned()
    }
}
