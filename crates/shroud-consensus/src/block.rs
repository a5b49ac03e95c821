use crate::encode::block_header_hash_input;
use crate::error::{ConsensusError, ErrorCode};
use crate::hash::sha256d;
use crate::wire_read::Reader;

pub const DATASET_POW_BLOCK: i32 = 1 << 28;
pub const KEYED_POW_BLOCK: i32 = 1 << 27;
pub const SHA256D_BLOCK: i32 = 1 << 26;
pub const POW_ALGORITHM_MASK: i32 = DATASET_POW_BLOCK | KEYED_POW_BLOCK | SHA256D_BLOCK;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowAlgorithm {
    KeyedMemoryHard,
    EpochDataset,
    Sha256d,
}

impl PowAlgorithm {
    pub fn version_bit(self) -> i32 {
        match self {
            PowAlgorithm::KeyedMemoryHard => KEYED_POW_BLOCK,
            PowAlgorithm::EpochDataset => DATASET_POW_BLOCK,
            PowAlgorithm::Sha256d => SHA256D_BLOCK,
        }
    }
}

/// Independent difficulty lane a block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockLane {
    Work(PowAlgorithm),
    Stake,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub witness_merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    pub nonce64: u64,
    pub height: u32,
    pub mix_hash: [u8; 32],
    pub proof_of_stake: bool,
}

impl BlockHeader {
    /// Algorithm selected by the version bits, if exactly one is set.
    pub fn pow_algorithm(&self) -> Option<PowAlgorithm> {
        match self.version & POW_ALGORITHM_MASK {
            DATASET_POW_BLOCK => Some(PowAlgorithm::EpochDataset),
            KEYED_POW_BLOCK => Some(PowAlgorithm::KeyedMemoryHard),
            SHA256D_BLOCK => Some(PowAlgorithm::Sha256d),
            _ => None,
        }
    }

    pub fn lane(&self) -> Result<BlockLane, ConsensusError> {
        if self.proof_of_stake {
            if self.version & POW_ALGORITHM_MASK != 0 {
                return Err(ConsensusError::new(
                    ErrorCode::BlockErrAlgorithmInvalid,
                    "stake block carries a work algorithm tag",
                ));
            }
            return Ok(BlockLane::Stake);
        }
        self.pow_algorithm()
            .map(BlockLane::Work)
            .ok_or_else(|| {
                ConsensusError::new(
                    ErrorCode::BlockErrAlgorithmInvalid,
                    "work block must tag exactly one algorithm",
                )
            })
    }

    pub fn set_algorithm(&mut self, algo: PowAlgorithm) {
        self.version = (self.version & !POW_ALGORITHM_MASK) | algo.version_bit();
        self.proof_of_stake = false;
    }

    pub fn hash(&self) -> [u8; 32] {
        sha256d(&block_header_hash_input(self))
    }
}

pub fn block_hash(h: &BlockHeader) -> [u8; 32] {
    h.hash()
}

/// Parses the wire/disk form produced by [`crate::encode::block_header_wire_bytes`].
pub fn parse_block_header_bytes(b: &[u8]) -> Result<BlockHeader, ConsensusError> {
    let mut r = Reader::with_code(b, ErrorCode::BlockErrParse);
    let mut h = BlockHeader {
        version: r.read_i32_le()?,
        prev_block_hash: r.read_array32()?,
        merkle_root: r.read_array32()?,
        witness_merkle_root: r.read_array32()?,
        time: r.read_u32_le()?,
        bits: r.read_u32_le()?,
        ..BlockHeader::default()
    };

    if h.version & DATASET_POW_BLOCK != 0 {
        h.height = r.read_u32_le()?;
        h.nonce64 = r.read_u64_le()?;
        h.mix_hash = r.read_array32()?;
    } else if h.version & KEYED_POW_BLOCK != 0 {
        h.height = r.read_u32_le()?;
        h.nonce = r.read_u32_le()?;
    } else {
        h.nonce = r.read_u32_le()?;
    }

    h.proof_of_stake = match r.read_u8()? {
        0 => false,
        1 => true,
        _ => {
            return Err(ConsensusError::new(
                ErrorCode::BlockErrParse,
                "invalid proof-of-stake flag",
            ))
        }
    };
    r.finish()?;
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::block_header_wire_bytes;

    fn header(version: i32) -> BlockHeader {
        BlockHeader {
            version,
            prev_block_hash: [0x11; 32],
            merkle_root: [0x22; 32],
            witness_merkle_root: [0x33; 32],
            time: 1_600_000_000,
            bits: 0x207f_ffff,
            nonce: 7,
            nonce64: 0xdead_beef,
            height: 42,
            mix_hash: [0x44; 32],
            proof_of_stake: false,
        }
    }

    #[test]
    fn algorithm_from_version_bits() {
        assert_eq!(
            header(4 | KEYED_POW_BLOCK).pow_algorithm(),
            Some(PowAlgorithm::KeyedMemoryHard)
        );
        assert_eq!(
            header(4 | DATASET_POW_BLOCK).pow_algorithm(),
            Some(PowAlgorithm::EpochDataset)
        );
        assert_eq!(header(4 | SHA256D_BLOCK).pow_algorithm(), Some(PowAlgorithm::Sha256d));
        assert_eq!(header(4).pow_algorithm(), None);
        assert_eq!(header(KEYED_POW_BLOCK | SHA256D_BLOCK).pow_algorithm(), None);
    }

    #[test]
    fn lane_rejects_untagged_work_block() {
        let err = header(4).lane().unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockErrAlgorithmInvalid);

        let mut pos = header(4);
        pos.proof_of_stake = true;
        assert_eq!(pos.lane().unwrap(), BlockLane::Stake);
    }

    #[test]
    fn stake_flag_is_not_hashed() {
        let a = header(4 | SHA256D_BLOCK);
        let mut b = a.clone();
        b.proof_of_stake = true;
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn unused_algorithm_fields_do_not_affect_hash() {
        let a = header(4 | SHA256D_BLOCK);
        let mut b = a.clone();
        b.nonce64 = 99;
        b.mix_hash = [0xaa; 32];
        b.height = 1;
        assert_eq!(a.hash(), b.hash());

        let mut c = a.clone();
        c.nonce = 8;
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn parse_wire_bytes_per_algorithm() {
        for version in [4 | DATASET_POW_BLOCK, 4 | KEYED_POW_BLOCK, 4 | SHA256D_BLOCK] {
            let h = header(version);
            let parsed = parse_block_header_bytes(&block_header_wire_bytes(&h)).unwrap();
            assert_eq!(parsed.hash(), h.hash());
            assert_eq!(parsed.version, version);
        }
    }

    #[test]
    fn parse_rejects_truncated_and_bad_flag() {
        let h = header(4 | KEYED_POW_BLOCK);
        let mut b = block_header_wire_bytes(&h);
        assert_eq!(
            parse_block_header_bytes(&b[..b.len() - 1]).unwrap_err().code,
            ErrorCode::BlockErrParse
        );
        let last = b.len() - 1;
        b[last] = 2;
        assert_eq!(
            parse_block_header_bytes(&b).unwrap_err().code,
            ErrorCode::BlockErrParse
        );
    }
}
