use crate::error::{ConsensusError, ErrorCode};

pub struct Reader<'a> {
    b: &'a [u8],
    off: usize,
    code: ErrorCode,
}

impl<'a> Reader<'a> {
    pub fn new(b: &'a [u8]) -> Self {
        Self::with_code(b, ErrorCode::TxErrParse)
    }

    /// Reader whose EOF errors carry `code` instead of the tx parse code.
    pub fn with_code(b: &'a [u8], code: ErrorCode) -> Self {
        Self { b, off: 0, code }
    }

    pub fn remaining(&self) -> usize {
        self.b.len() - self.off
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ConsensusError> {
        if n > self.remaining() {
            return Err(ConsensusError::new(self.code, what));
        }
        let v = &self.b[self.off..self.off + n];
        self.off += n;
        Ok(v)
    }

    pub fn read_u8(&mut self) -> Result<u8, ConsensusError> {
        Ok(self.take(1, "unexpected EOF (u8)")?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ConsensusError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2, "unexpected EOF (u16le)")?);
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ConsensusError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, "unexpected EOF (u32le)")?);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, ConsensusError> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ConsensusError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, "unexpected EOF (u64le)")?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32], ConsensusError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32, "unexpected EOF (bytes32)")?);
        Ok(out)
    }

    pub fn finish(&self) -> Result<(), ConsensusError> {
        if self.remaining() != 0 {
            return Err(ConsensusError::new(self.code, "trailing bytes"));
        }
        Ok(())
    }
}
