pub const COIN: u64 = 100_000_000;
pub const MAX_MONEY: u64 = 300_000_000 * COIN;

pub const MAX_TX_INPUTS: usize = 1024;
pub const MAX_TX_OUTPUTS: usize = 1024;
pub const MAX_DATA_OUTPUT_BYTES: usize = 512;

pub const MAX_FUTURE_BLOCK_TIME: i64 = 2 * 60 * 60;
pub const MEDIAN_TIME_SPAN: usize = 11;

pub const OUTPUT_STANDARD: u8 = 1;
pub const OUTPUT_CT: u8 = 2;
pub const OUTPUT_RINGCT: u8 = 3;
pub const OUTPUT_DATA: u8 = 4;

pub const DO_FEE: u8 = 6;
