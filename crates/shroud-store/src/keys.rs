//! Canonical byte layouts for the zerocoin tables.
//!
//! All integers are little-endian.

use shroud_consensus::zerocoin::{CoinWitnessData, Denomination, DeterministicMint, SpentSerial};

fn le_u32(data: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(b)
}

fn array32(data: &[u8], at: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&data[at..at + 32]);
    out
}

fn denom_at(data: &[u8], at: usize) -> Result<Denomination, String> {
    let v = le_u32(data, at);
    Denomination::from_int(u64::from(v)).ok_or_else(|| format!("invalid denomination: {v}"))
}

// ---------------------------------------------------------------------------
// Precompute value: denom[4] || height_checkpoint[4] || height_mint_added[4]
//   || height_acc_start[4] || height_precomputed[4] || mints_added[4]
//   || txid[32] || coin[32] || accumulator[32] = 120 bytes
// ---------------------------------------------------------------------------

pub const PRECOMPUTE_LEN: usize = 120;

pub fn encode_precompute(w: &CoinWitnessData) -> [u8; PRECOMPUTE_LEN] {
    let mut buf = [0u8; PRECOMPUTE_LEN];
    buf[0..4].copy_from_slice(&w.denom.to_int().to_le_bytes());
    buf[4..8].copy_from_slice(&w.height_checkpoint.to_le_bytes());
    buf[8..12].copy_from_slice(&w.height_mint_added.to_le_bytes());
    buf[12..16].copy_from_slice(&w.height_acc_start.to_le_bytes());
    buf[16..20].copy_from_slice(&w.height_precomputed.to_le_bytes());
    buf[20..24].copy_from_slice(&w.mints_added.to_le_bytes());
    buf[24..56].copy_from_slice(&w.txid);
    buf[56..88].copy_from_slice(&w.coin);
    buf[88..120].copy_from_slice(&w.accumulator);
    buf
}

pub fn decode_precompute(data: &[u8]) -> Result<CoinWitnessData, String> {
    if data.len() != PRECOMPUTE_LEN {
        return Err(format!(
            "precompute: expected {PRECOMPUTE_LEN} bytes, got {}",
            data.len()
        ));
    }
    Ok(CoinWitnessData {
        denom: denom_at(data, 0)?,
        height_checkpoint: le_u32(data, 4),
        height_mint_added: le_u32(data, 8),
        height_acc_start: le_u32(data, 12),
        height_precomputed: le_u32(data, 16),
        mints_added: le_u32(data, 20),
        txid: array32(data, 24),
        coin: array32(data, 56),
        accumulator: array32(data, 88),
    })
}

// ---------------------------------------------------------------------------
// Mint value: version[1] || count[4] || seed_hash[20] || serial_hash[32]
//   || pubcoin_hash[32] || stake_hash[32] || txid[32] || height[4]
//   || denom[4] || is_used[1] = 162 bytes
// ---------------------------------------------------------------------------

pub const MINT_LEN: usize = 162;

pub fn encode_mint(m: &DeterministicMint) -> [u8; MINT_LEN] {
    let mut buf = [0u8; MINT_LEN];
    buf[0] = m.version;
    buf[1..5].copy_from_slice(&m.count.to_le_bytes());
    buf[5..25].copy_from_slice(&m.seed_hash);
    buf[25..57].copy_from_slice(&m.serial_hash);
    buf[57..89].copy_from_slice(&m.pubcoin_hash);
    buf[89..121].copy_from_slice(&m.stake_hash);
    buf[121..153].copy_from_slice(&m.txid);
    buf[153..157].copy_from_slice(&m.height.to_le_bytes());
    buf[157..161].copy_from_slice(&m.denom.to_int().to_le_bytes());
    buf[161] = u8::from(m.is_used);
    buf
}

pub fn decode_mint(data: &[u8]) -> Result<DeterministicMint, String> {
    if data.len() != MINT_LEN {
        return Err(format!("mint: expected {MINT_LEN} bytes, got {}", data.len()));
    }
    let mut seed_hash = [0u8; 20];
    seed_hash.copy_from_slice(&data[5..25]);
    let is_used = match data[161] {
        0 => false,
        1 => true,
        v => return Err(format!("mint: invalid used flag: {v}")),
    };
    Ok(DeterministicMint {
        version: data[0],
        count: le_u32(data, 1),
        seed_hash,
        serial_hash: array32(data, 25),
        pubcoin_hash: array32(data, 57),
        stake_hash: array32(data, 89),
        txid: array32(data, 121),
        height: le_u32(data, 153),
        denom: denom_at(data, 157)?,
        is_used,
    })
}

// ---------------------------------------------------------------------------
// Spent serial value: txid[32] || height[4] = 36 bytes
// ---------------------------------------------------------------------------

pub fn encode_spent_serial(s: &SpentSerial) -> [u8; 36] {
    let mut buf = [0u8; 36];
    buf[0..32].copy_from_slice(&s.txid);
    buf[32..36].copy_from_slice(&s.height.to_le_bytes());
    buf
}

pub fn decode_spent_serial(data: &[u8]) -> Result<SpentSerial, String> {
    if data.len() != 36 {
        return Err(format!("spent serial: expected 36 bytes, got {}", data.len()));
    }
    Ok(SpentSerial {
        txid: array32(data, 0),
        height: le_u32(data, 32),
    })
}
