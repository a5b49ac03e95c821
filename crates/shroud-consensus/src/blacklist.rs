//! Consensus blacklist of outputs, serials, pubcoins and addresses.
//!
//! The lists ship embedded in the binary as JSON and are parsed once.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::warn;

use crate::tx::OutPoint;

const OUTPOINTS_JSON: &str = include_str!("../data/blacklist_outpoints.json");
const SERIALS_JSON: &str = include_str!("../data/blacklist_serials.json");
const PUBCOINS_JSON: &str = include_str!("../data/blacklist_pubcoins.json");
const ADDRESSES_JSON: &str = include_str!("../data/blacklist_addresses.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutPointKind {
    Basecoin,
    Stealth,
    RingCt,
}

#[derive(Deserialize)]
struct OutPointRecord {
    txid: String,
    n: u32,
    #[serde(rename = "type")]
    kind: OutPointKind,
}

#[derive(Deserialize)]
struct SerialRecord {
    s: String,
}

#[derive(Deserialize)]
struct AddressRecord {
    address: String,
    txid: String,
    n: u32,
}

fn hex32(s: &str) -> Result<[u8; 32], String> {
    let v = hex::decode(s).map_err(|e| format!("hex: {e}"))?;
    if v.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", v.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&v);
    if out == [0u8; 32] {
        return Err("zero hash".into());
    }
    Ok(out)
}

#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    outpoints: HashMap<OutPoint, OutPointKind>,
    serial_hashes: HashSet<[u8; 32]>,
    pubcoin_hashes: HashSet<[u8; 32]>,
    addresses: HashMap<String, OutPoint>,
}

impl Blacklist {
    pub fn from_json(
        outpoints: &str,
        serials: &str,
        pubcoins: &str,
        addresses: &str,
    ) -> Result<Self, String> {
        let mut bl = Blacklist::default();

        let records: Vec<OutPointRecord> =
            serde_json::from_str(outpoints).map_err(|e| format!("outpoints: {e}"))?;
        for r in records {
            let txid = hex32(&r.txid).map_err(|e| format!("outpoints: {e}"))?;
            bl.add_outpoint(OutPoint { txid, n: r.n }, r.kind);
        }

        let records: Vec<SerialRecord> =
            serde_json::from_str(serials).map_err(|e| format!("serials: {e}"))?;
        for r in records {
            bl.serial_hashes
                .insert(hex32(&r.s).map_err(|e| format!("serials: {e}"))?);
        }

        let records: Vec<String> =
            serde_json::from_str(pubcoins).map_err(|e| format!("pubcoins: {e}"))?;
        for r in records {
            bl.pubcoin_hashes
                .insert(hex32(&r).map_err(|e| format!("pubcoins: {e}"))?);
        }

        let records: Vec<AddressRecord> =
            serde_json::from_str(addresses).map_err(|e| format!("addresses: {e}"))?;
        for r in records {
            let txid = hex32(&r.txid).map_err(|e| format!("addresses: {e}"))?;
            bl.add_address(r.address, OutPoint { txid, n: r.n });
        }

        Ok(bl)
    }

    /// The lists compiled into this build. A malformed list is logged and
    /// treated as empty.
    pub fn embedded() -> &'static Blacklist {
        static EMBEDDED: OnceLock<Blacklist> = OnceLock::new();
        EMBEDDED.get_or_init(|| {
            Blacklist::from_json(OUTPOINTS_JSON, SERIALS_JSON, PUBCOINS_JSON, ADDRESSES_JSON)
                .unwrap_or_else(|err| {
                    warn!(%err, "embedded blacklist failed to parse");
                    Blacklist::default()
                })
        })
    }

    pub fn add_outpoint(&mut self, outpoint: OutPoint, kind: OutPointKind) {
        self.outpoints.insert(outpoint, kind);
    }

    pub fn add_serial_hash(&mut self, hash: [u8; 32]) {
        self.serial_hashes.insert(hash);
    }

    pub fn add_pubcoin_hash(&mut self, hash: [u8; 32]) {
        self.pubcoin_hashes.insert(hash);
    }

    pub fn add_address(&mut self, address: String, source: OutPoint) {
        self.addresses.insert(address, source);
    }

    pub fn contains_outpoint(&self, outpoint: &OutPoint) -> Option<OutPointKind> {
        self.outpoints.get(outpoint).copied()
    }

    fn contains_kind(&self, outpoint: &OutPoint, kind: OutPointKind) -> bool {
        self.contains_outpoint(outpoint) == Some(kind)
    }

    pub fn contains_basecoin_outpoint(&self, outpoint: &OutPoint) -> bool {
        self.contains_kind(outpoint, OutPointKind::Basecoin)
    }

    pub fn contains_stealth_outpoint(&self, outpoint: &OutPoint) -> bool {
        self.contains_kind(outpoint, OutPointKind::Stealth)
    }

    pub fn contains_ringct_outpoint(&self, outpoint: &OutPoint) -> bool {
        self.contains_kind(outpoint, OutPointKind::RingCt)
    }

    pub fn contains_serial_hash(&self, hash: &[u8; 32]) -> bool {
        self.serial_hashes.contains(hash)
    }

    pub fn contains_pubcoin_hash(&self, hash: &[u8; 32]) -> bool {
        self.pubcoin_hashes.contains(hash)
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.addresses.contains_key(address)
    }

    /// The outpoint that funded a blacklisted address.
    pub fn link_for_address(&self, address: &str) -> Option<OutPoint> {
        self.addresses.get(address).copied()
    }

    pub fn outpoint_count(&self, kind: OutPointKind) -> usize {
        self.outpoints.values().filter(|k| **k == kind).count()
    }

    pub fn serial_count(&self) -> usize {
        self.serial_hashes.len()
    }

    pub fn pubcoin_count(&self) -> usize {
        self.pubcoin_hashes.len()
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }
}
