//! redb-backed persistence for the zerocoin state.
//!
//! Tables:
//! - `precompute_by_pubcoin_hash`: cached coin witnesses
//! - `mint_by_serial_hash`: deterministic mints
//! - `mint_serial_by_pubcoin_hash`: secondary index into the mint table
//! - `spent_serial_by_hash`: chain-wide spent serials

use std::path::Path;

use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction,
};
use shroud_consensus::zerocoin::{CoinWitnessData, DeterministicMint, SpentSerial};

use crate::keys::{
    decode_mint, decode_precompute, decode_spent_serial, encode_mint, encode_precompute,
    encode_spent_serial,
};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const PRECOMPUTE_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("precompute_by_pubcoin_hash");
const MINT_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("mint_by_serial_hash");
const MINT_PUBCOIN_INDEX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("mint_serial_by_pubcoin_hash");
const SPENT_SERIAL_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("spent_serial_by_hash");

fn key32(v: &[u8]) -> Result<[u8; 32], String> {
    v.try_into()
        .map_err(|_| format!("expected 32-byte key, got {}", v.len()))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, String> {
        let db = Database::create(path).map_err(|e| format!("redb open: {e}"))?;
        let tx = db
            .begin_write()
            .map_err(|e| format!("redb begin_write: {e}"))?;
        tx.open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("create precompute table: {e}"))?;
        tx.open_table(MINT_TABLE)
            .map_err(|e| format!("create mint table: {e}"))?;
        tx.open_table(MINT_PUBCOIN_INDEX)
            .map_err(|e| format!("create mint index: {e}"))?;
        tx.open_table(SPENT_SERIAL_TABLE)
            .map_err(|e| format!("create spent serial table: {e}"))?;
        tx.commit().map_err(|e| format!("redb commit: {e}"))?;
        Ok(Self { db })
    }

    pub fn begin_write(&self) -> Result<WriteBatch, String> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| format!("begin_write: {e}"))?;
        Ok(WriteBatch { tx })
    }

    fn get_raw(
        &self,
        table: TableDefinition<'static, &'static [u8], &'static [u8]>,
        what: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, String> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| format!("begin_read: {e}"))?;
        let t = tx
            .open_table(table)
            .map_err(|e| format!("open {what}: {e}"))?;
        let v = t.get(key).map_err(|e| format!("get {what}: {e}"))?;
        Ok(v.map(|guard| guard.value().to_vec()))
    }

    /// Runs `f` inside a single committed write transaction.
    fn write_with<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&WriteBatch) -> Result<(), String>,
    {
        let batch = self.begin_write()?;
        f(&batch)?;
        batch.commit()
    }

    // ── Precomputes ─────────────────────────────────────────────────────

    pub fn write_precompute(&self, key: &[u8; 32], w: &CoinWitnessData) -> Result<(), String> {
        self.write_with(|b| b.put_precompute(key, w))
    }

    pub fn read_precompute(&self, key: &[u8; 32]) -> Result<Option<CoinWitnessData>, String> {
        match self.get_raw(PRECOMPUTE_TABLE, "precompute", key)? {
            Some(v) => Ok(Some(decode_precompute(&v)?)),
            None => Ok(None),
        }
    }

    pub fn erase_precompute(&self, key: &[u8; 32]) -> Result<(), String> {
        self.write_with(|b| b.delete_precompute(key))
    }

    /// Drops every cached witness, e.g. after a reindex.
    pub fn erase_all_precomputes(&self) -> Result<(), String> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| format!("begin_write: {e}"))?;
        tx.delete_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("drop precompute table: {e}"))?;
        tx.open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("create precompute table: {e}"))?;
        tx.commit().map_err(|e| format!("commit: {e}"))
    }

    /// Calls `f(key, witness)` for every stored witness in key order until
    /// `f` returns `false`.
    pub fn load_precomputes<F>(&self, mut f: F) -> Result<(), String>
    where
        F: FnMut([u8; 32], CoinWitnessData) -> bool,
    {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| format!("begin_read: {e}"))?;
        let table = tx
            .open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("open precompute: {e}"))?;
        let iter = table.iter().map_err(|e| format!("precompute iter: {e}"))?;
        for result in iter {
            let (k, v) = result.map_err(|e| format!("precompute next: {e}"))?;
            if !f(key32(k.value())?, decode_precompute(v.value())?) {
                break;
            }
        }
        Ok(())
    }

    pub fn precompute_count(&self) -> Result<u64, String> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| format!("begin_read: {e}"))?;
        let table = tx
            .open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("open precompute: {e}"))?;
        table.len().map_err(|e| format!("precompute len: {e}"))
    }

    // ── Mints ───────────────────────────────────────────────────────────

    pub fn write_mint(&self, mint: &DeterministicMint) -> Result<(), String> {
        self.write_with(|b| b.put_mint(mint))
    }

    pub fn read_mint(&self, serial_hash: &[u8; 32]) -> Result<Option<DeterministicMint>, String> {
        match self.get_raw(MINT_TABLE, "mint", serial_hash)? {
            Some(v) => Ok(Some(decode_mint(&v)?)),
            None => Ok(None),
        }
    }

    pub fn read_mint_by_pubcoin(
        &self,
        pubcoin_hash: &[u8; 32],
    ) -> Result<Option<DeterministicMint>, String> {
        match self.get_raw(MINT_PUBCOIN_INDEX, "mint index", pubcoin_hash)? {
            Some(serial) => self.read_mint(&key32(&serial)?),
            None => Ok(None),
        }
    }

    pub fn erase_mint(&self, serial_hash: &[u8; 32]) -> Result<(), String> {
        self.write_with(|b| b.delete_mint(serial_hash))
    }

    // ── Spent serials ───────────────────────────────────────────────────

    pub fn write_spent_serial(
        &self,
        serial_hash: &[u8; 32],
        s: &SpentSerial,
    ) -> Result<(), String> {
        self.write_with(|b| b.put_spent_serial(serial_hash, s))
    }

    pub fn read_spent_serial(&self, serial_hash: &[u8; 32]) -> Result<Option<SpentSerial>, String> {
        match self.get_raw(SPENT_SERIAL_TABLE, "spent serial", serial_hash)? {
            Some(v) => Ok(Some(decode_spent_serial(&v)?)),
            None => Ok(None),
        }
    }

    pub fn erase_spent_serial(&self, serial_hash: &[u8; 32]) -> Result<(), String> {
        self.write_with(|b| b.delete_spent_serial(serial_hash))
    }
}

// ---------------------------------------------------------------------------
// WriteBatch wraps a redb WriteTransaction for atomic multi-table writes
// ---------------------------------------------------------------------------

pub struct WriteBatch {
    tx: WriteTransaction,
}

impl WriteBatch {
    pub fn put_precompute(&self, key: &[u8; 32], w: &CoinWitnessData) -> Result<(), String> {
        let mut table = self
            .tx
            .open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("open precompute: {e}"))?;
        let value = encode_precompute(w);
        table
            .insert(key.as_slice(), value.as_slice())
            .map_err(|e| format!("put precompute: {e}"))?;
        Ok(())
    }

    pub fn delete_precompute(&self, key: &[u8; 32]) -> Result<(), String> {
        let mut table = self
            .tx
            .open_table(PRECOMPUTE_TABLE)
            .map_err(|e| format!("open precompute: {e}"))?;
        table
            .remove(key.as_slice())
            .map_err(|e| format!("delete precompute: {e}"))?;
        Ok(())
    }

    /// Writes the mint and points its pubcoin hash at it.
    pub fn put_mint(&self, mint: &DeterministicMint) -> Result<(), String> {
        let value = encode_mint(mint);
        {
            let mut table = self
                .tx
                .open_table(MINT_TABLE)
                .map_err(|e| format!("open mint: {e}"))?;
            table
                .insert(mint.serial_hash.as_slice(), value.as_slice())
                .map_err(|e| format!("put mint: {e}"))?;
        }
        let mut index = self
            .tx
            .open_table(MINT_PUBCOIN_INDEX)
            .map_err(|e| format!("open mint index: {e}"))?;
        index
            .insert(mint.pubcoin_hash.as_slice(), mint.serial_hash.as_slice())
            .map_err(|e| format!("put mint index: {e}"))?;
        Ok(())
    }

    /// Removes the mint and its index entry. Missing mints are not an error.
    pub fn delete_mint(&self, serial_hash: &[u8; 32]) -> Result<(), String> {
        let removed = {
            let mut table = self
                .tx
                .open_table(MINT_TABLE)
                .map_err(|e| format!("open mint: {e}"))?;
            let old = table
                .remove(serial_hash.as_slice())
                .map_err(|e| format!("delete mint: {e}"))?;
            match old {
                Some(guard) => Some(decode_mint(guard.value())?),
                None => None,
            }
        };
        if let Some(mint) = removed {
            let mut index = self
                .tx
                .open_table(MINT_PUBCOIN_INDEX)
                .map_err(|e| format!("open mint index: {e}"))?;
            index
                .remove(mint.pubcoin_hash.as_slice())
                .map_err(|e| format!("delete mint index: {e}"))?;
        }
        Ok(())
    }

    pub fn put_spent_serial(&self, serial_hash: &[u8; 32], s: &SpentSerial) -> Result<(), String> {
        let mut table = self
            .tx
            .open_table(SPENT_SERIAL_TABLE)
            .map_err(|e| format!("open spent serial: {e}"))?;
        let value = encode_spent_serial(s);
        table
            .insert(serial_hash.as_slice(), value.as_slice())
            .map_err(|e| format!("put spent serial: {e}"))?;
        Ok(())
    }

    pub fn delete_spent_serial(&self, serial_hash: &[u8; 32]) -> Result<(), String> {
        let mut table = self
            .tx
            .open_table(SPENT_SERIAL_TABLE)
            .map_err(|e| format!("open spent serial: {e}"))?;
        table
            .remove(serial_hash.as_slice())
            .map_err(|e| format!("delete spent serial: {e}"))?;
        Ok(())
    }

    /// Commit the write batch atomically.
    pub fn commit(self) -> Result<(), String> {
        self.tx.commit().map_err(|e| format!("commit: {e}"))
    }
}
