//! `shroud-store`: redb-backed persistence for the zerocoin layer.
//!
//! Holds cached coin witnesses (precomputes), deterministic mints with a
//! pubcoin index, and spent serials, each with a fixed little-endian layout.

pub mod db;
pub mod keys;

pub use db::{Store, WriteBatch};
