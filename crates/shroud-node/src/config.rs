//! Node configuration, stored as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use shroud_consensus::{BudgetParams, Network};
use shroud_store::Store;
use tracing::warn;

use crate::dandelion::RelayPolicy;
use crate::error::{NodeError, NodeResult};
use crate::precompute::{clamp_blocks_per_cycle, DEFAULT_BLOCKS_PER_CYCLE};
use crate::witness_cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_DIRTY_THRESHOLD};

pub const CONFIG_FILE_NAME: &str = "shroud.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// `main`, `test` or `regtest`.
    pub network: String,
    pub data_dir: PathBuf,
    pub relay: RelayConfig,
    pub precompute: PrecomputeConfig,
    pub mining: MiningConfig,
    /// Fixed seed for relay and proof randomness. Unset means OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::Main.as_str().to_string(),
            data_dir: PathBuf::from(".shroud"),
            relay: RelayConfig::default(),
            precompute: PrecomputeConfig::default(),
            mining: MiningConfig::default(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub stem_duration_secs: i64,
    pub reroll_interval_secs: i64,
    /// A rerolled stem is queued to send with probability 1/`fluff_one_in`.
    pub fluff_one_in: u32,
    pub process_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let p = RelayPolicy::default();
        Self {
            stem_duration_secs: p.stem_duration,
            reroll_interval_secs: p.reroll_interval,
            fluff_one_in: p.fluff_one_in,
            process_interval_ms: 1_000,
        }
    }
}

impl RelayConfig {
    pub fn policy(&self) -> RelayPolicy {
        RelayPolicy {
            stem_duration: self.stem_duration_secs,
            reroll_interval: self.reroll_interval_secs,
            fluff_one_in: self.fluff_one_in,
        }
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputeConfig {
    pub cache_capacity: usize,
    /// Dirty entries that trigger an early flush.
    pub dirty_threshold: usize,
    pub flush_interval_secs: u64,
    pub blocks_per_cycle: u32,
}

impl Default for PrecomputeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            dirty_threshold: DEFAULT_DIRTY_THRESHOLD,
            flush_interval_secs: 900,
            blocks_per_cycle: DEFAULT_BLOCKS_PER_CYCLE,
        }
    }
}

impl PrecomputeConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub enabled: bool,
    /// Build the full epoch dataset in the background for faster mining.
    pub dataset_worker: bool,
}

impl NodeConfig {
    pub fn network(&self) -> NodeResult<Network> {
        self.network.parse().map_err(NodeError::Config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("zerocoin.redb")
    }

    /// Opens the zerocoin store under `data_dir`, creating the directory.
    pub fn open_store(&self) -> NodeResult<Store> {
        fs::create_dir_all(&self.data_dir)?;
        Store::open(&self.store_path()).map_err(NodeError::Store)
    }

    pub fn rng(&self) -> ChaCha20Rng {
        match self.rng_seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        }
    }

    fn validate(&mut self) -> NodeResult<()> {
        let network = self.network()?;
        if BudgetParams::get(network).has_placeholder_addresses() {
            warn!(network = network.as_str(), "budget payout addresses include placeholders");
        }
        if self.relay.fluff_one_in == 0 {
            return Err(NodeError::Config("relay.fluff_one_in must be >= 1".into()));
        }
        if self.relay.stem_duration_secs <= 0 {
            return Err(NodeError::Config("relay.stem_duration_secs must be > 0".into()));
        }
        if self.precompute.cache_capacity == 0 {
            return Err(NodeError::Config("precompute.cache_capacity must be > 0".into()));
        }
        self.precompute.blocks_per_cycle = clamp_blocks_per_cycle(self.precompute.blocks_per_cycle);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> NodeResult<()> {
        let mut raw = serde_json::to_vec_pretty(self)
            .map_err(|e| NodeError::Config(format!("encode config: {e}")))?;
        raw.push(b'\n');
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, &raw)?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            NodeError::Io(e)
        })
    }
}

/// Reads the config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> NodeResult<NodeConfig> {
    if !path.exists() {
        return Ok(NodeConfig::default());
    }
    let raw = fs::read(path)?;
    let mut cfg: NodeConfig = serde_json::from_slice(&raw)
        .map_err(|e| NodeError::Config(format!("decode {}: {e}", path.display())))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(cfg, NodeConfig::default());
        assert_eq!(cfg.relay.stem_duration_secs, 120);
        assert_eq!(cfg.relay.reroll_interval_secs, 5);
        assert_eq!(cfg.relay.fluff_one_in, 4);
        assert_eq!(cfg.precompute.cache_capacity, 2000);
        assert_eq!(cfg.precompute.dirty_threshold, 1000);
        assert_eq!(cfg.precompute.flush_interval(), Duration::from_secs(900));
        assert_eq!(cfg.network().unwrap(), Network::Main);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"network":"regtest","precompute":{"blocks_per_cycle":1234},"rng_seed":9}"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.network().unwrap(), Network::Regtest);
        assert_eq!(cfg.precompute.blocks_per_cycle, 1230);
        assert_eq!(cfg.precompute.cache_capacity, 2000);
        assert_eq!(cfg.relay, RelayConfig::default());
        assert_eq!(cfg.rng_seed, Some(9));
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"network":"moon"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(NodeError::Config(_))));
        fs::write(&path, r#"{"relay":{"fluff_one_in":0}}"#).unwrap();
        assert!(matches!(load_config(&path), Err(NodeError::Config(_))));
        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_config(&path), Err(NodeError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let cfg = NodeConfig {
            network: "test".into(),
            rng_seed: Some(1),
            mining: MiningConfig {
                enabled: true,
                dataset_worker: false,
            },
            ..NodeConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), cfg);
    }

    #[test]
    fn store_opens_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = NodeConfig {
            data_dir: dir.path().join("data"),
            ..NodeConfig::default()
        };
        let store = cfg.open_store().unwrap();
        assert_eq!(store.precompute_count().unwrap(), 0);
        assert!(cfg.store_path().exists());
    }
}
