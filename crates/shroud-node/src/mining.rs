//! Mining support: the background epoch dataset and a simple header solver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use shroud_consensus::powhash::{epoch_number, EpochDataset, PowHashError};
use shroud_consensus::validation::dataset_seal;
use shroud_consensus::{
    check_proof_of_work, AncestorSource, BlockHeader, PowAlgorithm, ProofEngine,
};
use tracing::{debug, info, warn};

use crate::error::NodeResult;

#[derive(Clone, Debug)]
pub enum DatasetState {
    Idle,
    Building { epoch: u32 },
    Ready(Arc<EpochDataset>),
    Failed { epoch: u32, error: String },
}

struct Job {
    epoch: u32,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Job {
    fn cancel_and_join(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!(epoch = self.epoch, "dataset build thread panicked");
            }
        }
    }
}

/// Builds the full dataset for one epoch at a time on its own thread.
/// Requesting another epoch cancels the running build. Validation never
/// depends on it; it only speeds up mining.
pub struct DatasetWorker {
    engine: Arc<ProofEngine>,
    state: Arc<Mutex<DatasetState>>,
    job: Mutex<Option<Job>>,
}

impl DatasetWorker {
    pub fn new(engine: Arc<ProofEngine>) -> Self {
        Self {
            engine,
            state: Arc::new(Mutex::new(DatasetState::Idle)),
            job: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DatasetState {
        self.state.lock().clone()
    }

    pub fn dataset(&self) -> Option<Arc<EpochDataset>> {
        match &*self.state.lock() {
            DatasetState::Ready(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    /// Makes sure the dataset for `height` is built or being built.
    pub fn request_height(&self, height: u32) -> NodeResult<()> {
        let epoch = epoch_number(height, self.engine.params().pow_hash.dataset_epoch_length);
        self.request_epoch(epoch)
    }

    /// Starts a build for `epoch` unless one is running or done. A failed
    /// build of the same epoch is retried.
    pub fn request_epoch(&self, epoch: u32) -> NodeResult<()> {
        let mut job = self.job.lock();
        if let Some(j) = job.as_ref() {
            let failed = matches!(*self.state.lock(), DatasetState::Failed { .. });
            if j.epoch == epoch && !failed {
                return Ok(());
            }
        }
        if let Some(old) = job.take() {
            old.cancel_and_join();
        }

        let cache = self.engine.epoch_cache(epoch)?;
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::clone(&self.state);
        *state.lock() = DatasetState::Building { epoch };
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("dataset-{epoch}"))
            .spawn(move || {
                debug!(epoch, "dataset build started");
                let result = EpochDataset::build(&cache, &flag);
                let mut s = state.lock();
                *s = match result {
                    Ok(d) => {
                        info!(epoch, "dataset ready");
                        DatasetState::Ready(Arc::new(d))
                    }
                    Err(PowHashError::Cancelled) => {
                        debug!(epoch, "dataset build cancelled");
                        DatasetState::Idle
                    }
                    Err(e) => {
                        warn!(epoch, error = %e, "dataset build failed");
                        DatasetState::Failed {
                            epoch,
                            error: e.to_string(),
                        }
                    }
                };
            })?;
        *job = Some(Job {
            epoch,
            cancel,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Waits for the running build, if any. A build thread that panicked
    /// leaves the worker `Failed`.
    pub fn wait(&self) {
        let running = self
            .job
            .lock()
            .as_mut()
            .and_then(|j| j.handle.take().map(|h| (j.epoch, h)));
        if let Some((epoch, h)) = running {
            if h.join().is_err() {
                warn!(epoch, "dataset build thread panicked");
                *self.state.lock() = DatasetState::Failed {
                    epoch,
                    error: "build thread panicked".into(),
                };
            }
        }
    }
}

impl Drop for DatasetWorker {
    fn drop(&mut self) {
        if let Some(j) = self.job.get_mut().take() {
            j.cancel_and_join();
        }
    }
}

/// Searches nonces until `header` meets its own target, trying at most
/// `max_tries`. Dataset headers get their mix hash filled in; `dataset`
/// is used when it matches the header's epoch, otherwise the light cache.
pub fn solve_header<C: AncestorSource + ?Sized>(
    engine: &ProofEngine,
    chain: &C,
    header: &mut BlockHeader,
    dataset: Option<&EpochDataset>,
    max_tries: u64,
) -> NodeResult<bool> {
    let lane = header.lane()?;
    let limit = engine.params().pow_limit_for(lane).clone();
    let p = engine.params().pow_hash;
    for _ in 0..max_tries {
        let hash = match header.pow_algorithm() {
            Some(PowAlgorithm::EpochDataset) => {
                let epoch = epoch_number(header.height, p.dataset_epoch_length);
                let seal = match dataset.filter(|d| d.epoch() == epoch) {
                    Some(d) => dataset_seal(header, d, header.nonce64, p.dataset_rounds),
                    None => {
                        let cache = engine.epoch_cache(epoch)?;
                        dataset_seal(header, cache.as_ref(), header.nonce64, p.dataset_rounds)
                    }
                };
                header.mix_hash = seal.mix_hash;
                seal.final_hash
            }
            _ => engine.pow_hash(header, chain)?,
        };
        if check_proof_of_work(&hash, header.bits, &limit).is_ok() {
            return Ok(true);
        }
        match header.pow_algorithm() {
            Some(PowAlgorithm::EpochDataset) => header.nonce64 = header.nonce64.wrapping_add(1),
            _ => header.nonce = header.nonce.wrapping_add(1),
        }
    }
    Ok(false)
}
