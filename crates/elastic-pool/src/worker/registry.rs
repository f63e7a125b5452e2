//! Running worker bookkeeping
//!
//! Tracks every registered worker together with its stop signal. All
//! mutations go through one lock, so the count seen by the reconcile loop is
//! always consistent with the set of handles it can signal.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::trace;

use super::index::WorkerId;
use super::signal::StopSignal;

/// Registry invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The ID is still held by a live worker (allocator wraparound)
    #[error("worker {0} is already registered")]
    DuplicateWorker(WorkerId),

    /// Removal of a worker that is not registered
    #[error("worker {0} is not registered")]
    UnknownWorker(WorkerId),

    /// The insertion-order index points at a worker missing from the map
    #[error("registry order index references unregistered worker {0}")]
    Corrupted(WorkerId),
}

/// Point-in-time view of the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Registered workers, signaled or not
    pub running: u64,

    /// Registered workers the pool already asked to stop
    pub stopping: u64,
}

impl RegistrySnapshot {
    /// Workers that are registered and not yet signaled by the pool
    pub fn active(&self) -> u64 {
        self.running.saturating_sub(self.stopping)
    }
}

struct Registration {
    seq: u64,
    stop: StopSignal,
    signaled: bool,
}

#[derive(Default)]
struct RegistryInner {
    workers: HashMap<WorkerId, Registration>,
    /// Registration order of workers the pool has not signaled yet
    candidates: BTreeMap<u64, WorkerId>,
    next_seq: u64,
}

/// Registry of running workers and their stop handles
#[derive(Default)]
pub struct RunningRegistry {
    inner: Mutex<RegistryInner>,
}

impl RunningRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker
    pub fn add(&self, id: WorkerId, stop: StopSignal) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.workers.contains_key(&id) {
            return Err(RegistryError::DuplicateWorker(id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.workers.insert(
            id,
            Registration {
                seq,
                stop,
                signaled: false,
            },
        );
        inner.candidates.insert(seq, id);

        trace!(worker_id = id, "Worker registered");
        Ok(())
    }

    /// Deregister a worker
    pub fn remove(&self, id: WorkerId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let registration = inner
            .workers
            .remove(&id)
            .ok_or(RegistryError::UnknownWorker(id))?;

        if !registration.signaled {
            inner.candidates.remove(&registration.seq);
        }

        trace!(worker_id = id, "Worker deregistered");
        Ok(())
    }

    /// Number of registered workers
    pub fn count(&self) -> u64 {
        self.inner.lock().workers.len() as u64
    }

    /// Running and stopping counts taken under one lock
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.lock();
        let running = inner.workers.len() as u64;
        let active = inner.candidates.len() as u64;

        RegistrySnapshot {
            running,
            stopping: running.saturating_sub(active),
        }
    }

    /// Signal the earliest-registered worker that has not been signaled yet
    ///
    /// Selection and signaling happen in one critical section, so two
    /// overlapping scale-down decisions never pick the same worker.
    pub fn signal_oldest(&self) -> Result<Option<WorkerId>, RegistryError> {
        let mut inner = self.inner.lock();
        let Some((_, id)) = inner.candidates.pop_first() else {
            return Ok(None);
        };

        match inner.workers.get_mut(&id) {
            Some(registration) => {
                registration.signaled = true;
                registration.stop.request_stop();
                Ok(Some(id))
            }
            None => Err(RegistryError::Corrupted(id)),
        }
    }

    /// Signal every registered worker, returning how many are registered
    pub fn signal_all(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.candidates.clear();
        for registration in inner.workers.values_mut() {
            registration.signaled = true;
            registration.stop.request_stop();
        }
        inner.workers.len()
    }

    /// Registered worker IDs, oldest registration first
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let inner = self.inner.lock();
        let mut ids: Vec<_> = inner
            .workers
            .iter()
            .map(|(id, registration)| (registration.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_order_index(&self, id: WorkerId) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.candidates.insert(seq, id);
    }
}

impl std::fmt::Debug for RunningRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("RunningRegistry")
            .field("running", &snapshot.running)
            .field("stopping", &snapshot.stopping)
            .finish()
    }
}
