//! Reconcile loop
//!
//! Converges the number of registered workers toward the expected count,
//! issuing at most one scale action per tick.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::handle::PoolStatus;
use crate::target::TargetState;
use crate::worker::{
    ExecutionModel, IndexAllocator, RegistryError, RegistrySnapshot, RunningRegistry,
    WorkFunction, WorkerContainer,
};

/// Decision taken by one reconcile tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScaleAction {
    /// Register and launch one new worker
    Spawn,
    /// Signal the oldest unsignaled worker to stop
    Stop,
    /// Nothing to do until the next poll interval
    Idle,
}

/// Pick the scale action for one tick
///
/// Scale-up compares against every registered worker, so a worker that was
/// signaled but has not returned yet still counts. Scale-down only looks at
/// workers not yet signaled, so a worker is never asked twice and the pool
/// never overshoots below the target while stragglers finish. Single-shot
/// workers are never signaled; they drain by not being replaced.
pub(crate) fn decide(
    expected: u64,
    snapshot: RegistrySnapshot,
    model: ExecutionModel,
) -> ScaleAction {
    if expected > snapshot.running {
        return ScaleAction::Spawn;
    }

    if model == ExecutionModel::SelfLooping && expected < snapshot.active() {
        return ScaleAction::Stop;
    }

    ScaleAction::Idle
}

/// Background task driving one pool
pub(crate) struct Reconciler {
    target: Arc<TargetState>,
    registry: Arc<RunningRegistry>,
    allocator: Arc<IndexAllocator>,
    work: WorkFunction,
    status: Arc<RwLock<PoolStatus>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Reconciler {
    pub(crate) fn new(
        target: Arc<TargetState>,
        registry: Arc<RunningRegistry>,
        allocator: Arc<IndexAllocator>,
        work: WorkFunction,
        status: Arc<RwLock<PoolStatus>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            target,
            registry,
            allocator,
            work,
            status,
            shutdown_rx,
        }
    }

    /// Run one tick: sample state, decide, act
    pub(crate) fn tick(&self) -> Result<ScaleAction, RegistryError> {
        let expected = self.target.expected_count();
        let snapshot = self.registry.snapshot();
        let action = decide(expected, snapshot, self.work.model());

        match action {
            ScaleAction::Spawn => {
                // Allocation is not atomic with registration; the gap only
                // shows up as a brief undercount.
                let id = self.allocator.next_index();
                let container = WorkerContainer::register(id, self.work.clone(), &self.registry)?;
                container.launch();
                trace!(
                    worker_id = id,
                    expected,
                    running = snapshot.running + 1,
                    "Spawned worker"
                );
            }
            ScaleAction::Stop => {
                if let Some(id) = self.registry.signal_oldest()? {
                    debug!(
                        worker_id = id,
                        expected,
                        running = snapshot.running,
                        "Signaled worker to stop"
                    );
                }
            }
            ScaleAction::Idle => {}
        }

        Ok(action)
    }

    /// Run until shutdown is requested or every pool handle is dropped
    pub(crate) async fn run(mut self) {
        info!(model = %self.work.model(), "Reconcile loop started");

        loop {
            if *self.shutdown_rx.borrow() {
                debug!("Reconcile loop: shutdown requested");
                break;
            }
            // Busy ticks never reach the select below, so check for a closed channel here
            if self.shutdown_rx.has_changed().is_err() {
                debug!("Reconcile loop: all pool handles dropped");
                break;
            }

            let idle = match self.tick() {
                Ok(action) => action == ScaleAction::Idle,
                Err(RegistryError::Corrupted(id)) => {
                    error!(
                        worker_id = id,
                        "Worker registry is corrupted, halting reconcile loop"
                    );
                    *self.status.write() = PoolStatus::Stopped;
                    break;
                }
                Err(e) => {
                    warn!("Reconcile tick skipped: {}", e);
                    false
                }
            };

            if !idle {
                tokio::task::yield_now().await;
                continue;
            }

            let interval = self.target.poll_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        debug!("Reconcile loop: all pool handles dropped");
                        break;
                    }
                }
            }
        }

        let signaled = self.registry.signal_all();
        debug!(signaled, "Reconcile loop exited");
    }
}
