//! Worker containers
//!
//! A container wraps one activation of the user function. It registers
//! itself before it is launched and deregisters exactly once when it
//! returns, including when the user function panics.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use super::index::WorkerId;
use super::registry::{RegistryError, RunningRegistry};
use super::signal::StopSignal;
use crate::error::PoolError;

/// Boxed future returned by work functions
pub type WorkFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Work function run once per activation
pub type SingleShotFn = Arc<dyn Fn(WorkerId) -> WorkFuture<()> + Send + Sync>;

/// Work function invoked repeatedly until the worker stops
pub type SelfLoopingFn = Arc<dyn Fn(WorkerContext) -> WorkFuture<LoopControl> + Send + Sync>;

/// How a worker executes the user function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    /// One call per worker, then the worker exits
    SingleShot,
    /// Repeated calls until the worker is signaled or ends its own loop
    SelfLooping,
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleShot => write!(f, "single_shot"),
            Self::SelfLooping => write!(f, "self_looping"),
        }
    }
}

impl std::str::FromStr for ExecutionModel {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_shot" | "single-shot" | "singleshot" | "" => Ok(Self::SingleShot),
            "self_looping" | "self-looping" | "selflooping" | "loop" => Ok(Self::SelfLooping),
            _ => Err(PoolError::config(format!(
                "unknown execution model: {}. Use 'single_shot' or 'self_looping'",
                s
            ))),
        }
    }
}

/// Outcome of one self-looping iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Run another iteration unless the pool asked to stop
    Continue,
    /// End this worker's loop; the pool spawns a replacement if needed
    Stop,
}

/// Context handed to a self-looping work function on every iteration
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    stop: StopSignal,
}

impl WorkerContext {
    /// ID of the worker running this iteration
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Stop signal shared with the pool
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// End the loop after the current iteration
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Whether the pool (or this worker) asked the loop to end
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }
}

/// User function together with its execution model
#[derive(Clone)]
pub enum WorkFunction {
    /// See [`ExecutionModel::SingleShot`]
    SingleShot(SingleShotFn),
    /// See [`ExecutionModel::SelfLooping`]
    SelfLooping(SelfLoopingFn),
}

impl WorkFunction {
    /// Wrap an async function run once per worker
    pub fn single_shot<F, Fut>(work: F) -> Self
    where
        F: Fn(WorkerId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: SingleShotFn = Arc::new(move |id| Box::pin(work(id)) as WorkFuture<()>);
        Self::SingleShot(wrapped)
    }

    /// Wrap an async function run in a loop per worker
    pub fn self_looping<F, Fut>(work: F) -> Self
    where
        F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoopControl> + Send + 'static,
    {
        let wrapped: SelfLoopingFn =
            Arc::new(move |ctx| Box::pin(work(ctx)) as WorkFuture<LoopControl>);
        Self::SelfLooping(wrapped)
    }

    /// Execution model of this function
    pub fn model(&self) -> ExecutionModel {
        match self {
            Self::SingleShot(_) => ExecutionModel::SingleShot,
            Self::SelfLooping(_) => ExecutionModel::SelfLooping,
        }
    }
}

impl fmt::Debug for WorkFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkFunction").field(&self.model()).finish()
    }
}

/// Removes the worker from the registry when dropped
struct RegistrationGuard {
    registry: Arc<RunningRegistry>,
    id: WorkerId,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if let Err(e) = self.registry.remove(self.id) {
            warn!(worker_id = self.id, "Failed to deregister worker: {}", e);
        }
    }
}

/// One registered activation of the user function
pub(crate) struct WorkerContainer {
    id: WorkerId,
    stop: StopSignal,
    work: WorkFunction,
    registration: RegistrationGuard,
}

impl WorkerContainer {
    /// Register a new container under `id`
    pub(crate) fn register(
        id: WorkerId,
        work: WorkFunction,
        registry: &Arc<RunningRegistry>,
    ) -> Result<Self, RegistryError> {
        let stop = StopSignal::new();
        registry.add(id, stop.clone())?;

        Ok(Self {
            id,
            stop,
            work,
            registration: RegistrationGuard {
                registry: Arc::clone(registry),
                id,
            },
        })
    }

    /// Spawn the container onto the runtime without waiting for it
    pub(crate) fn launch(self) -> JoinHandle<u64> {
        let span = tracing::debug_span!("worker", worker_id = self.id, model = %self.work.model());
        tokio::spawn(self.run().instrument(span))
    }

    /// Run to completion, returning the number of calls made
    pub(crate) async fn run(self) -> u64 {
        let Self {
            id,
            stop,
            work,
            registration,
        } = self;

        let iterations = match work {
            WorkFunction::SingleShot(work) => {
                work(id).await;
                1
            }
            WorkFunction::SelfLooping(work) => {
                let mut iterations = 0;
                while !stop.is_stop_requested() {
                    iterations += 1;
                    let ctx = WorkerContext {
                        id,
                        stop: stop.clone(),
                    };
                    if work(ctx).await == LoopControl::Stop {
                        debug!(iterations, "Worker ended its own loop");
                        break;
                    }
                }
                iterations
            }
        };

        debug!(iterations, "Worker exited");
        drop(registration);
        iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[test]
    fn test_execution_model_parse() {
        assert_eq!(
            "single_shot".parse::<ExecutionModel>().unwrap(),
            ExecutionModel::SingleShot
        );
        assert_eq!(
            "Self-Looping".parse::<ExecutionModel>().unwrap(),
            ExecutionModel::SelfLooping
        );
        assert!("forever".parse::<ExecutionModel>().is_err());
        assert_eq!(ExecutionModel::SelfLooping.to_string(), "self_looping");
    }

    #[tokio::test]
    async fn test_single_shot_runs_once_and_deregisters() {
        let registry = Arc::new(RunningRegistry::new());
        let calls = Arc::new(AtomicU64::new(0));

        let work = {
            let calls = Arc::clone(&calls);
            WorkFunction::single_shot(move |_id| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let container = WorkerContainer::register(1, work, &registry).unwrap();
        assert_eq!(registry.count(), 1);

        assert_eq!(container.run().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_self_looping_stops_via_context() {
        let registry = Arc::new(RunningRegistry::new());
        let calls = Arc::new(AtomicU64::new(0));

        let work = {
            let calls = Arc::clone(&calls);
            WorkFunction::self_looping(move |ctx| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                        ctx.request_stop();
                    }
                    LoopControl::Continue
                }
            })
        };

        let container = WorkerContainer::register(5, work, &registry).unwrap();
        assert_eq!(container.run().await, 3);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_self_looping_stops_on_loop_control() {
        let registry = Arc::new(RunningRegistry::new());

        let work = WorkFunction::self_looping(|ctx| async move {
            assert_eq!(ctx.id(), 9);
            LoopControl::Stop
        });

        let container = WorkerContainer::register(9, work, &registry).unwrap();
        assert_eq!(container.run().await, 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_stop_signal_waits_for_iteration_to_finish() {
        let registry = Arc::new(RunningRegistry::new());
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let finished = Arc::new(AtomicU64::new(0));

        let work = {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            let finished = Arc::clone(&finished);
            WorkFunction::self_looping(move |_ctx| {
                let started = Arc::clone(&started);
                let release = Arc::clone(&release);
                let finished = Arc::clone(&finished);
                async move {
                    started.notify_one();
                    release.notified().await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    LoopControl::Continue
                }
            })
        };

        let handle = WorkerContainer::register(1, work, &registry)
            .unwrap()
            .launch();

        started.notified().await;
        assert_eq!(registry.signal_oldest(), Ok(Some(1)));

        // Signaled mid-call: still registered until the call returns
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.count(), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        release.notify_one();
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_still_deregisters() {
        let registry = Arc::new(RunningRegistry::new());

        let work = WorkFunction::single_shot(|id| async move {
            panic!("worker {} failed", id);
        });

        let handle = WorkerContainer::register(3, work, &registry)
            .unwrap()
            .launch();

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Arc::new(RunningRegistry::new());
        let work = WorkFunction::single_shot(|_| async {});

        let _first = WorkerContainer::register(1, work.clone(), &registry).unwrap();
        let second = WorkerContainer::register(1, work, &registry);

        assert!(matches!(second, Err(RegistryError::DuplicateWorker(1))));
        assert_eq!(registry.count(), 1);
    }
}
