//! Pool handle and builder

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::reconcile::Reconciler;
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::target::TargetState;
use crate::worker::{
    ExecutionModel, IndexAllocator, LoopControl, RunningRegistry, WorkFunction, WorkerContext,
    WorkerId,
};

/// How often `shutdown` re-checks the registry while draining
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Reconcile loop is running
    Running,
    /// Shutdown requested, waiting for workers to return
    Draining,
    /// Reconcile loop has stopped
    Stopped,
}

/// Builder for [`Pool`]
///
/// # Example
///
/// ```ignore
/// use elastic_pool::{Pool, PoolConfig};
/// use std::time::Duration;
///
/// let pool = Pool::builder(PoolConfig::new(10).with_poll_interval(Duration::from_millis(100)))
///     .single_shot(|id| async move {
///         tracing::info!(id, "working");
///         tokio::time::sleep(Duration::from_secs(1)).await;
///     })
///     .build()?;
/// ```
#[derive(Debug)]
pub struct PoolBuilder {
    config: PoolConfig,
    work: Option<WorkFunction>,
}

impl PoolBuilder {
    /// Create a builder from a configuration
    pub fn new(config: PoolConfig) -> Self {
        Self { config, work: None }
    }

    /// Set the work function
    pub fn work(mut self, work: WorkFunction) -> Self {
        self.work = Some(work);
        self
    }

    /// Run `work` once per worker
    pub fn single_shot<F, Fut>(self, work: F) -> Self
    where
        F: Fn(WorkerId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.work(WorkFunction::single_shot(work))
    }

    /// Run `work` in a loop per worker until it is signaled or returns
    /// [`LoopControl::Stop`]
    pub fn self_looping<F, Fut>(self, work: F) -> Self
    where
        F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoopControl> + Send + 'static,
    {
        self.work(WorkFunction::self_looping(work))
    }

    /// Validate and start the pool
    ///
    /// Must be called from within a tokio runtime; the reconcile loop is
    /// spawned onto it before this returns.
    #[instrument(skip(self), fields(expected_count = self.config.expected_count))]
    pub fn build(self) -> Result<Pool> {
        let work = self.work.ok_or(PoolError::MissingWorkFunction)?;
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let target = Arc::new(TargetState::new(
            self.config.expected_count,
            self.config.poll_interval,
        )?);
        let registry = Arc::new(RunningRegistry::new());
        let status = Arc::new(RwLock::new(PoolStatus::Running));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let model = work.model();

        let reconciler = Reconciler::new(
            Arc::clone(&target),
            Arc::clone(&registry),
            Arc::new(IndexAllocator::new()),
            work,
            Arc::clone(&status),
            shutdown_rx,
        );
        let reconcile_handle = runtime.spawn(reconciler.run());

        info!(
            %model,
            expected_count = self.config.expected_count,
            poll_interval = ?self.config.poll_interval,
            "Pool started"
        );

        Ok(Pool {
            inner: Arc::new(PoolInner {
                model,
                shutdown_timeout: self.config.shutdown_timeout,
                target,
                registry,
                status,
                shutdown_tx,
                reconcile_handle: Mutex::new(Some(reconcile_handle)),
            }),
        })
    }
}

struct PoolInner {
    model: ExecutionModel,
    shutdown_timeout: Duration,
    target: Arc<TargetState>,
    registry: Arc<RunningRegistry>,
    status: Arc<RwLock<PoolStatus>>,
    shutdown_tx: watch::Sender<bool>,
    reconcile_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running elastic pool
///
/// Cloning is cheap and every clone controls the same pool. Dropping the
/// last handle stops the reconcile loop and signals all workers, without
/// waiting for them; call [`Pool::shutdown`] to wait.
///
/// # Example
///
/// ```ignore
/// use elastic_pool::{LoopControl, Pool};
///
/// let pool = Pool::self_looping(100, |ctx| async move {
///     do_work(ctx.id()).await;
///     LoopControl::Continue
/// })?;
///
/// pool.set_expected_count(150)?;
/// assert_eq!(pool.expected_count(), 150);
///
/// pool.shutdown().await?;
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Start configuring a pool
    pub fn builder(config: PoolConfig) -> PoolBuilder {
        PoolBuilder::new(config)
    }

    /// Start a single-shot pool with default configuration
    pub fn single_shot<F, Fut>(expected_count: u64, work: F) -> Result<Self>
    where
        F: Fn(WorkerId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::builder(PoolConfig::new(expected_count))
            .single_shot(work)
            .build()
    }

    /// Start a self-looping pool with default configuration
    pub fn self_looping<F, Fut>(expected_count: u64, work: F) -> Result<Self>
    where
        F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoopControl> + Send + 'static,
    {
        Self::builder(PoolConfig::new(expected_count))
            .self_looping(work)
            .build()
    }

    /// Desired number of workers
    pub fn expected_count(&self) -> u64 {
        self.inner.target.expected_count()
    }

    /// Change the desired number of workers
    ///
    /// Returns immediately; the pool converges on later ticks.
    pub fn set_expected_count(&self, count: u64) -> Result<()> {
        debug!(count, "Expected count updated");
        self.inner.target.set_expected_count(count)
    }

    /// Reconcile cadence
    pub fn poll_interval(&self) -> Duration {
        self.inner.target.poll_interval()
    }

    /// Change the reconcile cadence (minimum 1ms)
    pub fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        self.inner.target.set_poll_interval(interval)
    }

    /// Number of registered workers, including ones asked to stop
    pub fn current_count(&self) -> u64 {
        self.inner.registry.count()
    }

    /// Number of workers asked to stop that have not returned yet
    pub fn stopping_count(&self) -> u64 {
        self.inner.registry.snapshot().stopping
    }

    /// IDs of registered workers, oldest first
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.inner.registry.worker_ids()
    }

    /// Execution model chosen at construction
    pub fn model(&self) -> ExecutionModel {
        self.inner.model
    }

    /// Current status
    pub fn status(&self) -> PoolStatus {
        *self.inner.status.read()
    }

    /// Stop the pool and wait for workers to return
    ///
    /// Stops the reconcile loop, signals every worker and waits up to the
    /// configured shutdown timeout. In-flight calls are never interrupted.
    /// Calling it again after a successful shutdown is a no-op. A pool whose
    /// loop already halted still waits here for its workers to return.
    #[instrument(skip(self), fields(model = %self.inner.model))]
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut status = self.inner.status.write();
            if *status != PoolStatus::Stopped {
                *status = PoolStatus::Draining;
            }
        }

        info!(running = self.current_count(), "Initiating graceful shutdown");
        let _ = self.inner.shutdown_tx.send(true);

        let handle = self.inner.reconcile_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Reconcile loop ended abnormally: {}", e);
            }
        }

        // Only the reconcile loop spawns workers, so nothing registers after this
        self.inner.registry.signal_all();

        // None when the timeout is too large to represent: wait indefinitely
        let deadline = tokio::time::Instant::now().checked_add(self.inner.shutdown_timeout);
        loop {
            let remaining = self.current_count();
            if remaining == 0 {
                debug!("All workers returned");
                break;
            }

            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                warn!(remaining, "Shutdown timeout reached");
                return Err(PoolError::ShutdownTimeout { remaining });
            }

            tokio::time::sleep(DRAIN_CHECK_INTERVAL).await;
        }

        *self.inner.status.write() = PoolStatus::Stopped;
        info!("Pool stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("model", &self.inner.model)
            .field("status", &self.status())
            .field("expected_count", &self.expected_count())
            .field("current_count", &self.current_count())
            .field("poll_interval", &self.poll_interval())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_work_function() {
        let result = PoolBuilder::new(PoolConfig::new(1)).build();
        assert!(matches!(result, Err(PoolError::MissingWorkFunction)));
    }

    #[test]
    fn test_build_outside_runtime() {
        let result = Pool::single_shot(1, |_id| async {});
        assert!(matches!(result, Err(PoolError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_build_rejects_short_poll_interval() {
        let result = Pool::builder(PoolConfig::new(1).with_poll_interval(Duration::ZERO))
            .single_shot(|_id| async {})
            .build();

        assert!(matches!(
            result,
            Err(PoolError::PollIntervalTooShort { .. })
        ));
    }

    #[tokio::test]
    async fn test_defaults_after_build() {
        let pool = Pool::self_looping(0, |_ctx| async { LoopControl::Continue }).unwrap();

        assert_eq!(pool.model(), ExecutionModel::SelfLooping);
        assert_eq!(pool.status(), PoolStatus::Running);
        assert_eq!(pool.expected_count(), 0);
        assert_eq!(pool.poll_interval(), Duration::from_secs(1));
        assert_eq!(pool.current_count(), 0);
        assert!(format!("{:?}", pool).contains("SelfLooping"));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let pool = Pool::single_shot(0, |_id| async {}).unwrap();

        pool.shutdown().await.unwrap();
        assert_eq!(pool.status(), PoolStatus::Stopped);

        pool.shutdown().await.unwrap();
        assert_eq!(pool.status(), PoolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_with_unbounded_timeout() {
        let pool = Pool::builder(PoolConfig::new(1).with_shutdown_timeout(Duration::MAX))
            .single_shot(|_id| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
            .build()
            .unwrap();

        pool.shutdown().await.unwrap();
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.current_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_after_corruption_waits_for_workers() {
        let pool = Pool::builder(PoolConfig::new(2).with_poll_interval(Duration::from_millis(1)))
            .self_looping(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                LoopControl::Continue
            })
            .build()
            .unwrap();

        while pool.current_count() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Order entry with no worker behind it; scale-down reaches it last
        pool.inner.registry.corrupt_order_index(999);
        pool.set_expected_count(0).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while pool.status() != PoolStatus::Stopped {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("loop should halt");

        // Workers are signaled but still inside their iteration
        assert!(pool.current_count() > 0);

        pool.shutdown().await.unwrap();
        assert_eq!(pool.current_count(), 0);
        assert_eq!(pool.status(), PoolStatus::Stopped);
    }
}
