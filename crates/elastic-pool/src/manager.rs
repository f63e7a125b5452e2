//! Named registry of pools
//!
//! The manager maps pool names to pool handles so a process can control
//! several pools from one place. It owns no workers itself; every operation
//! delegates to the matching [`Pool`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::pool::Pool;

/// Errors from manager operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// Another pool is already registered under this name
    #[error("name already used: {0}")]
    NameAlreadyUsed(String),

    /// No pool is registered under this name
    #[error("pool not found: {0}")]
    NotFound(String),

    /// The pool rejected the operation
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Registry of named pool handles
#[derive(Default)]
pub struct PoolManager {
    pools: RwLock<HashMap<String, Pool>>,
}

impl PoolManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under a unique name
    ///
    /// On collision the existing registration is kept.
    pub fn add(&self, name: impl Into<String>, pool: Pool) -> Result<(), ManagerError> {
        let name = name.into();
        let mut pools = self.pools.write();
        if pools.contains_key(&name) {
            return Err(ManagerError::NameAlreadyUsed(name));
        }

        info!(pool = %name, model = %pool.model(), "Pool registered");
        pools.insert(name, pool);
        Ok(())
    }

    /// Unregister a pool, returning its handle
    ///
    /// The pool keeps running for as long as the returned handle (or any
    /// clone) is alive.
    pub fn remove(&self, name: &str) -> Option<Pool> {
        self.pools.write().remove(name)
    }

    /// Look up a pool by name
    pub fn get(&self, name: &str) -> Option<Pool> {
        self.pools.read().get(name).cloned()
    }

    /// Snapshot of every registered pool
    pub fn all(&self) -> HashMap<String, Pool> {
        self.pools.read().clone()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered pools
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Whether no pool is registered
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Set the expected worker count of the named pool
    pub fn set_expected_count(&self, name: &str, count: u64) -> Result<(), ManagerError> {
        Ok(self.pool(name)?.set_expected_count(count)?)
    }

    /// Expected worker count of the named pool
    pub fn expected_count(&self, name: &str) -> Result<u64, ManagerError> {
        Ok(self.pool(name)?.expected_count())
    }

    /// Set the poll interval of the named pool
    pub fn set_poll_interval(&self, name: &str, interval: Duration) -> Result<(), ManagerError> {
        Ok(self.pool(name)?.set_poll_interval(interval)?)
    }

    /// Poll interval of the named pool
    pub fn poll_interval(&self, name: &str) -> Result<Duration, ManagerError> {
        Ok(self.pool(name)?.poll_interval())
    }

    /// Registered worker count of the named pool
    pub fn current_count(&self, name: &str) -> Result<u64, ManagerError> {
        Ok(self.pool(name)?.current_count())
    }

    /// Shut down every registered pool
    ///
    /// Every pool is attempted; the first failure is returned. Pools stay
    /// registered.
    pub async fn shutdown_all(&self) -> Result<(), ManagerError> {
        let pools: Vec<_> = self
            .pools
            .read()
            .iter()
            .map(|(name, pool)| (name.clone(), pool.clone()))
            .collect();

        let mut first_error = None;
        for (name, pool) in pools {
            if let Err(e) = pool.shutdown().await {
                warn!(pool = %name, "Pool shutdown failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn pool(&self, name: &str) -> Result<Pool, ManagerError> {
        self.get(name)
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("pools", &self.names())
            .finish()
    }
}
