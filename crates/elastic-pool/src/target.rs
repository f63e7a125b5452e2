//! Target state of a pool
//!
//! Reads and writes here are synchronous: a getter reflects the last
//! successful set immediately, while the running count catches up on later
//! reconcile ticks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{PoolError, Result};

/// Smallest poll interval accepted; bounds reconcile CPU cost
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll interval used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Desired worker count and reconcile cadence
#[derive(Debug)]
pub struct TargetState {
    expected_count: AtomicU64,
    poll_interval: RwLock<Duration>,
}

impl TargetState {
    /// Create a target state, validating the poll interval
    pub fn new(expected_count: u64, poll_interval: Duration) -> Result<Self> {
        validate_poll_interval(poll_interval)?;
        Ok(Self {
            expected_count: AtomicU64::new(expected_count),
            poll_interval: RwLock::new(poll_interval),
        })
    }

    /// Desired number of concurrently running workers
    pub fn expected_count(&self) -> u64 {
        self.expected_count.load(Ordering::Acquire)
    }

    /// Change the desired worker count; applied on the next tick
    pub fn set_expected_count(&self, count: u64) -> Result<()> {
        self.expected_count.store(count, Ordering::Release);
        Ok(())
    }

    /// Current reconcile cadence
    pub fn poll_interval(&self) -> Duration {
        *self.poll_interval.read()
    }

    /// Change the reconcile cadence
    ///
    /// Rejects intervals below [`MIN_POLL_INTERVAL`] and keeps the
    /// previous value in that case.
    pub fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        validate_poll_interval(interval)?;
        *self.poll_interval.write() = interval;
        Ok(())
    }
}

pub(crate) fn validate_poll_interval(interval: Duration) -> Result<()> {
    if interval < MIN_POLL_INTERVAL {
        return Err(PoolError::PollIntervalTooShort {
            requested: interval,
        });
    }
    Ok(())
}
