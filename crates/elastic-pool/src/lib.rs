//! # Elastic Worker Pool
//!
//! A pool of concurrent async workers whose size converges toward a
//! runtime-adjustable target.
//!
//! ## Features
//!
//! - **Elastic sizing**: change the expected count at any time; the pool
//!   spawns or signals workers until it matches
//! - **Two execution models**: run a function once per worker, or loop it
//!   until the worker is asked to stop
//! - **Cooperative stop**: a running call is never interrupted; workers
//!   observe stop requests between iterations
//! - **Named pools**: [`PoolManager`] controls several pools from one place
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Pool                                │
//! │  (set/get expected count and poll interval, shutdown)       │
//! └─────────────────────────────────────────────────────────────┘
//!              │ writes                         │ reads
//!              ▼                                ▼
//! ┌──────────────────────────┐    ┌──────────────────────────────┐
//! │       TargetState        │◄───│        Reconcile loop        │
//! │ (expected, poll interval)│    │ (one spawn or stop per tick) │
//! └──────────────────────────┘    └──────────────────────────────┘
//!                                               │
//!                                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RunningRegistry                          │
//! │  (worker ID -> stop signal, oldest first)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkerContainer                          │
//! │  (registers, runs the work function, deregisters on exit)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use elastic_pool::prelude::*;
//! use std::time::Duration;
//!
//! let pool = Pool::builder(PoolConfig::new(100))
//!     .self_looping(|ctx| async move {
//!         process_batch(ctx.id()).await;
//!         LoopControl::Continue
//!     })
//!     .build()?;
//!
//! pool.set_expected_count(150)?;
//! // ... later
//! pool.set_expected_count(70)?;
//!
//! pool.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;
pub mod target;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, Result};
    pub use crate::manager::{ManagerError, PoolManager};
    pub use crate::pool::{Pool, PoolBuilder, PoolStatus};
    pub use crate::worker::{ExecutionModel, LoopControl, WorkFunction, WorkerContext, WorkerId};
}

// Re-export key types at crate root
pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use manager::{ManagerError, PoolManager};
pub use pool::{Pool, PoolBuilder, PoolStatus};
pub use target::{TargetState, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use worker::{
    ExecutionModel, IndexAllocator, LoopControl, RunningRegistry, StopSignal, WorkFunction,
    WorkerContext, WorkerId,
};
