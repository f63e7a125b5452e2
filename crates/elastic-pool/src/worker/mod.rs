//! Worker lifecycle
//!
//! This module provides:
//! - [`IndexAllocator`] - Worker ID allocation with wraparound
//! - [`StopSignal`] - Cooperative stop flag shared by pool and worker
//! - [`RunningRegistry`] - Registered workers and their stop handles
//! - [`WorkFunction`] - The user function in one of two execution models
//!
//! # Execution models
//!
//! ```text
//!  single-shot                      self-looping
//!  ┌──────────────┐                 ┌──────────────────────────────┐
//!  │ register     │                 │ register                     │
//!  │ call f(id)   │                 │ while !stop {                │
//!  │ deregister   │                 │     call f(ctx) ─► Continue  │
//!  └──────────────┘                 │                 └► Stop: end │
//!                                   │ }                            │
//!                                   │ deregister                   │
//!                                   └──────────────────────────────┘
//! ```

mod container;
mod index;
mod registry;
mod signal;

pub(crate) use container::WorkerContainer;
pub use container::{
    ExecutionModel, LoopControl, SelfLoopingFn, SingleShotFn, WorkFunction, WorkFuture,
    WorkerContext,
};
pub use index::{IndexAllocator, WorkerId};
pub use registry::{RegistryError, RegistrySnapshot, RunningRegistry};
pub use signal::StopSignal;
