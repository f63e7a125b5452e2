//! Elastic pool
//!
//! A [`Pool`] owns one background reconcile loop. Each tick samples the
//! expected count and the registry, then takes at most one action:
//!
//! ```text
//!   expected > running           ──► spawn one worker (fresh ID)
//!   expected < active (looping)  ──► signal the oldest unsignaled worker
//!   otherwise                    ──► sleep one poll interval
//! ```
//!
//! `active` excludes workers already signaled, so a slow worker is never
//! asked to stop twice. Ticks that act yield and run again right away;
//! only idle ticks wait for the poll interval.

mod handle;
mod reconcile;

pub use handle::{Pool, PoolBuilder, PoolStatus};
