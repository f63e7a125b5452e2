//! Worker identifier allocation

use parking_lot::Mutex;

/// Identifier handed to every worker container
pub type WorkerId = u64;

/// Issues worker identifiers
///
/// Identifiers increase by one per call and wrap to 0 after `u64::MAX`.
/// Uniqueness only holds within a window smaller than the ID space;
/// `RunningRegistry::add` rejects a wrapped ID that is still registered.
#[derive(Debug, Default)]
pub struct IndexAllocator {
    last: Mutex<WorkerId>,
}

impl IndexAllocator {
    /// Create an allocator whose first issued ID is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator that continues after `last`
    #[cfg(test)]
    pub(crate) fn starting_after(last: WorkerId) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    /// Reserve the next identifier
    pub fn next_index(&self) -> WorkerId {
        let mut last = self.last.lock();
        *last = last.wrapping_add(1);
        *last
    }
}
