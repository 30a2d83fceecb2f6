//! Extraction slots.
//!
//! An [`ExtractionPool`] hands out a fixed number of permits. With the
//! default size of 1 every extraction through the pool runs alone;
//! additional callers block until the running one finishes. Thumbnailers
//! that share a hardware context share one pool.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Condvar, Mutex, PoisonError};

/// Counting gate limiting how many extractions run at once.
pub struct ExtractionPool {
    size: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl ExtractionPool {
    /// Create a pool with `size` slots. A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Block until a slot is free and take it.
    ///
    /// The slot is returned when the permit is dropped.
    pub fn acquire(&self) -> PoolPermit<'_> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= self.size {
            in_use = self
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        PoolPermit { pool: self }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<PoolPermit<'_>> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        if *in_use >= self.size {
            return None;
        }
        *in_use += 1;
        Some(PoolPermit { pool: self })
    }

    /// Total number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.released.notify_one();
    }
}

impl Default for ExtractionPool {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Debug for ExtractionPool {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter
            .debug_struct("ExtractionPool")
            .field("size", &self.size)
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// A held pool slot. Dropping it frees the slot.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct PoolPermit<'a> {
    pool: &'a ExtractionPool,
}

impl Debug for PoolPermit<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.debug_struct("PoolPermit").finish_non_exhaustive()
    }
}

impl Drop for PoolPermit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
