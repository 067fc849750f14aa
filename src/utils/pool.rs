//! Typed free-list pool
//!
//! Borrowing pops a recycled instance or constructs a fresh one; returning
//! clears the instance and pushes it back. The pool is single-threaded and
//! does not detect double returns.

/// Types that can be recycled by a [`Pool`].
pub trait Poolable: Default {
    /// Resets every field to its freshly constructed state.
    fn clear(&mut self);
}

/// Lifetime counters, mostly useful for leak checks in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances handed out by [`Pool::acquire`].
    pub borrowed: usize,
    /// Instances given back through [`Pool::release`].
    pub returned: usize,
    /// Instances constructed because the free list was empty.
    pub created: usize,
}

impl PoolStats {
    /// Instances currently held by callers.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.borrowed.saturating_sub(self.returned)
    }
}

#[derive(Debug)]
pub struct Pool<T: Poolable> {
    free: Vec<T>,
    stats: PoolStats,
}

impl<T: Poolable> Pool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    /// Pops a recycled instance, or constructs one.
    pub fn acquire(&mut self) -> T {
        self.stats.borrowed += 1;
        self.free.pop().unwrap_or_else(|| {
            self.stats.created += 1;
            T::default()
        })
    }

    /// Clears `item` and keeps it for reuse.
    pub fn release(&mut self, mut item: T) {
        item.clear();
        self.stats.returned += 1;
        self.free.push(item);
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Drops every recycled instance.
    pub fn shrink(&mut self) {
        self.free.clear();
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
