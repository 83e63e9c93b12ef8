//! Allocation of nested records.
//!
//! Fields holding boxed records are allocated through a [`MemoryPool`]
//! during decoding. The pool hands out owned boxes, so decoded records
//! don’t borrow from it and remain valid after it is gone.

use tracing::trace;

//------------ MemoryPool ----------------------------------------------------

/// Hands out default-initialized values on the heap.
#[derive(Clone, Debug, Default)]
pub struct MemoryPool {
    /// The number of values allocated so far.
    allocations: usize,
}

impl MemoryPool {
    /// Creates a new pool.
    pub fn new() -> Self {
        Default::default()
    }

    /// Allocates a new default value of type `T`.
    pub fn allocate<T: Default>(&mut self) -> Box<T> {
        self.allocations += 1;
        trace!(
            allocations = self.allocations,
            ty = core::any::type_name::<T>(),
            "pool allocation"
        );
        Box::default()
    }

    /// Returns the number of values allocated since creation or the last
    /// call to [`clear`][Self::clear].
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Resets the allocation counter.
    pub fn clear(&mut self) {
        self.allocations = 0
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocate() {
        let mut pool = MemoryPool::new();
        let mut first = pool.allocate::<Vec<u8>>();
        let second = pool.allocate::<u32>();
        first.push(1);
        assert_eq!(*first, [1]);
        assert_eq!(*second, 0);
        assert_eq!(pool.allocations(), 2);
        pool.clear();
        assert_eq!(pool.allocations(), 0);
        drop(pool);
        assert_eq!(first.len(), 1);
    }
}
