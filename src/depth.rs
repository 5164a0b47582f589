//! Nesting counter for an admitted call chain.
//!
//! The counter is not atomic on its own; it is always mutated together with
//! the owning token while the enclosing lock is held.

/// Count of admitted, not yet exited calls of one chain.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct DepthCount {
    count: usize,
}

impl DepthCount {
    pub(crate) const fn new() -> Self {
        Self { count: 0 }
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.count
    }

    /// Add one admitted call and return the new depth.
    #[inline]
    pub(crate) fn increment(&mut self) -> usize {
        let n = self.count.wrapping_add(1);
        if n == 0 {
            // Same policy as Rc: an overflowed count cannot be trusted.
            std::process::abort();
        }
        self.count = n;
        n
    }

    /// Remove one admitted call. Returns `None` if the count is already zero,
    /// otherwise whether the count is now zero.
    #[inline]
    pub(crate) fn decrement(&mut self) -> Option<bool> {
        let n = self.count.checked_sub(1)?;
        self.count = n;
        Some(n == 0)
    }
}
