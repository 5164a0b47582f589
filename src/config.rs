//! Registry configuration.

use std::num::NonZeroUsize;

/// Upper bound on the number of shards a registry will allocate.
pub const MAX_SHARDS: usize = 1 << 16;

/// Sizing for a [`ReentrancyRegistry`](crate::ReentrancyRegistry).
///
/// Shard count is always a power of two in `1..=MAX_SHARDS`; other values
/// are rounded up (and clamped) when set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryConfig {
    shard_count: usize,
    shard_capacity: usize,
}

impl Default for RegistryConfig {
    /// Four shards per available core, rounded to a power of two.
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            shard_count: normalize_shards(cores.saturating_mul(4)),
            shard_capacity: 0,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard_count(mut self, shards: usize) -> Self {
        self.shard_count = normalize_shards(shards);
        self
    }

    /// Entries pre-allocated per shard.
    pub fn with_shard_capacity(mut self, capacity: usize) -> Self {
        self.shard_capacity = capacity;
        self
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    pub fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }
}

fn normalize_shards(n: usize) -> usize {
    n.clamp(1, MAX_SHARDS).next_power_of_two()
}
