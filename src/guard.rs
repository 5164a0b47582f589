//! Scoped admission guards.
//!
//! A guard stands for one admitted call. Dropping it exits with the token
//! it entered with, so unwinding and dropped futures still release their
//! admission. A failure during drop cannot be returned and is logged at
//! error level; call `release` to observe it instead.

use crate::error::Result;
use crate::registry::ReentrancyRegistry;
use crate::stack::ReentrancyStack;
use crate::state::ExitOutcome;
use crate::table::Handle;
use crate::token::ReentrancyToken;
use core::hash::BuildHasher;
use std::collections::hash_map::RandomState;

/// Guard for a call admitted by a [`ReentrancyStack`].
#[must_use = "dropping the guard exits the admitted call immediately"]
#[derive(Debug)]
pub struct StackGuard<'a> {
    owner: &'a ReentrancyStack,
    token: Option<ReentrancyToken>,
    depth: usize,
    armed: bool,
}

impl<'a> StackGuard<'a> {
    pub(crate) fn new(owner: &'a ReentrancyStack, token: Option<&str>, depth: usize) -> Self {
        Self {
            owner,
            token: token.map(ReentrancyToken::from),
            depth,
            armed: true,
        }
    }

    /// Depth at which this call was admitted.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(ReentrancyToken::as_str)
    }

    /// Exit now and report the outcome.
    pub fn release(mut self) -> Result<ExitOutcome> {
        self.armed = false;
        self.owner.exit(self.token())
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.owner.exit(self.token()) {
            tracing::error!(token = ?self.token(), error = %e, "reentrancy guard failed to exit");
        }
    }
}

/// Guard for a call admitted by a [`ReentrancyRegistry`].
///
/// Holds the generational handle of its entry, so releasing does not hash
/// the key again. If the entry was already removed by an unpaired `exit`,
/// the release reports `Underflow`.
#[must_use = "dropping the guard exits the admitted call immediately"]
pub struct RegistryGuard<'a, S = RandomState>
where
    S: BuildHasher,
{
    owner: &'a ReentrancyRegistry<S>,
    shard: usize,
    handle: Handle,
    token: Option<ReentrancyToken>,
    depth: usize,
    armed: bool,
}

impl<'a, S: BuildHasher> RegistryGuard<'a, S> {
    pub(crate) fn new(
        owner: &'a ReentrancyRegistry<S>,
        shard: usize,
        handle: Handle,
        token: Option<&str>,
        depth: usize,
    ) -> Self {
        Self {
            owner,
            shard,
            handle,
            token: token.map(ReentrancyToken::from),
            depth,
            armed: true,
        }
    }

    /// Depth at which this call was admitted.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(ReentrancyToken::as_str)
    }

    /// Exit now and report the outcome.
    pub fn release(mut self) -> Result<ExitOutcome> {
        self.armed = false;
        self.owner.exit_handle(self.shard, self.handle, self.token())
    }
}

impl<S: BuildHasher> Drop for RegistryGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.owner.exit_handle(self.shard, self.handle, self.token()) {
            tracing::error!(token = ?self.token(), error = %e, "reentrancy guard failed to exit");
        }
    }
}

impl<S: BuildHasher> core::fmt::Debug for RegistryGuard<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryGuard")
            .field("shard", &self.shard)
            .field("token", &self.token)
            .field("depth", &self.depth)
            .finish()
    }
}
