//! ReentrancyRegistry: per-instance state machines behind one shared table.
//!
//! Entries are keyed by (actor type, actor id), created on the first
//! `enter` and removed as soon as their chain fully unwinds, so the table
//! only ever holds instances with calls in flight.
//!
//! The table is split into independently locked shards chosen by key hash.
//! Every operation on a key runs under that key's shard lock, which makes
//! the per-key token and depth one atomic unit and the operations on one
//! key linearizable. Keys in different shards never contend.

use crate::config::RegistryConfig;
use crate::error::{ReentrancyError, Result};
use crate::guard::RegistryGuard;
use crate::state::{ExitOutcome, ReentrancySnapshot, ReentrancyState};
use crate::table::{EntryTable, Handle, ReentrancyKey};
use core::fmt;
use core::hash::BuildHasher;
use parking_lot::Mutex;
use std::collections::hash_map::RandomState;

type Shard = Mutex<EntryTable<ReentrancyState>>;

/// Process-wide admission controller for many actor instances.
///
/// Construct one explicitly and share it (by reference or `Arc`) with the
/// dispatch layer.
///
/// As with [`ReentrancyStack`](crate::ReentrancyStack), `is_admissible` is a
/// hint only. `enter` is the admission decision, and a `Conflict` from it
/// ([`ReentrancyError::is_admission_denied`]) is the normal "queue and
/// retry" outcome.
pub struct ReentrancyRegistry<S = RandomState> {
    hasher: S,
    shards: Box<[Shard]>,
    mask: usize,
}

impl ReentrancyRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl Default for ReentrancyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> ReentrancyRegistry<S> {
    pub fn with_config_and_hasher(config: RegistryConfig, hasher: S) -> Self {
        let shards = (0..config.shard_count())
            .map(|_| Mutex::new(EntryTable::with_capacity(config.shard_capacity())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            hasher,
            mask: config.shard_count() - 1,
            shards,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn locate(&self, actor_type: &str, actor_id: &str) -> (u64, usize) {
        let hash = ReentrancyKey::hash_parts(&self.hasher, actor_type, actor_id);
        // High bits pick the shard; the table probes with the low bits.
        let shard = (hash >> 32) as usize & self.mask;
        (hash, shard)
    }

    /// Whether a call carrying `token` could be admitted to the instance
    /// right now. An instance with no entry is idle.
    pub fn is_admissible(&self, actor_type: &str, actor_id: &str, token: Option<&str>) -> bool {
        let (hash, shard) = self.locate(actor_type, actor_id);
        let table = self.shards[shard].lock();
        table
            .find(hash, actor_type, actor_id)
            .and_then(|h| table.get(h))
            .map_or(true, |state| state.is_admissible(token))
    }

    /// Admit one call and return the chain depth after admission.
    pub fn enter(&self, actor_type: &str, actor_id: &str, token: Option<&str>) -> Result<usize> {
        self.enter_at(actor_type, actor_id, token)
            .map(|(_, _, depth)| depth)
    }

    /// `enter` returning a guard that exits when dropped.
    pub fn try_enter(
        &self,
        actor_type: &str,
        actor_id: &str,
        token: Option<&str>,
    ) -> Result<RegistryGuard<'_, S>> {
        let (shard, handle, depth) = self.enter_at(actor_type, actor_id, token)?;
        Ok(RegistryGuard::new(self, shard, handle, token, depth))
    }

    fn enter_at(
        &self,
        actor_type: &str,
        actor_id: &str,
        token: Option<&str>,
    ) -> Result<(usize, Handle, usize)> {
        let (hash, shard) = self.locate(actor_type, actor_id);
        let mut table = self.shards[shard].lock();
        // Creation and first enter happen under one lock acquisition.
        let (handle, state, created) =
            table.find_or_insert_with(hash, actor_type, actor_id, ReentrancyState::new);
        match state.enter(token) {
            Ok(depth) => {
                tracing::trace!(actor_type, actor_id, ?token, depth, created, "reentrancy entered");
                Ok((shard, handle, depth))
            }
            Err(e) => {
                if state.is_idle() {
                    let _ = table.remove(handle);
                }
                tracing::debug!(actor_type, actor_id, ?token, error = %e, "reentrancy admission denied");
                Err(e)
            }
        }
    }

    /// Release one admitted call. Removes the entry when the chain fully
    /// unwinds. Exiting an instance with no entry is `Underflow`.
    pub fn exit(
        &self,
        actor_type: &str,
        actor_id: &str,
        token: Option<&str>,
    ) -> Result<ExitOutcome> {
        let (hash, shard) = self.locate(actor_type, actor_id);
        let mut table = self.shards[shard].lock();
        match table.find(hash, actor_type, actor_id) {
            Some(handle) => exit_entry(&mut table, handle, token),
            None => {
                let e = ReentrancyError::underflow(token);
                tracing::warn!(actor_type, actor_id, ?token, error = %e, "unpaired reentrancy exit");
                Err(e)
            }
        }
    }

    /// Exit through a handle captured at enter time.
    pub(crate) fn exit_handle(
        &self,
        shard: usize,
        handle: Handle,
        token: Option<&str>,
    ) -> Result<ExitOutcome> {
        let Some(lock) = self.shards.get(shard) else {
            return Err(ReentrancyError::underflow(token));
        };
        let mut table = lock.lock();
        if table.get(handle).is_none() {
            let e = ReentrancyError::underflow(token);
            tracing::warn!(?token, error = %e, "reentrancy guard outlived its entry");
            return Err(e);
        }
        exit_entry(&mut table, handle, token)
    }

    pub fn snapshot(&self, actor_type: &str, actor_id: &str) -> ReentrancySnapshot {
        let (hash, shard) = self.locate(actor_type, actor_id);
        let table = self.shards[shard].lock();
        table
            .find(hash, actor_type, actor_id)
            .and_then(|h| table.get(h))
            .map(ReentrancyState::snapshot)
            .unwrap_or_default()
    }

    pub fn depth(&self, actor_type: &str, actor_id: &str) -> usize {
        self.snapshot(actor_type, actor_id).depth()
    }

    /// Whether the instance has an entry, i.e. calls in flight.
    pub fn contains(&self, actor_type: &str, actor_id: &str) -> bool {
        let (hash, shard) = self.locate(actor_type, actor_id);
        self.shards[shard]
            .lock()
            .find(hash, actor_type, actor_id)
            .is_some()
    }

    /// Number of instances with calls in flight. Shards are read one at a
    /// time, so under concurrent use the total is approximate.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }
}

fn exit_entry(
    table: &mut EntryTable<ReentrancyState>,
    handle: Handle,
    token: Option<&str>,
) -> Result<ExitOutcome> {
    let res = match table.get_mut(handle) {
        Some(state) => state.exit(token),
        None => Err(ReentrancyError::underflow(token)),
    };
    let (actor_type, actor_id) = table
        .key(handle)
        .map_or(("", ""), |k| (k.actor_type(), k.actor_id()));
    match &res {
        Ok(ExitOutcome::Nested { depth }) => {
            tracing::trace!(actor_type, actor_id, ?token, depth, "reentrancy exited");
        }
        Ok(ExitOutcome::Released) => {
            tracing::debug!(actor_type, actor_id, ?token, "reentrancy chain released");
        }
        Err(e) => {
            tracing::warn!(actor_type, actor_id, ?token, error = %e, "unpaired reentrancy exit");
        }
    }
    if res.as_ref().map_or(false, ExitOutcome::is_released) {
        let _ = table.remove(handle);
    }
    res
}

impl<S> fmt::Debug for ReentrancyRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrancyRegistry")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Transition;
    use proptest::prelude::*;

    fn small() -> ReentrancyRegistry {
        ReentrancyRegistry::with_config(RegistryConfig::new().with_shard_count(2))
    }

    #[test]
    fn absent_entry_is_idle() {
        let r = small();
        assert!(r.is_admissible("DemoActor", "1", None));
        assert!(r.is_admissible("DemoActor", "1", Some("t")));
        assert_eq!(r.snapshot("DemoActor", "1"), ReentrancySnapshot::Idle);
        assert!(r.is_empty());
    }

    #[test]
    fn entry_created_on_enter_and_removed_on_release() {
        let r = small();
        assert_eq!(r.enter("DemoActor", "1", Some("t")).unwrap(), 1);
        assert!(r.contains("DemoActor", "1"));
        assert_eq!(r.len(), 1);
        assert_eq!(r.exit("DemoActor", "1", Some("t")).unwrap(), ExitOutcome::Released);
        assert!(!r.contains("DemoActor", "1"));
        assert!(r.is_empty());
    }

    #[test]
    fn exit_without_entry_underflows() {
        let r = small();
        assert_eq!(
            r.exit("DemoActor", "1", None).unwrap_err(),
            ReentrancyError::Underflow { requested: None }
        );
        assert!(r.is_empty());
    }

    #[test]
    fn mismatched_exit_leaves_entry_and_depth() {
        let r = small();
        r.enter("DemoActor", "1", Some("t1")).unwrap();
        let err = r.exit("DemoActor", "1", Some("t2")).unwrap_err();
        assert!(matches!(
            err,
            ReentrancyError::Conflict {
                during: Transition::Exit,
                ..
            }
        ));
        assert_eq!(r.depth("DemoActor", "1"), 1);
        assert!(r.contains("DemoActor", "1"));
    }

    #[test]
    fn guard_release_after_raw_exit_reports_underflow() {
        let r = small();
        let g = r.try_enter("DemoActor", "1", Some("t")).unwrap();
        // Unpaired raw exit steals the guard's admission.
        r.exit("DemoActor", "1", Some("t")).unwrap();
        // A new chain recreates the entry under a fresh handle.
        r.enter("DemoActor", "1", Some("u")).unwrap();
        assert!(matches!(g.release(), Err(ReentrancyError::Underflow { .. })));
        assert_eq!(r.depth("DemoActor", "1"), 1);
    }

    #[test]
    fn single_shard_registry_keeps_keys_apart() {
        let r = ReentrancyRegistry::with_config(RegistryConfig::new().with_shard_count(1));
        r.enter("A", "1", Some("x")).unwrap();
        r.enter("A", "2", None).unwrap();
        r.enter("B", "1", Some("y")).unwrap();
        assert_eq!(r.len(), 3);
        assert!(!r.is_admissible("A", "1", Some("y")));
        assert!(r.is_admissible("B", "1", Some("y")));
        r.exit("A", "2", None).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.depth("A", "1"), 1);
        assert_eq!(r.depth("B", "1"), 1);
    }

    // Registry liveness against a per-key model of (holder, depth).
    //
    // Invariants exercised after every step:
    // - contains(key) iff the model depth for key is > 0;
    // - len() equals the number of keys with depth > 0;
    // - enter/exit results agree with the model.
    proptest! {
        #[test]
        fn prop_registry_liveness(keys in 1usize..=4, ops in proptest::collection::vec((0u8..=1u8, 0usize..100usize, 0u8..=2u8), 1..150)) {
            let r = ReentrancyRegistry::with_config(RegistryConfig::new().with_shard_count(2));
            let mut model: Vec<(Option<Option<u8>>, usize)> = vec![(None, 0); keys];

            for (op, raw_k, t) in ops {
                let k = raw_k % keys;
                let id = k.to_string();
                let tok = if t == 0 { None } else { Some(format!("chain-{}", t)) };
                let req = tok.as_deref();
                let want = if t == 0 { None } else { Some(t) };
                let (holder, depth) = model[k];
                match op {
                    0 => {
                        let admissible = match holder {
                            None => true,
                            Some(Some(h)) => want == Some(h),
                            Some(None) => false,
                        };
                        let res = r.enter("Model", &id, req);
                        if admissible {
                            prop_assert_eq!(res, Ok(depth + 1));
                            model[k] = (Some(holder.unwrap_or(want)), depth + 1);
                        } else {
                            prop_assert!(res.unwrap_err().is_admission_denied());
                        }
                    }
                    1 => {
                        let res = r.exit("Model", &id, req);
                        match holder {
                            None => prop_assert!(matches!(res, Err(ReentrancyError::Underflow { .. })), "expected Underflow, got {:?}", res),
                            Some(h) if h != want => prop_assert!(res.is_err()),
                            Some(_) => {
                                let left = depth - 1;
                                prop_assert_eq!(res.map(|o| o.depth()), Ok(left));
                                model[k] = (if left == 0 { None } else { holder }, left);
                            }
                        }
                    }
                    _ => unreachable!(),
                }

                let live = model.iter().filter(|(_, d)| *d > 0).count();
                prop_assert_eq!(r.len(), live);
                for (i, (_, d)) in model.iter().enumerate() {
                    prop_assert_eq!(r.contains("Model", &i.to_string()), *d > 0);
                    prop_assert_eq!(r.depth("Model", &i.to_string()), *d);
                }
            }
        }
    }
}
