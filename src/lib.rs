//! actor-reentrancy: admission control for turn-based actor instances.
//!
//! An actor instance runs one logical call at a time. A call chain that
//! re-enters an instance it is already running in (A calls B, B calls back
//! into A) must be let through, or the chain deadlocks on itself; any other
//! call must wait until that chain unwinds. Calls of one chain carry the same
//! opaque reentrancy token, and this crate decides admission from it.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one state machine, reused at two scopes, with all mutation going
//!   through `enter`/`exit` under a short critical section.
//! - Layers:
//!   - `DepthCount` and `ReentrancyToken`: the nesting counter and the owned
//!     chain token.
//!   - `ReentrancyState`: the `Idle` / `Active(token, depth)` machine. Plain
//!     value, no locking.
//!   - `EntryTable`: keyed storage with generational handles; entries store
//!     their hash and the table never hashes keys itself.
//!   - `ReentrancyStack`: one state machine behind a lock, owned by one
//!     actor instance.
//!   - `ReentrancyRegistry`: sharded `EntryTable`s of state machines keyed by
//!     (actor type, actor id); entries exist only while calls are in flight.
//!
//! Admission rules
//! - Idle admits any call, with or without a token, and starts a chain.
//! - An active chain admits only a present token equal to its own; each
//!   admitted call nests one level deeper.
//! - A chain started without a token cannot nest; a second tokenless call
//!   conflicts like any other.
//! - `exit` must carry the chain's token (or none for a tokenless chain).
//!   Exiting an idle instance is `Underflow`; a foreign token is `Conflict`.
//!   Failed operations never change state.
//!
//! Using `is_admissible` and `enter`
//! - `is_admissible` is a pure query; a later `enter` can still lose a race
//!   to another caller. `enter` is the admission decision. Dispatchers either
//!   call `enter` directly or use `is_admissible` as a fast path, and in both
//!   cases treat a `Conflict` from `enter`
//!   ([`ReentrancyError::is_admission_denied`]) as "park and retry after the
//!   next [`ExitOutcome::Released`]". All other errors are enter/exit pairing
//!   bugs.
//! - Every successful `enter` needs exactly one `exit`, on every path. The
//!   `try_enter` guards do this on drop, which also covers unwinding and
//!   cancelled futures.
//!
//! Concurrency
//! - No threads, no waiting, no I/O. Each operation takes one lock (the
//!   stack's, or the key's shard) and returns immediately.
//! - Token and depth of one instance change together under that lock, so
//!   operations on one key are linearizable; keys never affect each other.
//!
//! Notes and non-goals
//! - No actor lifecycle, method dispatch, or token transport.
//! - No singleton: construct a registry and hand it to the dispatcher.
//! - Depth overflow aborts, matching `Rc` strong-count overflow.

mod config;
mod depth;
mod error;
mod guard;
mod registry;
mod stack;
mod state;
mod table;
mod token;

// Public surface
pub use config::{RegistryConfig, MAX_SHARDS};
pub use error::{ReentrancyError, Result, Transition};
pub use guard::{RegistryGuard, StackGuard};
pub use registry::ReentrancyRegistry;
pub use stack::ReentrancyStack;
pub use state::{ExitOutcome, ReentrancySnapshot};
pub use token::ReentrancyToken;
