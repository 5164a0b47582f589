//! ReentrancyStack: the state machine scoped to one actor instance.
//!
//! Embed one per actor instance. The state lives as long as the stack and
//! returns to idle between chains; it is never dropped on its own.

use crate::error::Result;
use crate::guard::StackGuard;
use crate::state::{ExitOutcome, ReentrancySnapshot, ReentrancyState};
use parking_lot::{const_mutex, Mutex};

/// Admission tracker for a single actor instance.
///
/// `is_admissible` followed by `enter` is not atomic: another caller may
/// enter in between. `enter` is the admission decision; a `Conflict` from
/// it (see [`ReentrancyError::is_admission_denied`]) means "park the call
/// and retry after the holder releases", even if `is_admissible` said yes.
///
/// [`ReentrancyError::is_admission_denied`]: crate::ReentrancyError::is_admission_denied
#[derive(Debug, Default)]
pub struct ReentrancyStack {
    state: Mutex<ReentrancyState>,
}

impl ReentrancyStack {
    pub const fn new() -> Self {
        Self {
            state: const_mutex(ReentrancyState::new()),
        }
    }

    /// Whether a call carrying `token` could be admitted right now.
    pub fn is_admissible(&self, token: Option<&str>) -> bool {
        self.state.lock().is_admissible(token)
    }

    /// Admit one call and return the chain depth after admission.
    pub fn enter(&self, token: Option<&str>) -> Result<usize> {
        let res = self.state.lock().enter(token);
        match &res {
            Ok(depth) => tracing::trace!(?token, depth, "reentrancy stack entered"),
            Err(e) => tracing::debug!(?token, error = %e, "reentrancy stack admission denied"),
        }
        res
    }

    /// Release one admitted call. Must be paired with every successful
    /// `enter` on all paths, including errors and cancellation.
    pub fn exit(&self, token: Option<&str>) -> Result<ExitOutcome> {
        let res = self.state.lock().exit(token);
        match &res {
            Ok(ExitOutcome::Released) => tracing::debug!(?token, "reentrancy chain released"),
            Ok(ExitOutcome::Nested { depth }) => {
                tracing::trace!(?token, depth, "reentrancy stack exited")
            }
            Err(e) => tracing::warn!(?token, error = %e, "unpaired reentrancy exit"),
        }
        res
    }

    /// `enter` returning a guard that exits when dropped.
    pub fn try_enter(&self, token: Option<&str>) -> Result<StackGuard<'_>> {
        let depth = self.enter(token)?;
        Ok(StackGuard::new(self, token, depth))
    }

    pub fn snapshot(&self) -> ReentrancySnapshot {
        self.state.lock().snapshot()
    }

    pub fn depth(&self) -> usize {
        self.state.lock().depth()
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }
}
