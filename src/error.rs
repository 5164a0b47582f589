//! Error kinds returned by the admission controller.
//!
//! Both kinds are contract violations by the caller. The single expected,
//! recoverable case is a `Conflict` returned from `enter`: the instance is
//! held by another chain and the call should be parked and retried. See
//! [`ReentrancyError::is_admission_denied`].

use core::fmt;
use thiserror::Error;

/// Which operation detected the error.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Transition {
    Enter,
    Exit,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Enter => f.write_str("enter"),
            Transition::Exit => f.write_str("exit"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ReentrancyError {
    /// The request does not belong to the chain currently holding the instance.
    #[error("reentrancy conflict on {during}: held by {}, requested by {}", show(.held), show(.requested))]
    Conflict {
        held: Option<String>,
        requested: Option<String>,
        during: Transition,
    },

    /// `exit` without a matching `enter`.
    #[error("exit without matching enter (token {})", show(.requested))]
    Underflow { requested: Option<String> },
}

impl ReentrancyError {
    /// True when `enter` was refused because another chain holds the
    /// instance. The caller may queue the call and retry after the holder
    /// releases; every other error is an enter/exit pairing bug.
    pub fn is_admission_denied(&self) -> bool {
        matches!(
            self,
            ReentrancyError::Conflict {
                during: Transition::Enter,
                ..
            }
        )
    }

    pub(crate) fn conflict(
        held: Option<&str>,
        requested: Option<&str>,
        during: Transition,
    ) -> Self {
        ReentrancyError::Conflict {
            held: held.map(str::to_owned),
            requested: requested.map(str::to_owned),
            during,
        }
    }

    pub(crate) fn underflow(requested: Option<&str>) -> Self {
        ReentrancyError::Underflow {
            requested: requested.map(str::to_owned),
        }
    }
}

fn show(token: &Option<String>) -> &str {
    token.as_deref().unwrap_or("<none>")
}

pub type Result<T, E = ReentrancyError> = core::result::Result<T, E>;
