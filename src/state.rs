//! Single-instance reentrancy state machine.
//!
//! States are `Idle` and `Active(token, depth >= 1)`. A chain started
//! without a token (a non-reentrant call) is `Active(None, 1)` and can never
//! nest: only a present token equal to the holder's may recurse.
//!
//! `ReentrancyState` is a plain value with no interior mutability. The
//! stack and the registry own it behind a lock so that token and depth
//! always change together.

use crate::depth::DepthCount;
use crate::error::{ReentrancyError, Result, Transition};
use crate::token::ReentrancyToken;

#[derive(Debug, Default)]
pub(crate) enum ReentrancyState {
    #[default]
    Idle,
    Active {
        token: Option<ReentrancyToken>,
        depth: DepthCount,
    },
}

/// Result of a successful `exit`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExitOutcome {
    /// Calls of the chain are still in flight at `depth`.
    Nested { depth: usize },
    /// The chain fully unwound; the instance is idle again and parked calls
    /// may retry `enter`.
    Released,
}

impl ExitOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, ExitOutcome::Released)
    }

    /// Depth remaining after the exit (zero once released).
    pub fn depth(&self) -> usize {
        match self {
            ExitOutcome::Nested { depth } => *depth,
            ExitOutcome::Released => 0,
        }
    }
}

/// Point-in-time copy of an instance's reentrancy state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ReentrancySnapshot {
    #[default]
    Idle,
    Active {
        token: Option<ReentrancyToken>,
        depth: usize,
    },
}

impl ReentrancySnapshot {
    pub fn is_idle(&self) -> bool {
        matches!(self, ReentrancySnapshot::Idle)
    }

    pub fn depth(&self) -> usize {
        match self {
            ReentrancySnapshot::Idle => 0,
            ReentrancySnapshot::Active { depth, .. } => *depth,
        }
    }

    pub fn token(&self) -> Option<&ReentrancyToken> {
        match self {
            ReentrancySnapshot::Idle => None,
            ReentrancySnapshot::Active { token, .. } => token.as_ref(),
        }
    }
}

impl ReentrancyState {
    pub(crate) const fn new() -> Self {
        ReentrancyState::Idle
    }

    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, ReentrancyState::Idle)
    }

    pub(crate) fn depth(&self) -> usize {
        match self {
            ReentrancyState::Idle => 0,
            ReentrancyState::Active { depth, .. } => depth.get(),
        }
    }

    pub(crate) fn snapshot(&self) -> ReentrancySnapshot {
        match self {
            ReentrancyState::Idle => ReentrancySnapshot::Idle,
            ReentrancyState::Active { token, depth } => ReentrancySnapshot::Active {
                token: token.clone(),
                depth: depth.get(),
            },
        }
    }

    /// Pure admission query. Idle admits anything; an active chain admits
    /// only a present token equal to its own.
    pub(crate) fn is_admissible(&self, request: Option<&str>) -> bool {
        match (self, request) {
            (ReentrancyState::Idle, _) => true,
            (
                ReentrancyState::Active {
                    token: Some(held), ..
                },
                Some(req),
            ) => held.as_str() == req,
            _ => false,
        }
    }

    /// Admit one call. Returns the depth after admission.
    pub(crate) fn enter(&mut self, request: Option<&str>) -> Result<usize> {
        match self {
            ReentrancyState::Idle => {
                let mut depth = DepthCount::new();
                let n = depth.increment();
                *self = ReentrancyState::Active {
                    token: request.map(ReentrancyToken::from),
                    depth,
                };
                Ok(n)
            }
            ReentrancyState::Active {
                token: Some(held),
                depth,
            } if request == Some(held.as_str()) => Ok(depth.increment()),
            ReentrancyState::Active { token, .. } => Err(ReentrancyError::conflict(
                token.as_ref().map(ReentrancyToken::as_str),
                request,
                Transition::Enter,
            )),
        }
    }

    /// Release one admitted call. The request must carry the holder's token,
    /// or no token when the holder has none.
    pub(crate) fn exit(&mut self, request: Option<&str>) -> Result<ExitOutcome> {
        let (token, depth) = match self {
            ReentrancyState::Idle => return Err(ReentrancyError::underflow(request)),
            ReentrancyState::Active { token, depth } => (token, depth),
        };
        if token.as_ref().map(ReentrancyToken::as_str) != request {
            return Err(ReentrancyError::conflict(
                token.as_ref().map(ReentrancyToken::as_str),
                request,
                Transition::Exit,
            ));
        }
        match depth.decrement() {
            Some(false) => Ok(ExitOutcome::Nested { depth: depth.get() }),
            Some(true) => {
                *self = ReentrancyState::Idle;
                Ok(ExitOutcome::Released)
            }
            // An Active state never holds depth zero; treat it as unmatched.
            None => {
                *self = ReentrancyState::Idle;
                Err(ReentrancyError::underflow(request))
            }
        }
    }
}
