//! Minimal turn-based dispatcher on top of `ReentrancyRegistry`.
//!
//! `Ping` on actor A calls `Pong` on actor B, which calls back into A with
//! the same chain token and is admitted reentrantly. While the chain is in
//! flight, an unrelated tokenless call to A arrives; it is parked and runs
//! once the chain releases A.
//!
//! Run with `RUST_LOG=actor_reentrancy=trace cargo run --example turn_dispatch`.

use actor_reentrancy::{ExitOutcome, ReentrancyError, ReentrancyRegistry};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct Call {
    actor_type: &'static str,
    actor_id: &'static str,
    method: &'static str,
    token: Option<String>,
}

struct Dispatcher {
    registry: Arc<ReentrancyRegistry>,
    parked: VecDeque<Call>,
}

impl Dispatcher {
    fn new(registry: Arc<ReentrancyRegistry>) -> Self {
        Self {
            registry,
            parked: VecDeque::new(),
        }
    }

    fn dispatch(&mut self, call: Call) -> Result<(), ReentrancyError> {
        let token = call.token.as_deref();
        let depth = match self.registry.enter(call.actor_type, call.actor_id, token) {
            Ok(depth) => depth,
            Err(e) if e.is_admission_denied() => {
                tracing::info!(?call, "instance busy, parking call");
                self.parked.push_back(call);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            actor = call.actor_id,
            method = call.method,
            depth,
            "running actor method"
        );
        let body = self.run_body(&call);

        // Exit on every path, whatever the body returned.
        let outcome = self.registry.exit(call.actor_type, call.actor_id, token)?;
        body?;
        if outcome == ExitOutcome::Released {
            self.retry_parked(call.actor_type, call.actor_id)?;
        }
        Ok(())
    }

    fn run_body(&mut self, call: &Call) -> Result<(), ReentrancyError> {
        match (call.actor_id, call.method) {
            ("A", "ping") => self.dispatch(Call {
                actor_type: "DemoActor",
                actor_id: "B",
                method: "pong",
                token: call.token.clone(),
            }),
            ("B", "pong") => {
                // Unrelated caller arrives while the chain holds A.
                self.dispatch(Call {
                    actor_type: "DemoActor",
                    actor_id: "A",
                    method: "status",
                    token: None,
                })?;
                // Same chain calls back into A: admitted reentrantly.
                self.dispatch(Call {
                    actor_type: "DemoActor",
                    actor_id: "A",
                    method: "callback",
                    token: call.token.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn retry_parked(&mut self, actor_type: &str, actor_id: &str) -> Result<(), ReentrancyError> {
        let (ready, waiting): (VecDeque<_>, VecDeque<_>) = self
            .parked
            .drain(..)
            .partition(|c| c.actor_type == actor_type && c.actor_id == actor_id);
        self.parked = waiting;
        for call in ready {
            self.dispatch(call)?;
        }
        Ok(())
    }
}

fn main() -> Result<(), ReentrancyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(ReentrancyRegistry::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&registry));

    dispatcher.dispatch(Call {
        actor_type: "DemoActor",
        actor_id: "A",
        method: "ping",
        token: Some("chain-42".to_string()),
    })?;

    assert!(dispatcher.parked.is_empty());
    assert!(registry.is_empty());
    tracing::info!("all calls completed; registry empty");
    Ok(())
}
