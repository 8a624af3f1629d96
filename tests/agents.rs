//! Scripted agent transports used by the end-to-end tests.
//!
//! A `FakeNetwork` routes move requests by endpoint URL to a scripted
//! behavior, so whole championships run without sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use c4_championship::agent_client::{AgentFailure, AgentTransport, MoveRequest};
use tokio::sync::watch;

/// How a fake endpoint answers move requests.
pub enum Behavior {
    /// Play column 3 while it is open, then the leftmost legal column.
    CenterThenLeft,
    /// Sleep, then play like `CenterThenLeft`.
    SleepThen(Duration),
    /// Always return this column, legal or not.
    Fixed(i64),
    /// Connection refused.
    Unreachable,
    /// Park every request until the watch flips to `true`, then play like
    /// `CenterThenLeft`.
    Gate(watch::Receiver<bool>),
}

pub struct FakeNetwork {
    routes: HashMap<String, Behavior>,
}

impl FakeNetwork {
    pub fn new() -> FakeNetwork {
        FakeNetwork {
            routes: HashMap::new(),
        }
    }

    pub fn route(mut self, endpoint: &str, behavior: Behavior) -> FakeNetwork {
        self.routes.insert(endpoint.to_owned(), behavior);
        self
    }

    pub fn into_transport(self) -> Arc<dyn AgentTransport> {
        Arc::new(self)
    }
}

fn center_then_left(request: &MoveRequest) -> i64 {
    if request.valid_moves.contains(&3) {
        3
    } else {
        request.valid_moves.first().copied().unwrap_or(0) as i64
    }
}

#[async_trait]
impl AgentTransport for FakeNetwork {
    async fn request_move(
        &self,
        endpoint: &str,
        request: MoveRequest,
        _deadline: Duration,
    ) -> Result<i64, AgentFailure> {
        let Some(behavior) = self.routes.get(endpoint) else {
            return Err(AgentFailure::Transport(format!("no route to {endpoint}")));
        };
        match behavior {
            Behavior::CenterThenLeft => Ok(center_then_left(&request)),
            Behavior::SleepThen(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(center_then_left(&request))
            }
            Behavior::Fixed(column) => Ok(*column),
            Behavior::Unreachable => {
                Err(AgentFailure::Transport("connection refused".to_owned()))
            }
            Behavior::Gate(ready) => {
                let mut ready = ready.clone();
                if ready.wait_for(|open| *open).await.is_err() {
                    return Err(AgentFailure::Transport("gate dropped".to_owned()));
                }
                Ok(center_then_left(&request))
            }
        }
    }
}
