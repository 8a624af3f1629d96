//! Remote agent calls: the move-selection wire protocol.
//!
//! A move request is a `POST` of `{"board", "current_player",
//! "valid_moves"}` to the team's endpoint; the agent answers `2xx` with
//! `{"move": <column>}`. Anything else is one of four typed failures, and
//! a single failure decides the turn: the remote call is treated as an
//! adversarial action, so there are no retries.
//!
//! The [`AgentTransport`] trait is the seam between the protocol and the
//! network. Production uses [`HttpTransport`]; tests plug in scripted
//! transports to play whole championships without sockets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, Player, COLS, ROWS};

/// Ways a move request can fail, ordered: the first matching kind wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentFailure {
    /// No full response within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// Connection refused, TLS error or non-2xx status.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The response was not a parseable `{"move": int}`.
    #[error("malformed reply: {0}")]
    Malformed(String),
    /// The returned column is out of range or not currently playable.
    #[error("illegal column {0}")]
    Illegal(i64),
}

/// Body of a move request, as serialized on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct MoveRequest {
    /// Cells of the grid, row 0 on top.
    pub board: [[u8; COLS]; ROWS],
    /// Player number of the side to move, `1` or `2`.
    pub current_player: u8,
    /// Columns currently playable.
    pub valid_moves: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct MoveReply {
    #[serde(rename = "move")]
    column: i64,
}

/// Carries a move request to an agent and returns the raw picked column.
///
/// Implementations decide transport-level failures (`Timeout`,
/// `Transport`, `Malformed`); legality of the returned column is judged by
/// [`AgentClient`], never by the transport.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Sends `request` to `endpoint` and returns the agent's column.
    async fn request_move(
        &self,
        endpoint: &str,
        request: MoveRequest,
        deadline: Duration,
    ) -> Result<i64, AgentFailure>;
}

/// JSON-over-HTTP transport backed by a shared [`reqwest::Client`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    pub fn new() -> HttpTransport {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn request_move(
        &self,
        endpoint: &str,
        request: MoveRequest,
        deadline: Duration,
    ) -> Result<i64, AgentFailure> {
        let response = self
            .client
            .post(endpoint)
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentFailure::Timeout(deadline)
                } else {
                    AgentFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentFailure::Transport(format!("status {status}")));
        }

        let reply: MoveReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AgentFailure::Timeout(deadline)
            } else {
                AgentFailure::Malformed(e.to_string())
            }
        })?;
        Ok(reply.column)
    }
}

/// Validated move requests against a team's agent.
#[derive(Clone)]
pub struct AgentClient {
    transport: Arc<dyn AgentTransport>,
}

impl AgentClient {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn AgentTransport>) -> AgentClient {
        AgentClient { transport }
    }

    /// A client speaking the production HTTP protocol.
    pub fn http() -> AgentClient {
        AgentClient::new(Arc::new(HttpTransport::new()))
    }

    /// Requests a move and validates it against the board.
    ///
    /// The wall-clock deadline bounds the whole exchange whatever the
    /// transport does; a reply arriving after it is a [`AgentFailure::Timeout`].
    ///
    /// # Errors
    /// One of the [`AgentFailure`] kinds; the caller turns any of them into
    /// a forfeit.
    pub async fn request_move(
        &self,
        endpoint: &str,
        board: &Board,
        player: Player,
        deadline: Duration,
    ) -> Result<u8, AgentFailure> {
        let request = MoveRequest {
            board: *board.cells(),
            current_player: player.cell(),
            valid_moves: board.legal_moves().collect(),
        };
        let call = self.transport.request_move(endpoint, request, deadline);
        let raw = match tokio::time::timeout(deadline, call).await {
            Ok(result) => result?,
            Err(_) => return Err(AgentFailure::Timeout(deadline)),
        };
        if raw < 0 || raw >= COLS as i64 || !board.is_playable(raw as u8) {
            return Err(AgentFailure::Illegal(raw));
        }
        Ok(raw as u8)
    }

    /// Reachability check used during the match setup window.
    ///
    /// Sends an opening-board request; any reply, even a malformed or
    /// illegal one, proves the endpoint is alive. The reply itself is
    /// discarded.
    pub async fn probe(&self, endpoint: &str, deadline: Duration) -> bool {
        let board = Board::new();
        let request = MoveRequest {
            board: *board.cells(),
            current_player: Player::One.cell(),
            valid_moves: board.legal_moves().collect(),
        };
        let call = self.transport.request_move(endpoint, request, deadline);
        match tokio::time::timeout(deadline, call).await {
            Err(_) => false,
            Ok(Err(AgentFailure::Timeout(_) | AgentFailure::Transport(_))) => false,
            Ok(_) => true,
        }
    }
}

#[cfg(test)]
mod agent_client_tests {
    use super::*;

    struct Scripted {
        column: i64,
        delay: Duration,
    }

    #[async_trait]
    impl AgentTransport for Scripted {
        async fn request_move(
            &self,
            _endpoint: &str,
            _request: MoveRequest,
            _deadline: Duration,
        ) -> Result<i64, AgentFailure> {
            tokio::time::sleep(self.delay).await;
            Ok(self.column)
        }
    }

    fn client(column: i64, delay: Duration) -> AgentClient {
        AgentClient::new(Arc::new(Scripted { column, delay }))
    }

    #[tokio::test(start_paused = true)]
    async fn reply_on_the_last_millisecond_succeeds() {
        let deadline = Duration::from_secs(10);
        let client = client(3, deadline - Duration::from_millis(1));
        let board = Board::new();
        let col = client
            .request_move("http://a", &board, Player::One, deadline)
            .await
            .unwrap();
        assert_eq!(col, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_one_millisecond_late_is_a_timeout() {
        let deadline = Duration::from_secs(10);
        let client = client(3, deadline + Duration::from_millis(1));
        let board = Board::new();
        let failure = client
            .request_move("http://a", &board, Player::One, deadline)
            .await
            .unwrap_err();
        assert_eq!(failure, AgentFailure::Timeout(deadline));
    }

    #[tokio::test]
    async fn out_of_range_column_is_illegal() {
        let client = client(7, Duration::ZERO);
        let board = Board::new();
        let failure = client
            .request_move("http://a", &board, Player::One, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(failure, AgentFailure::Illegal(7));
    }

    #[tokio::test]
    async fn full_column_is_illegal() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.apply(2, Player::One).unwrap();
            board.apply(2, Player::Two).unwrap();
        }
        let client = client(2, Duration::ZERO);
        let failure = client
            .request_move("http://a", &board, Player::One, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(failure, AgentFailure::Illegal(2));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_counts_any_reply_as_reachable() {
        // An illegal column still proves the endpoint is alive.
        let client = client(42, Duration::from_millis(5));
        assert!(client.probe("http://a", Duration::from_secs(30)).await);

        let dead = client_failing(AgentFailure::Transport("refused".into()));
        assert!(!dead.probe("http://a", Duration::from_secs(30)).await);
    }

    struct Failing(AgentFailure);

    #[async_trait]
    impl AgentTransport for Failing {
        async fn request_move(
            &self,
            _endpoint: &str,
            _request: MoveRequest,
            _deadline: Duration,
        ) -> Result<i64, AgentFailure> {
            Err(self.0.clone())
        }
    }

    fn client_failing(failure: AgentFailure) -> AgentClient {
        AgentClient::new(Arc::new(Failing(failure)))
    }
}
