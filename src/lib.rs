//! # Connect-4 Championship
//!
//! A modular Rust crate for running automated round-robin Connect-4
//! championships between remote AI agents.
//!
//! It provides:
//! - The championship controller and lifecycle (`Championship`)
//! - Round-robin scheduling with a bounded pool of concurrent matches
//! - Four-game matches with first-move and color rotation, per-turn
//!   deadlines and per-match time banks
//! - A durable leaderboard and schedule behind a key/value store seam
//! - Topic-based event broadcasting for dashboards and match spectators
//!
//! Each agent is a remote HTTP service: the coordinator POSTs the board
//! and the agent answers with a column. Rule violations, malformed
//! replies, transport failures and deadline overruns all forfeit the game
//! at hand and never disturb the rest of the tournament.
//!
//! # Documentation Overview
//!
//! - For the controller operations (register, start, status, reset), see
//!   [`Championship`](crate::championship::Championship).
//! - For time budgets, see [`TimeControl`](crate::time_control::TimeControl).
//! - For the agent wire protocol and its failure taxonomy, see the
//!   [`agent_client`] module.
//! - For spectator feeds, see [`events`] and [`broadcast`].
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use c4_championship::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new().with_max_parallel(5);
//!     let time = TimeControlBuilder::new()
//!         .with_per_turn_cap(Duration::from_secs(10))
//!         .with_match_bank(Duration::from_secs(240))
//!         .build()?;
//!
//!     let championship = Championship::new(config, time);
//!     championship
//!         .register("alpha", "http://10.0.0.1:8000/move")
//!         .await?;
//!     championship
//!         .register("beta", "http://10.0.0.2:8000/move")
//!         .await?;
//!     championship.start().await?;
//!
//!     // Watch the dashboard until the tournament is done.
//!     let mut dashboard = championship.subscribe_dashboard().await?;
//!     while let Some(note) = dashboard.recv().await {
//!         println!("{note:?}");
//!     }
//!
//!     for entry in championship.leaderboard().await? {
//!         println!("{}: {} pts", entry.display_name, entry.points);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Agent Protocol
//!
//! An agent is any HTTP service answering move requests:
//!
//! - Request: `POST <endpoint>` with JSON body
//!   `{"board": int[6][7], "current_player": 1|2, "valid_moves": int[]}`.
//!   Cell values are `0` (empty), `1` (first mover) and `2`; row 0 is the
//!   top of the grid.
//! - Response: `2xx` with JSON `{"move": int}` naming a column in `0..=6`.
//!
//! The deadline is communicated only through the socket: an agent that
//! has not answered in time has lost the turn, whatever it sends later.
#![warn(missing_docs)]

pub mod agent_client;
pub mod board;
pub mod broadcast;
pub mod championship;
pub mod configuration;
pub mod events;
mod game_driver;
mod logger;
mod match_runner;
pub mod record;
pub mod schedule;
mod scheduler;
pub mod store;
pub mod team;
pub mod time_control;

pub use anyhow;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use c4_championship::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent_client::{AgentClient, AgentTransport};
    pub use crate::championship::{Championship, OperatorError, StatusReport};
    pub use crate::configuration::Configuration;
    pub use crate::record::Phase;
    pub use crate::time_control::{TimeControl, TimeControlBuilder};
}
