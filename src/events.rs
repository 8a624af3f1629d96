//! Events delivered to spectators.
//!
//! Two topic families exist: the single `dashboard` topic carrying
//! tournament-level updates, and one `match:<match_id>` topic per match
//! carrying the live game feed. Every event is a tagged variant so the
//! outer transport can frame it as `{"type": ..., ...}` JSON without any
//! string dispatch.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::board::Board;
use crate::broadcast::{Broadcaster, Subscription};
use crate::record::{
    Color, GameEndReason, GameOutcome, LeaderboardEntry, MatchRecord, Phase, Slot,
};
use crate::store::Snapshot;
use crate::team::TeamId;

/// Name of the dashboard topic.
pub const DASHBOARD_TOPIC: &str = "dashboard";

/// Topic name of a match feed.
pub fn match_topic(match_id: Uuid) -> String {
    format!("match:{match_id}")
}

/// Tournament-level events, broadcast on the dashboard topic.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Full state snapshot, sent to every new dashboard subscriber.
    InitialState {
        /// Current state of the whole championship.
        snapshot: Snapshot,
    },
    /// The championship phase or round counters changed.
    StatusUpdate {
        /// Current phase.
        status: Phase,
        /// Registered team count.
        team_count: usize,
        /// Zero-based round currently playing (or about to).
        current_round: u32,
        /// Total rounds of the schedule, 0 before the schedule exists.
        total_rounds: u32,
    },
    /// A round began.
    RoundStart {
        /// Zero-based round index.
        round: u32,
    },
    /// Every non-bye match of the round is terminal.
    RoundComplete {
        /// Zero-based round index.
        round: u32,
    },
    /// A match record changed (status, a sealed game, final points).
    MatchUpdate {
        /// The updated record.
        record: MatchRecord,
    },
    /// Standings recomputed after a match sealed.
    LeaderboardUpdate {
        /// Entries in display order.
        entries: Vec<LeaderboardEntry>,
    },
}

/// An event on a match topic. Carries its match id so merged feeds stay
/// attributable.
#[derive(Debug, Clone, Serialize)]
pub struct MatchEvent {
    /// The match this event belongs to.
    pub match_id: Uuid,
    /// What happened.
    #[serde(flatten)]
    pub kind: MatchEventKind,
}

/// Per-match event payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEventKind {
    /// Match header, sent to every new subscriber of the topic.
    ChampionshipMatchInfo {
        /// Current record of the match.
        record: MatchRecord,
        /// Display name of slot A's team.
        team_a_name: String,
        /// Display name of slot B's team.
        team_b_name: String,
    },
    /// Setup of the current (or next) game.
    GameInfo {
        /// Game position in the match, 1 to 4.
        game_index: u8,
        /// Slot moving first.
        first_mover: Slot,
        /// Disc color of slot A.
        color_a: Color,
        /// Disc color of slot B.
        color_b: Color,
    },
    /// A game began.
    GameStart {
        /// Game position in the match.
        game_index: u8,
    },
    /// Board state after a move was applied.
    GameUpdate {
        /// Game position in the match.
        game_index: u8,
        /// Grid after the latest move.
        board: Board,
        /// Moves played so far in the game.
        move_count: u32,
    },
    /// A move was accepted.
    MoveMade {
        /// Game position in the match.
        game_index: u8,
        /// Zero-based move position within the game.
        move_index: u32,
        /// Team that played.
        team: TeamId,
        /// Column the disc was dropped into.
        column: u8,
        /// Grid after the drop.
        board_after: Board,
    },
    /// A game sealed.
    GameComplete {
        /// Game position in the match.
        game_index: u8,
        /// Result in team slots.
        outcome: GameOutcome,
        /// Why the game ended.
        reason: GameEndReason,
        /// Team credited with the game, if any.
        winner: Option<TeamId>,
    },
    /// The live subscriber count of this topic changed.
    SpectatorCount {
        /// Current subscriber count.
        count: usize,
    },
    /// The match was reverted to `scheduled`; spectators should reload.
    MatchRestart,
}

/// Both broadcasters under one roof, with topic naming applied.
pub struct EventHub {
    dashboard: Broadcaster<DashboardEvent>,
    matches: Broadcaster<MatchEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    /// An empty hub.
    pub fn new() -> EventHub {
        EventHub {
            dashboard: Broadcaster::new(),
            matches: Broadcaster::new(),
        }
    }

    /// Publishes on the dashboard topic.
    pub(crate) fn dashboard(&self, event: DashboardEvent) {
        self.dashboard.publish(DASHBOARD_TOPIC, event);
    }

    /// Publishes on a match topic.
    pub(crate) fn match_event(&self, match_id: Uuid, kind: MatchEventKind) {
        self.matches
            .publish(&match_topic(match_id), MatchEvent { match_id, kind });
    }

    /// Subscribes to the dashboard, seeding the given snapshot event.
    pub(crate) fn subscribe_dashboard(
        &self,
        initial: DashboardEvent,
    ) -> Subscription<DashboardEvent> {
        self.dashboard.subscribe(DASHBOARD_TOPIC, vec![initial])
    }

    /// Subscribes to a match topic with the header events already queued.
    ///
    /// The subscription is counted: `spectator_count` is announced on the
    /// topic now and again when the subscription is dropped.
    pub(crate) fn subscribe_match(
        &self,
        match_id: Uuid,
        initial: Vec<MatchEvent>,
    ) -> Subscription<MatchEvent> {
        self.matches.subscribe_counted(
            &match_topic(match_id),
            initial,
            Arc::new(move |count| MatchEvent {
                match_id,
                kind: MatchEventKind::SpectatorCount { count },
            }),
        )
    }

    /// Drops every topic of both families.
    pub(crate) fn clear(&self) {
        self.dashboard.clear();
        self.matches.clear();
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = DashboardEvent::RoundStart { round: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_start");
        assert_eq!(json["round"], 2);
    }

    #[test]
    fn match_events_carry_their_match_id_flattened() {
        let match_id = Uuid::new_v4();
        let event = MatchEvent {
            match_id,
            kind: MatchEventKind::GameStart { game_index: 3 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "game_start");
        assert_eq!(json["game_index"], 3);
        assert_eq!(json["match_id"], match_id.to_string());
    }
}
