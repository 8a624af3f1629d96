//! Persistent records of games, matches and standings.
//!
//! Records are what the store keeps and what events carry. They never
//! reference player indices: a result is always expressed in terms of the
//! two team slots of the match (`A`/`B`), which stay stable while the
//! first-mover and colors rotate from game to game.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::Player;
use crate::team::TeamId;

/// Number of games composing a match.
pub const GAMES_PER_MATCH: u8 = 4;

/// Lifecycle of the championship as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting registrations; not started yet.
    Waiting,
    /// Rounds are being played.
    InProgress,
    /// All rounds completed.
    Finished,
}

/// One of the two team slots of a match.
///
/// Slot `A` is the first team of the pairing as generated by the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// First team of the pairing.
    A,
    /// Second team of the pairing.
    B,
}

impl Slot {
    /// The opposite slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// The in-game player number of this slot, given the game's first mover.
    pub fn player(self, first_mover: Slot) -> Player {
        if self == first_mover {
            Player::One
        } else {
            Player::Two
        }
    }

    /// The slot owning the given in-game player number.
    pub fn of_player(player: Player, first_mover: Slot) -> Slot {
        match player {
            Player::One => first_mover,
            Player::Two => first_mover.other(),
        }
    }
}

/// Disc color held by a team for one game. Cosmetic: move order is carried
/// by the first-mover, not by the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Red discs.
    Red,
    /// Yellow discs.
    Yellow,
}

impl Color {
    /// The opposite color.
    pub fn other(self) -> Color {
        match self {
            Color::Red => Color::Yellow,
            Color::Yellow => Color::Red,
        }
    }
}

/// First mover and slot-A color for a game of the fixed four-game rotation.
///
/// | game | first mover | color of A |
/// |---|---|---|
/// | 1 | A | red |
/// | 2 | B | yellow |
/// | 3 | A | yellow |
/// | 4 | B | red |
pub fn rotation(game_index: u8) -> (Slot, Color) {
    match game_index {
        1 => (Slot::A, Color::Red),
        2 => (Slot::B, Color::Yellow),
        3 => (Slot::A, Color::Yellow),
        _ => (Slot::B, Color::Red),
    }
}

/// Terminal result of a single game, expressed in team slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    /// The slot won by aligning four discs, or by the opponent's forfeit.
    Win(Slot),
    /// Full grid, or both banks empty before the game could start.
    Draw,
    /// The slot forfeited (rule violation or time exhaustion).
    Forfeit(Slot),
}

impl GameOutcome {
    /// Points awarded to slots A and B for this outcome.
    ///
    /// Every game distributes exactly one point: 1/0, 0/1 or 0.5/0.5.
    pub fn points(self) -> (f64, f64) {
        match self {
            GameOutcome::Win(Slot::A) | GameOutcome::Forfeit(Slot::B) => (1.0, 0.0),
            GameOutcome::Win(Slot::B) | GameOutcome::Forfeit(Slot::A) => (0.0, 1.0),
            GameOutcome::Draw => (0.5, 0.5),
        }
    }

    /// The slot credited with the game, if any.
    pub fn winner(self) -> Option<Slot> {
        match self {
            GameOutcome::Win(slot) => Some(slot),
            GameOutcome::Forfeit(slot) => Some(slot.other()),
            GameOutcome::Draw => None,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    /// Four aligned discs.
    FourInARow,
    /// Grid full without a winner.
    BoardFull,
    /// No reply within the per-turn deadline.
    Timeout,
    /// Connection error, TLS error or non-2xx status.
    Transport,
    /// Reply was not a parseable `{move: int}`.
    MalformedReply,
    /// Reply named a full or out-of-range column.
    IllegalMove,
    /// The match bank ran out during the game.
    BankExhausted,
    /// The game was credited without play: a bank was already empty when
    /// the game was due to start.
    Walkover,
}

/// One move of a game's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    /// Slot that played the move.
    pub slot: Slot,
    /// Column the disc was dropped into.
    pub column: u8,
}

/// Sealed record of a finished game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    /// Position of the game in the match, 1 to 4.
    pub game_index: u8,
    /// Slot that moved first.
    pub first_mover: Slot,
    /// Disc color of slot A; slot B holds the other color.
    pub color_a: Color,
    /// Ordered move log.
    pub moves: Vec<MoveEntry>,
    /// How the game ended.
    pub outcome: GameOutcome,
    /// Why it ended that way.
    pub reason: GameEndReason,
    /// Wall-clock spent by slot A's agent calls, in milliseconds.
    pub duration_a_ms: u64,
    /// Wall-clock spent by slot B's agent calls, in milliseconds.
    pub duration_b_ms: u64,
}

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// In the schedule, not started.
    Scheduled,
    /// Owned by a running match runner.
    InProgress,
    /// All four games sealed.
    Finished,
    /// Terminated without a result (setup failure or cancellation).
    Aborted,
}

impl MatchStatus {
    /// True for `Finished` and `Aborted`: the record no longer changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Aborted)
    }
}

/// Record of a match between two teams, updated only by its match runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Identifier assigned at schedule generation.
    pub match_id: Uuid,
    /// Zero-based round the match belongs to.
    pub round_index: u32,
    /// Team in slot A.
    pub team_a: TeamId,
    /// Team in slot B.
    pub team_b: TeamId,
    /// Current lifecycle state.
    pub status: MatchStatus,
    /// Sealed games, in play order.
    pub games: Vec<GameRecord>,
    /// Game points accumulated by slot A.
    pub points_a: f64,
    /// Game points accumulated by slot B.
    pub points_b: f64,
    /// Remaining match bank of slot A, in milliseconds.
    pub bank_a_ms: u64,
    /// Remaining match bank of slot B, in milliseconds.
    pub bank_b_ms: u64,
}

impl MatchRecord {
    /// A fresh `scheduled` record with full banks and no games.
    pub fn new(
        match_id: Uuid,
        round_index: u32,
        team_a: TeamId,
        team_b: TeamId,
        bank_ms: u64,
    ) -> MatchRecord {
        MatchRecord {
            match_id,
            round_index,
            team_a,
            team_b,
            status: MatchStatus::Scheduled,
            games: Vec::new(),
            points_a: 0.0,
            points_b: 0.0,
            bank_a_ms: bank_ms,
            bank_b_ms: bank_ms,
        }
    }

    /// The team occupying a slot.
    pub fn team_in(&self, slot: Slot) -> TeamId {
        match slot {
            Slot::A => self.team_a,
            Slot::B => self.team_b,
        }
    }

    /// Winning team of a finished match, `None` for a draw or a non-final
    /// state.
    pub fn winner(&self) -> Option<TeamId> {
        if self.status != MatchStatus::Finished {
            return None;
        }
        if self.points_a > self.points_b {
            Some(self.team_a)
        } else if self.points_b > self.points_a {
            Some(self.team_b)
        } else {
            None
        }
    }

    /// Appends a sealed game and folds its points into the match totals.
    pub fn seal_game(&mut self, game: GameRecord) {
        let (pa, pb) = game.outcome.points();
        self.points_a += pa;
        self.points_b += pb;
        self.games.push(game);
    }

    /// Reverts the record to a pristine `scheduled` state for a replay
    /// from game 1.
    pub fn reset(&mut self, bank_ms: u64) {
        self.status = MatchStatus::Scheduled;
        self.games.clear();
        self.points_a = 0.0;
        self.points_b = 0.0;
        self.bank_a_ms = bank_ms;
        self.bank_b_ms = bank_ms;
    }
}

/// Aggregated standing of one team, derived from sealed match records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// The team this entry ranks.
    pub team_id: TeamId,
    /// Display name, also the last tie-break key.
    pub display_name: String,
    /// Total game points over all sealed matches.
    pub points: f64,
    /// Matches won.
    pub wins: u32,
    /// Matches drawn.
    pub draws: u32,
    /// Matches lost (including aborted matches, counted against both sides).
    pub losses: u32,
    /// Total agent wall-clock used, in milliseconds.
    pub time_used_ms: u64,
}
