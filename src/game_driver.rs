//! Per-game state machine.
//!
//! Drives one Connect-4 game between the two teams of a match: alternates
//! turns, calls the agent client under the computed deadline, validates
//! and applies the reply, and seals the game on the first terminal
//! condition. Every agent failure is contained here and becomes a forfeit;
//! nothing an agent does can escape the game.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{trace, warn};

use crate::agent_client::AgentFailure;
use crate::board::{Board, Player, Terminal};
use crate::events::MatchEventKind;
use crate::match_runner::MatchContext;
use crate::record::{rotation, GameEndReason, GameOutcome, GameRecord, MoveEntry, Slot};

/// Remaining match banks of the two slots, shared across the four games.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Banks {
    pub a: Duration,
    pub b: Duration,
}

impl Banks {
    pub(crate) fn new(bank: Duration) -> Banks {
        Banks { a: bank, b: bank }
    }

    pub(crate) fn get(&self, slot: Slot) -> Duration {
        match slot {
            Slot::A => self.a,
            Slot::B => self.b,
        }
    }

    fn deduct(&mut self, slot: Slot, elapsed: Duration) {
        let bank = match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        };
        *bank = bank.saturating_sub(elapsed);
    }
}

/// The match runner's cancellation token fired mid-game.
pub(crate) struct Cancelled;

/// Runs one game to completion and returns its sealed record.
///
/// Elapsed agent wall-clock is deducted from the acting slot's bank
/// whatever the call's outcome, capped at what the bank still holds.
pub(crate) async fn run_game(
    cx: &MatchContext,
    game_index: u8,
    banks: &mut Banks,
) -> Result<GameRecord, Cancelled> {
    let (first_mover, color_a) = rotation(game_index);
    cx.emit(MatchEventKind::GameStart { game_index });
    trace!(game_index, "game started");

    let mut board = Board::new();
    let mut moves: Vec<MoveEntry> = Vec::new();
    let mut duration_a = Duration::ZERO;
    let mut duration_b = Duration::ZERO;
    let mut player = Player::One;

    let (outcome, reason) = loop {
        let slot = Slot::of_player(player, first_mover);
        let bank = banks.get(slot);
        if bank.is_zero() {
            // No agent call: an empty bank forfeits on the spot.
            break (GameOutcome::Forfeit(slot), GameEndReason::BankExhausted);
        }

        let team = cx.team(slot);
        let deadline = cx.time.turn_deadline(bank);
        let started = Instant::now();
        let request = cx
            .client
            .request_move(&team.endpoint, &board, player, deadline);
        let result = tokio::select! {
            _ = cx.cancel.cancelled() => return Err(Cancelled),
            result = request => result,
        };

        let charged = Duration::min(started.elapsed(), bank);
        banks.deduct(slot, charged);
        match slot {
            Slot::A => duration_a += charged,
            Slot::B => duration_b += charged,
        }

        match result {
            Ok(column) => {
                if board.apply(column, player).is_err() {
                    break (GameOutcome::Forfeit(slot), GameEndReason::IllegalMove);
                }
                moves.push(MoveEntry { slot, column });
                cx.emit(MatchEventKind::MoveMade {
                    game_index,
                    move_index: (moves.len() - 1) as u32,
                    team: team.id,
                    column,
                    board_after: board,
                });
                cx.emit(MatchEventKind::GameUpdate {
                    game_index,
                    board,
                    move_count: moves.len() as u32,
                });
                match board.terminal() {
                    Terminal::Win(winner) => {
                        break (
                            GameOutcome::Win(Slot::of_player(winner, first_mover)),
                            GameEndReason::FourInARow,
                        )
                    }
                    Terminal::Draw => break (GameOutcome::Draw, GameEndReason::BoardFull),
                    Terminal::None => player = player.other(),
                }
            }
            Err(failure) => {
                warn!(team = %team.name, game_index, %failure, "turn forfeited");
                break (
                    GameOutcome::Forfeit(slot),
                    reason_of(&failure, deadline, cx.time.per_turn_cap()),
                );
            }
        }
    };

    let winner = outcome.winner().map(|slot| cx.team(slot).id);
    cx.emit(MatchEventKind::GameComplete {
        game_index,
        outcome,
        reason,
        winner,
    });
    trace!(game_index, ?outcome, ?reason, "game sealed:\n{board}");

    Ok(GameRecord {
        game_index,
        first_mover,
        color_a,
        moves,
        outcome,
        reason,
        duration_a_ms: duration_a.as_millis() as u64,
        duration_b_ms: duration_b.as_millis() as u64,
    })
}

fn reason_of(failure: &AgentFailure, deadline: Duration, per_turn_cap: Duration) -> GameEndReason {
    match failure {
        // A deadline shorter than the cap means the bank was the binding
        // constraint when time ran out.
        AgentFailure::Timeout(_) if deadline < per_turn_cap => GameEndReason::BankExhausted,
        AgentFailure::Timeout(_) => GameEndReason::Timeout,
        AgentFailure::Transport(_) => GameEndReason::Transport,
        AgentFailure::Malformed(_) => GameEndReason::MalformedReply,
        AgentFailure::Illegal(_) => GameEndReason::IllegalMove,
    }
}

#[cfg(test)]
mod banks_tests {
    use super::*;

    #[test]
    fn deduction_saturates_at_zero() {
        let mut banks = Banks::new(Duration::from_secs(1));
        banks.deduct(Slot::A, Duration::from_secs(5));
        assert_eq!(banks.get(Slot::A), Duration::ZERO);
        assert_eq!(banks.get(Slot::B), Duration::from_secs(1));
    }
}
