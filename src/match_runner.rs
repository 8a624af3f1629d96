//! Per-match state machine.
//!
//! A match is four games between the same two teams with the first move
//! and the colors rotating per game. The runner owns the only write lease
//! on its match record: it moves the record through `in_progress` to
//! `finished` (or `aborted`), deducts the shared match banks, and emits
//! every spectator event of the match topic.
//!
//! Agent misbehavior never escapes the game driver; the only conditions
//! the runner itself adjudicates are the setup-window reachability check
//! before game 1, walkover games once a bank is empty, and cancellation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agent_client::AgentClient;
use crate::events::{DashboardEvent, EventHub, MatchEventKind};
use crate::game_driver::{run_game, Banks};
use crate::record::{
    rotation, GameEndReason, GameOutcome, GameRecord, MatchRecord, MatchStatus, Slot,
    GAMES_PER_MATCH,
};
use crate::store::Store;
use crate::team::Team;
use crate::time_control::TimeControl;

/// Everything a match runner and its game drivers need.
pub(crate) struct MatchContext {
    pub match_id: Uuid,
    /// Teams in slot order: `[0]` is slot A, `[1]` is slot B.
    pub teams: [Team; 2],
    pub client: AgentClient,
    pub time: TimeControl,
    pub store: Store,
    pub hub: Arc<EventHub>,
    pub cancel: CancellationToken,
    /// Match ids currently owned by a live runner; used by the controller
    /// to revert interrupted matches on restart.
    pub active: Arc<Mutex<HashSet<Uuid>>>,
}

impl MatchContext {
    pub(crate) fn team(&self, slot: Slot) -> &Team {
        match slot {
            Slot::A => &self.teams[0],
            Slot::B => &self.teams[1],
        }
    }

    pub(crate) fn emit(&self, kind: MatchEventKind) {
        self.hub.match_event(self.match_id, kind);
    }

    fn versus(&self) -> String {
        format!("[{} VS {}]", self.teams[0].name, self.teams[1].name)
    }
}

/// Runs one match to a terminal status and returns the sealed record.
///
/// Every store write of the match record happens here or in nothing else:
/// the runner holds the write lease from the `in_progress` transition to
/// the sealing write.
#[instrument(skip_all, fields(VS = cx.versus()))]
pub(crate) async fn run_match(cx: MatchContext) -> MatchRecord {
    cx.active.lock().expect("poisoned").insert(cx.match_id);
    let record = drive(&cx).await;
    cx.active.lock().expect("poisoned").remove(&cx.match_id);
    record
}

async fn drive(cx: &MatchContext) -> MatchRecord {
    let bank_ms = cx.time.match_bank().as_millis() as u64;
    let mut record = match cx.store.match_record(cx.match_id).await {
        Ok(Some(record)) => record,
        Ok(None) => MatchRecord::new(
            cx.match_id,
            0,
            cx.teams[0].id,
            cx.teams[1].id,
            bank_ms,
        ),
        Err(e) => {
            warn!(%e, "could not load match record");
            MatchRecord::new(cx.match_id, 0, cx.teams[0].id, cx.teams[1].id, bank_ms)
        }
    };

    if cx.cancel.is_cancelled() {
        return record;
    }

    info!("match started");
    record.status = MatchStatus::InProgress;
    publish_record(cx, &record).await;
    cx.emit(MatchEventKind::ChampionshipMatchInfo {
        record: record.clone(),
        team_a_name: cx.teams[0].name.clone(),
        team_b_name: cx.teams[1].name.clone(),
    });

    // Setup window: both endpoints get an opening-board probe. One live
    // endpoint is enough to play (the dead one will forfeit its turns).
    let window = cx.time.setup_window();
    let probes = async {
        tokio::join!(
            cx.client.probe(&cx.teams[0].endpoint, window),
            cx.client.probe(&cx.teams[1].endpoint, window),
        )
    };
    let (reach_a, reach_b) = tokio::select! {
        _ = cx.cancel.cancelled() => return abort(cx, record).await,
        reached = probes => reached,
    };
    if !reach_a && !reach_b {
        warn!("neither endpoint reachable in the setup window");
        return abort(cx, record).await;
    }

    let mut banks = Banks::new(cx.time.match_bank());
    for game_index in 1..=GAMES_PER_MATCH {
        let (first_mover, color_a) = rotation(game_index);
        cx.emit(MatchEventKind::GameInfo {
            game_index,
            first_mover,
            color_a,
            color_b: color_a.other(),
        });

        let empty_a = banks.get(Slot::A).is_zero();
        let empty_b = banks.get(Slot::B).is_zero();
        let game = if empty_a || empty_b {
            walkover(cx, game_index, empty_a, empty_b)
        } else {
            match run_game(cx, game_index, &mut banks).await {
                Ok(game) => game,
                Err(_cancelled) => return abort(cx, record).await,
            }
        };

        record.bank_a_ms = banks.get(Slot::A).as_millis() as u64;
        record.bank_b_ms = banks.get(Slot::B).as_millis() as u64;
        record.seal_game(game);
        publish_record(cx, &record).await;
    }

    record.status = MatchStatus::Finished;
    if let Err(e) = cx.store.update_match(&record).await {
        warn!(%e, "sealing write failed");
    }
    cx.hub.dashboard(DashboardEvent::MatchUpdate {
        record: record.clone(),
    });
    // Standings follow the sealing write, never precede it.
    publish_leaderboard(cx).await;
    info!(points_a = record.points_a, points_b = record.points_b, "match sealed");
    record
}

/// A game decided without play because a bank was already empty when it
/// was due to start. Events are still emitted so spectator UIs see all
/// four games.
fn walkover(cx: &MatchContext, game_index: u8, empty_a: bool, empty_b: bool) -> GameRecord {
    let (first_mover, color_a) = rotation(game_index);
    cx.emit(MatchEventKind::GameStart { game_index });
    let outcome = match (empty_a, empty_b) {
        (true, true) => GameOutcome::Draw,
        (true, false) => GameOutcome::Forfeit(Slot::A),
        _ => GameOutcome::Forfeit(Slot::B),
    };
    let winner = outcome.winner().map(|slot| cx.team(slot).id);
    cx.emit(MatchEventKind::GameComplete {
        game_index,
        outcome,
        reason: GameEndReason::Walkover,
        winner,
    });
    GameRecord {
        game_index,
        first_mover,
        color_a,
        moves: Vec::new(),
        outcome,
        reason: GameEndReason::Walkover,
        duration_a_ms: 0,
        duration_b_ms: 0,
    }
}

async fn abort(cx: &MatchContext, mut record: MatchRecord) -> MatchRecord {
    record.status = MatchStatus::Aborted;
    record.points_a = 0.0;
    record.points_b = 0.0;
    publish_record(cx, &record).await;
    publish_leaderboard(cx).await;
    warn!("match aborted");
    record
}

async fn publish_record(cx: &MatchContext, record: &MatchRecord) {
    if let Err(e) = cx.store.update_match(record).await {
        warn!(%e, "match record write failed");
    }
    cx.hub.dashboard(DashboardEvent::MatchUpdate {
        record: record.clone(),
    });
}

async fn publish_leaderboard(cx: &MatchContext) {
    match cx.store.leaderboard().await {
        Ok(entries) => cx.hub.dashboard(DashboardEvent::LeaderboardUpdate { entries }),
        Err(e) => warn!(%e, "leaderboard derivation failed"),
    }
}
