//! Round dispatch over a bounded worker pool.
//!
//! Rounds execute strictly sequentially: the scheduler submits a round's
//! matches to a pool capped at the configured parallelism, waits for every
//! one of them to reach a terminal status, then advances. Matches already
//! terminal are skipped so a restarted tournament resumes where it left
//! off instead of replaying sealed results.

use std::collections::HashMap;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, trace, warn};

use crate::championship::SharedState;
use crate::events::DashboardEvent;
use crate::match_runner::{run_match, MatchContext};
use crate::record::Phase;
use crate::schedule::Schedule;
use crate::store::Store;
use crate::team::{Team, TeamId};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent_client::AgentClient;
use crate::events::EventHub;
use crate::time_control::TimeControl;

/// Everything the scheduler task owns for the lifetime of a tournament.
pub(crate) struct SchedulerContext {
    pub schedule: Schedule,
    pub teams: Vec<Team>,
    pub client: AgentClient,
    pub time: TimeControl,
    pub store: Store,
    pub hub: Arc<EventHub>,
    pub cancel: CancellationToken,
    pub active: Arc<Mutex<HashSet<Uuid>>>,
    pub shared: Arc<SharedState>,
    pub max_parallel: usize,
}

impl SchedulerContext {
    fn status_update(&self) -> DashboardEvent {
        DashboardEvent::StatusUpdate {
            status: self.shared.phase(),
            team_count: self.teams.len(),
            current_round: self.shared.round(),
            total_rounds: self.schedule.total_rounds(),
        }
    }
}

/// Drives every round of the schedule to completion.
pub(crate) async fn run_rounds(cx: SchedulerContext) {
    let roster: HashMap<TeamId, Team> =
        cx.teams.iter().map(|t| (t.id, t.clone())).collect();

    for round in &cx.schedule.rounds {
        if cx.cancel.is_cancelled() {
            return;
        }
        cx.shared.set_round(round.index);
        info!(round = round.index, matches = round.pairings.len(), "round started");
        cx.hub.dashboard(DashboardEvent::RoundStart {
            round: round.index,
        });
        cx.hub.dashboard(cx.status_update());

        let pool = Arc::new(Semaphore::new(cx.max_parallel));
        let mut runners = JoinSet::new();
        for pairing in &round.pairings {
            match cx.store.match_record(pairing.match_id).await {
                Ok(Some(record)) if record.status.is_terminal() => {
                    trace!(match_id = %pairing.match_id, "already sealed, skipped");
                    continue;
                }
                Err(e) => warn!(%e, "match record read failed"),
                _ => {}
            }
            let (Some(team_a), Some(team_b)) =
                (roster.get(&pairing.team_a), roster.get(&pairing.team_b))
            else {
                warn!(match_id = %pairing.match_id, "pairing references unknown team");
                continue;
            };
            let mcx = MatchContext {
                match_id: pairing.match_id,
                teams: [team_a.clone(), team_b.clone()],
                client: cx.client.clone(),
                time: cx.time,
                store: cx.store.clone(),
                hub: cx.hub.clone(),
                cancel: cx.cancel.child_token(),
                active: cx.active.clone(),
            };
            let pool = pool.clone();
            runners.spawn(async move {
                let _permit = match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                // A cancellation that lands while the match was still
                // queued leaves its record untouched.
                if mcx.cancel.is_cancelled() {
                    return;
                }
                run_match(mcx).await;
            });
        }
        while runners.join_next().await.is_some() {}

        if cx.cancel.is_cancelled() {
            return;
        }
        info!(round = round.index, "round complete");
        cx.hub.dashboard(DashboardEvent::RoundComplete {
            round: round.index,
        });
    }

    cx.shared.set_phase(Phase::Finished);
    cx.hub.dashboard(cx.status_update());
    info!("tournament finished");
}
