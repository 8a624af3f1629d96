//! The championship controller: the single value owning the whole
//! coordinator.
//!
//! One [`Championship`] owns the store, the event hub and the scheduler
//! lifecycle. Operator calls (`register`, `start`, `reset`, ...) are the
//! only way state transitions happen from the outside; rejected calls
//! never mutate anything. Tests instantiate fresh controllers instead of
//! clearing shared state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent_client::{AgentClient, AgentTransport};
use crate::broadcast::Subscription;
use crate::configuration::{Configuration, MIN_TEAMS};
use crate::events::{DashboardEvent, EventHub, MatchEvent, MatchEventKind};
use crate::logger::init_logger;
use crate::record::{rotation, LeaderboardEntry, MatchRecord, MatchStatus, Phase, GAMES_PER_MATCH};
use crate::schedule::{build_schedule, Schedule};
use crate::scheduler::{run_rounds, SchedulerContext};
use crate::store::{Snapshot, StateBackend, Store, StoreError};
use crate::team::Team;
use crate::time_control::TimeControl;

/// Operator mistakes: rejected without mutating any state.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Registration attempted outside the waiting phase.
    #[error("registration is closed once the championship leaves the waiting phase")]
    RegistrationClosed,
    /// Display name empty or longer than 64 characters.
    #[error("display name must be 1 to 64 characters")]
    InvalidName,
    /// Endpoint is not an http(s) URL.
    #[error("endpoint must be an http(s) URL")]
    InvalidEndpoint,
    /// Another team already uses that display name.
    #[error("a team named {0:?} already exists")]
    DuplicateName(String),
    /// The roster cap was reached.
    #[error("the roster is full ({0} teams)")]
    RosterFull(usize),
    /// `start` needs at least two teams.
    #[error("starting requires at least {MIN_TEAMS} teams, got {0}")]
    NotEnoughTeams(usize),
    /// `start` called outside the waiting phase.
    #[error("the championship already started")]
    AlreadyStarted,
    /// The store failed underneath the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answer to a `status` query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusReport {
    /// Current phase.
    pub status: Phase,
    /// Registered team count.
    pub team_count: usize,
    /// Zero-based round currently playing.
    pub current_round: u32,
    /// Total rounds of the schedule, 0 before the schedule exists.
    pub total_rounds: u32,
}

/// Phase and round counter shared between the controller and the
/// scheduler task.
pub(crate) struct SharedState {
    phase: Mutex<Phase>,
    current_round: AtomicU32,
}

impl SharedState {
    fn new() -> SharedState {
        SharedState {
            phase: Mutex::new(Phase::Waiting),
            current_round: AtomicU32::new(0),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock().expect("poisoned")
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        *self.phase.lock().expect("poisoned") = phase;
    }

    pub(crate) fn round(&self) -> u32 {
        self.current_round.load(Ordering::Relaxed)
    }

    pub(crate) fn set_round(&self, round: u32) {
        self.current_round.store(round, Ordering::Relaxed);
    }
}

struct RunHandle {
    cancel: Option<CancellationToken>,
    scheduler: Option<JoinHandle<()>>,
}

/// Top-level façade over the tournament coordinator.
pub struct Championship {
    config: Configuration,
    time: TimeControl,
    store: Store,
    hub: Arc<EventHub>,
    client: AgentClient,
    shared: Arc<SharedState>,
    active: Arc<Mutex<HashSet<Uuid>>>,
    run: tokio::sync::Mutex<RunHandle>,
}

impl Championship {
    /// A fresh championship over an in-memory store and the HTTP agent
    /// protocol.
    pub fn new(config: Configuration, time: TimeControl) -> Championship {
        if let Some(dir) = config.log_dir.clone() {
            init_logger(&dir);
        }
        Championship {
            config,
            time,
            store: Store::in_memory(),
            hub: Arc::new(EventHub::new()),
            client: AgentClient::http(),
            shared: Arc::new(SharedState::new()),
            active: Arc::new(Mutex::new(HashSet::new())),
            run: tokio::sync::Mutex::new(RunHandle {
                cancel: None,
                scheduler: None,
            }),
        }
    }

    /// Replaces the agent transport. Used by tests and by deployments that
    /// tunnel agent calls through something other than plain HTTP.
    pub fn with_transport(mut self, transport: Arc<dyn AgentTransport>) -> Championship {
        self.client = AgentClient::new(transport);
        self
    }

    /// Opens a championship over a possibly pre-populated backend.
    ///
    /// Matches left `in_progress` by a previous process are reverted to
    /// `scheduled` (they will replay from game 1 on the next `start`), and
    /// the phase is derived from what the backend holds.
    pub async fn open(
        config: Configuration,
        time: TimeControl,
        backend: Arc<dyn StateBackend>,
    ) -> Result<Championship, StoreError> {
        let mut championship = Championship::new(config, time);
        championship.store = Store::new(backend);

        let bank_ms = time.match_bank().as_millis() as u64;
        let reverted = championship.store.recover(bank_ms).await?;
        if reverted > 0 {
            info!(reverted, "reverted interrupted matches to scheduled");
        }
        if let Some(_schedule) = championship.store.schedule().await? {
            let matches = championship.store.matches().await?;
            let all_sealed = !matches.is_empty()
                && matches.iter().all(|m| m.status.is_terminal());
            if all_sealed {
                championship.shared.set_phase(Phase::Finished);
            }
        }
        Ok(championship)
    }

    /// Registers a team.
    ///
    /// # Errors
    /// Rejected outside the waiting phase, on a duplicate display name, on
    /// an invalid name or endpoint, and once the roster cap is reached.
    pub async fn register(&self, name: &str, endpoint: &str) -> Result<Team, OperatorError> {
        if self.shared.phase() != Phase::Waiting {
            return Err(OperatorError::RegistrationClosed);
        }
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 64 {
            return Err(OperatorError::InvalidName);
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(OperatorError::InvalidEndpoint);
        }

        let teams = self.store.teams().await?;
        if teams.len() >= self.config.max_teams {
            return Err(OperatorError::RosterFull(teams.len()));
        }
        if teams.iter().any(|t| t.name == name) {
            return Err(OperatorError::DuplicateName(name.to_owned()));
        }

        let team = Team::new(name, endpoint);
        self.store.put_team(&team).await?;
        info!(team = %team.name, endpoint = %team.endpoint, "team registered");
        self.hub.dashboard(self.status_update(teams.len() + 1, 0));
        Ok(team)
    }

    /// Starts (or resumes) the tournament.
    ///
    /// Builds the schedule on first start; a stored schedule is reused so
    /// sealed results survive a restart. Launches the scheduler task and
    /// returns immediately.
    pub async fn start(&self) -> Result<(), OperatorError> {
        let mut run = self.run.lock().await;
        if self.shared.phase() != Phase::Waiting {
            return Err(OperatorError::AlreadyStarted);
        }
        let teams = self.store.teams().await?;
        if teams.len() < MIN_TEAMS {
            return Err(OperatorError::NotEnoughTeams(teams.len()));
        }

        let bank_ms = self.time.match_bank().as_millis() as u64;
        let schedule = match self.store.schedule().await? {
            Some(schedule) => schedule,
            None => {
                let schedule = build_schedule(&teams);
                self.store.put_schedule(&schedule).await?;
                for round in &schedule.rounds {
                    for pairing in &round.pairings {
                        let record = MatchRecord::new(
                            pairing.match_id,
                            round.index,
                            pairing.team_a,
                            pairing.team_b,
                            bank_ms,
                        );
                        self.store.update_match(&record).await?;
                    }
                }
                schedule
            }
        };

        self.shared.set_phase(Phase::InProgress);
        info!(teams = teams.len(), rounds = schedule.total_rounds(), "championship started");
        self.hub
            .dashboard(self.status_update(teams.len(), schedule.total_rounds()));

        let cancel = CancellationToken::new();
        let cx = SchedulerContext {
            schedule,
            teams,
            client: self.client.clone(),
            time: self.time,
            store: self.store.clone(),
            hub: self.hub.clone(),
            cancel: cancel.clone(),
            active: self.active.clone(),
            shared: self.shared.clone(),
            max_parallel: self.config.max_parallel,
        };
        run.cancel = Some(cancel);
        run.scheduler = Some(tokio::spawn(run_rounds(cx)));
        Ok(())
    }

    /// Current phase and round counters.
    pub async fn status(&self) -> Result<StatusReport, StoreError> {
        let team_count = self.store.teams().await?.len();
        let total_rounds = self
            .store
            .schedule()
            .await?
            .map(|s| s.total_rounds())
            .unwrap_or(0);
        Ok(StatusReport {
            status: self.shared.phase(),
            team_count,
            current_round: self.shared.round(),
            total_rounds,
        })
    }

    /// The stored schedule, once the tournament started.
    pub async fn schedule(&self) -> Result<Option<Schedule>, StoreError> {
        self.store.schedule().await
    }

    /// Current standings.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.store.leaderboard().await
    }

    /// Full state snapshot, as served to new dashboard subscribers.
    pub async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.store
            .snapshot(self.shared.phase(), self.shared.round())
            .await
    }

    /// One match record.
    pub async fn match_record(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        self.store.match_record(match_id).await
    }

    /// Cancels everything and clears all state, returning to `waiting`.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.stop_scheduler().await;
        self.store.clear().await?;
        self.hub.clear();
        self.active.lock().expect("poisoned").clear();
        self.shared.set_phase(Phase::Waiting);
        self.shared.set_round(0);
        info!("championship reset");
        Ok(())
    }

    /// Stops the tournament and reverts interrupted matches to
    /// `scheduled`, keeping the roster, the schedule and sealed results.
    ///
    /// Emits `match_restart` on every reverted match topic; a subsequent
    /// [`Championship::start`] resumes the schedule and replays those
    /// matches from game 1.
    pub async fn restart(&self) -> Result<(), StoreError> {
        // Cancel first: runners stay in the active set until they observe
        // the token, so the snapshot below catches everything in flight.
        let mut run = self.run.lock().await;
        if let Some(cancel) = run.cancel.take() {
            cancel.cancel();
        }
        let mut interrupted: Vec<Uuid> = self
            .active
            .lock()
            .expect("poisoned")
            .iter()
            .copied()
            .collect();
        if let Some(handle) = run.scheduler.take() {
            if let Err(e) = handle.await {
                warn!(%e, "scheduler task ended abnormally");
            }
        }
        drop(run);
        for record in self.store.matches().await? {
            if record.status == MatchStatus::InProgress {
                interrupted.push(record.match_id);
            }
        }
        interrupted.sort_unstable();
        interrupted.dedup();

        let bank_ms = self.time.match_bank().as_millis() as u64;
        for match_id in interrupted {
            let Some(mut record) = self.store.match_record(match_id).await? else {
                continue;
            };
            if record.status == MatchStatus::Finished {
                continue;
            }
            record.reset(bank_ms);
            self.store.update_match(&record).await?;
            self.hub.match_event(match_id, MatchEventKind::MatchRestart);
            self.hub
                .dashboard(DashboardEvent::MatchUpdate { record });
        }

        self.shared.set_phase(Phase::Waiting);
        let team_count = self.store.teams().await?.len();
        let total_rounds = self
            .store
            .schedule()
            .await?
            .map(|s| s.total_rounds())
            .unwrap_or(0);
        self.hub
            .dashboard(self.status_update(team_count, total_rounds));
        info!("championship interrupted, ready to resume");
        Ok(())
    }

    /// Subscribes to the dashboard topic; the first note is an
    /// `initial_state` snapshot.
    pub async fn subscribe_dashboard(
        &self,
    ) -> Result<Subscription<DashboardEvent>, StoreError> {
        let snapshot = self.snapshot().await?;
        Ok(self.hub.subscribe_dashboard(DashboardEvent::InitialState { snapshot }))
    }

    /// Subscribes to a match topic.
    ///
    /// The first notes are the match header and the current game setup;
    /// `None` when no such match exists. The subscription is counted
    /// toward the topic's `spectator_count`.
    pub async fn subscribe_match(
        &self,
        match_id: Uuid,
    ) -> Result<Option<Subscription<MatchEvent>>, StoreError> {
        let Some(record) = self.store.match_record(match_id).await? else {
            return Ok(None);
        };
        let teams = self.store.teams().await?;
        let name_of = |id| {
            teams
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.name.clone())
                .unwrap_or_default()
        };

        let current_game = (record.games.len() as u8 + 1).min(GAMES_PER_MATCH);
        let (first_mover, color_a) = rotation(current_game);
        let initial = vec![
            MatchEvent {
                match_id,
                kind: MatchEventKind::ChampionshipMatchInfo {
                    team_a_name: name_of(record.team_a),
                    team_b_name: name_of(record.team_b),
                    record,
                },
            },
            MatchEvent {
                match_id,
                kind: MatchEventKind::GameInfo {
                    game_index: current_game,
                    first_mover,
                    color_a,
                    color_b: color_a.other(),
                },
            },
        ];
        Ok(Some(self.hub.subscribe_match(match_id, initial)))
    }

    fn status_update(&self, team_count: usize, total_rounds: u32) -> DashboardEvent {
        DashboardEvent::StatusUpdate {
            status: self.shared.phase(),
            team_count,
            current_round: self.shared.round(),
            total_rounds,
        }
    }

    async fn stop_scheduler(&self) {
        let mut run = self.run.lock().await;
        if let Some(cancel) = run.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = run.scheduler.take() {
            if let Err(e) = handle.await {
                warn!(%e, "scheduler task ended abnormally");
            }
        }
    }
}
