//! Durable championship state behind a key/value contract.
//!
//! Three logical namespaces exist: `teams:{id}`, `schedule` and
//! `matches:{id}`. Every write is keyed and idempotent, so replaying a
//! sequence of updates reconstructs the same state. The [`StateBackend`]
//! trait is the persistence seam; [`MemoryBackend`] is the built-in
//! implementation and anything honoring the contract (an embedded KV
//! database, a cache server) can replace it.
//!
//! The store never interprets ownership: exactly one match runner writes a
//! given `matches:{id}` key while it runs, which is what makes
//! last-writer-wins safe.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::{LeaderboardEntry, MatchRecord, MatchStatus, Phase};
use crate::schedule::Schedule;
use crate::team::Team;

/// Errors surfaced by the store.
///
/// Unrecoverable backend failures propagate to the controller, which logs
/// them and keeps serving the last consistent snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record failed to encode or decode.
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
    /// The backend failed.
    #[error("backend: {0}")]
    Backend(String),
}

/// Key/value persistence contract.
///
/// Keys are stable across restarts; values are JSON. `scan` returns the
/// values of a namespace in key order.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Writes (or overwrites) one key.
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
    /// Reads one key.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    /// Reads every value under a key prefix, in key order.
    async fn scan(&self, prefix: &str) -> Result<Vec<Value>, StoreError>;
    /// Drops everything.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-process backend over a sorted map.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Value>>,
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Full state of the championship, served to new dashboard subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Current phase.
    pub phase: Phase,
    /// Registered teams in roster order.
    pub teams: Vec<Team>,
    /// The schedule, once built.
    pub schedule: Option<Schedule>,
    /// Every match record.
    pub matches: Vec<MatchRecord>,
    /// Standings derived from sealed matches.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Zero-based round currently playing.
    pub current_round: u32,
    /// Total rounds of the schedule.
    pub total_rounds: u32,
}

/// Typed access to the persisted namespaces.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StateBackend>,
}

impl Store {
    /// A store over the given backend.
    pub fn new(backend: Arc<dyn StateBackend>) -> Store {
        Store { backend }
    }

    /// A store over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Store {
        Store::new(Arc::new(MemoryBackend::default()))
    }

    /// Writes one team record.
    pub async fn put_team(&self, team: &Team) -> Result<(), StoreError> {
        let value = serde_json::to_value(team)?;
        self.backend.put(&format!("teams:{}", team.id), value).await
    }

    /// The roster, in registration order.
    pub async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        let mut teams: Vec<Team> = self
            .backend
            .scan("teams:")
            .await?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?;
        // Key order is id order; the roster order that the schedule relies
        // on is registration order.
        teams.sort_by(|a, b| {
            a.registered_at_ms
                .cmp(&b.registered_at_ms)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(teams)
    }

    /// Persists the schedule blob.
    pub async fn put_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let value = serde_json::to_value(schedule)?;
        self.backend.put("schedule", value).await
    }

    /// The stored schedule, if the tournament was started.
    pub async fn schedule(&self) -> Result<Option<Schedule>, StoreError> {
        match self.backend.get("schedule").await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Writes a match record, last writer wins.
    pub async fn update_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.backend
            .put(&format!("matches:{}", record.match_id), value)
            .await
    }

    /// Reads one match record.
    pub async fn match_record(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        match self.backend.get(&format!("matches:{match_id}")).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Every match record, in key order.
    pub async fn matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        self.backend
            .scan("matches:")
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// Standings derived from sealed match records.
    ///
    /// Points and time are summed over sealed games; aborted matches award
    /// nothing and count as a loss for both sides. Sorted by descending
    /// points, then ascending time used, then display name.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let teams = self.teams().await?;
        let matches = self.matches().await?;

        let mut entries: Vec<LeaderboardEntry> = teams
            .iter()
            .map(|team| LeaderboardEntry {
                team_id: team.id,
                display_name: team.name.clone(),
                points: 0.0,
                wins: 0,
                draws: 0,
                losses: 0,
                time_used_ms: 0,
            })
            .collect();

        for record in &matches {
            if !record.status.is_terminal() {
                continue;
            }
            for entry in entries.iter_mut() {
                let (own_points, own_time): (f64, u64) = if entry.team_id == record.team_a {
                    (
                        record.points_a,
                        record.games.iter().map(|g| g.duration_a_ms).sum(),
                    )
                } else if entry.team_id == record.team_b {
                    (
                        record.points_b,
                        record.games.iter().map(|g| g.duration_b_ms).sum(),
                    )
                } else {
                    continue;
                };
                entry.points += own_points;
                entry.time_used_ms += own_time;
                match record.status {
                    MatchStatus::Aborted => entry.losses += 1,
                    MatchStatus::Finished => match record.winner() {
                        Some(winner) if winner == entry.team_id => entry.wins += 1,
                        Some(_) => entry.losses += 1,
                        None => entry.draws += 1,
                    },
                    _ => {}
                }
            }
        }

        entries.sort_by(|a, b| {
            b.points
                .total_cmp(&a.points)
                .then_with(|| a.time_used_ms.cmp(&b.time_used_ms))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        Ok(entries)
    }

    /// Assembles the dashboard snapshot.
    pub async fn snapshot(&self, phase: Phase, current_round: u32) -> Result<Snapshot, StoreError> {
        let schedule = self.schedule().await?;
        let total_rounds = schedule.as_ref().map(|s| s.total_rounds()).unwrap_or(0);
        Ok(Snapshot {
            phase,
            teams: self.teams().await?,
            matches: self.matches().await?,
            leaderboard: self.leaderboard().await?,
            schedule,
            current_round,
            total_rounds,
        })
    }

    /// Post-restart pass: reverts `in_progress` matches to `scheduled`
    /// with full banks. Returns how many were reverted.
    pub async fn recover(&self, bank_ms: u64) -> Result<usize, StoreError> {
        let mut reverted = 0;
        for mut record in self.matches().await? {
            if record.status == MatchStatus::InProgress {
                record.reset(bank_ms);
                self.update_match(&record).await?;
                reverted += 1;
            }
        }
        Ok(reverted)
    }

    /// Drops all persisted state.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.backend.clear().await
    }
}
