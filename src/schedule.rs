//! Round-robin schedule generation.
//!
//! Uses the circle method: the first team stays fixed while the others
//! rotate one position per round. An odd roster gets a phantom slot whose
//! pairing marks the bye. Generation is deterministic for a given roster
//! order, so rebuilding the schedule from the stored roster yields the
//! same rounds (match ids excepted, which is why the schedule itself is
//! persisted).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::team::{Team, TeamId};

/// A scheduled meeting of two teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    /// Match identifier, assigned at generation.
    pub match_id: Uuid,
    /// Team in slot A.
    pub team_a: TeamId,
    /// Team in slot B.
    pub team_b: TeamId,
}

/// One round: the pairings played before any team plays again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Zero-based position in the schedule.
    pub index: u32,
    /// Matches of the round.
    pub pairings: Vec<Pairing>,
    /// Team sitting the round out, when the roster is odd.
    pub bye: Option<TeamId>,
}

/// The full tournament schedule. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Rounds in play order.
    pub rounds: Vec<Round>,
}

impl Schedule {
    /// Total number of rounds.
    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// All pairings of the schedule, in round order.
    pub fn pairings(&self) -> impl Iterator<Item = &Pairing> {
        self.rounds.iter().flat_map(|r| r.pairings.iter())
    }
}

/// Builds the round-robin schedule for the roster, in registration order.
///
/// `N` teams produce `N-1` rounds when `N` is even and `N` rounds with a
/// rotating bye when `N` is odd; every unordered pair meets exactly once.
pub fn build_schedule(roster: &[Team]) -> Schedule {
    let mut slots: Vec<Option<TeamId>> = roster.iter().map(|t| Some(t.id)).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();
    if n < 2 {
        return Schedule { rounds: Vec::new() };
    }

    let mut rounds = Vec::with_capacity(n - 1);
    for index in 0..(n - 1) as u32 {
        let mut pairings = Vec::with_capacity(n / 2);
        let mut bye = None;
        for i in 0..n / 2 {
            let (left, right) = (slots[i], slots[n - 1 - i]);
            match (left, right) {
                (Some(team_a), Some(team_b)) => pairings.push(Pairing {
                    match_id: Uuid::new_v4(),
                    team_a,
                    team_b,
                }),
                (Some(team), None) | (None, Some(team)) => bye = Some(team),
                (None, None) => {}
            }
        }
        rounds.push(Round {
            index,
            pairings,
            bye,
        });
        // Keep slot 0 fixed, rotate the rest one step clockwise.
        slots[1..].rotate_right(1);
    }
    Schedule { rounds }
}
