//! Registered teams and their identities.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a registered team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub Uuid);

impl Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A team taking part in the championship.
///
/// The display name is unique across the roster; the endpoint is the base
/// URL of the agent's move-selection service and may be shared by several
/// teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Stable identifier, assigned at registration.
    pub id: TeamId,
    /// Unique display name, 1 to 64 characters.
    pub name: String,
    /// Move-selection endpoint of the team's agent.
    pub endpoint: String,
    /// Registration timestamp, milliseconds since the Unix epoch.
    pub registered_at_ms: u64,
}

impl Team {
    /// Creates a team with a fresh id, stamped with the current time.
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Team {
        let registered_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Team {
            id: TeamId(Uuid::new_v4()),
            name: name.into(),
            endpoint: endpoint.into(),
            registered_at_ms,
        }
    }
}

impl PartialEq for Team {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Team {}
