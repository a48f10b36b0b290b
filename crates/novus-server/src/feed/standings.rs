//! Locally maintained leaderboard ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use super::TeamChange;
use crate::storage::PublicTeam;

/// One leaderboard line. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTeam {
    pub rank: usize,
    #[serde(flatten)]
    pub team: PublicTeam,
}

/// Ranked team list kept in sync by applying [`TeamChange`] events.
///
/// Events carry the row revision they produced. An event whose revision is
/// not newer than what is already known is ignored, so replaying events that
/// a snapshot already reflects is harmless. Deleted ids keep a tombstone so a
/// late update cannot bring a team back.
#[derive(Debug, Default, Clone)]
pub struct Standings {
    teams: Vec<PublicTeam>,
    tombstones: HashMap<String, i64>,
}

/// Score descending, then earliest to reach that score, then name, then id.
///
/// Must agree with the `ORDER BY` of `NovusDatabase::list_public_teams`.
fn rank_order(a: &PublicTeam, b: &PublicTeam) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.score_updated_at.cmp(&b.score_updated_at))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

impl Standings {
    pub fn new(snapshot: Vec<PublicTeam>) -> Self {
        let mut standings = Self {
            teams: snapshot,
            tombstones: HashMap::new(),
        };
        standings.teams.sort_by(rank_order);
        standings
    }

    /// Replace the team list with a fresh snapshot. Tombstones are kept.
    pub fn reset(&mut self, snapshot: Vec<PublicTeam>) {
        self.teams = snapshot
            .into_iter()
            .filter(|t| !self.is_tombstoned(&t.id, t.revision))
            .collect();
        self.teams.sort_by(rank_order);
    }

    /// Apply one change. Returns whether the ranking changed.
    pub fn apply(&mut self, change: &TeamChange) -> bool {
        match change {
            TeamChange::Insert { new } | TeamChange::Update { new } => self.upsert(new),
            TeamChange::Delete { id, revision } => self.remove(id, *revision),
        }
    }

    fn upsert(&mut self, team: &PublicTeam) -> bool {
        if self.is_tombstoned(&team.id, team.revision) {
            return false;
        }
        match self.teams.iter().position(|t| t.id == team.id) {
            Some(pos) => {
                if self.teams[pos].revision >= team.revision {
                    return false;
                }
                self.teams[pos] = team.clone();
            }
            None => self.teams.push(team.clone()),
        }
        self.teams.sort_by(rank_order);
        true
    }

    fn remove(&mut self, id: &str, revision: i64) -> bool {
        let tombstone = self.tombstones.entry(id.to_string()).or_insert(revision);
        *tombstone = (*tombstone).max(revision);

        match self.teams.iter().position(|t| t.id == id) {
            Some(pos) if self.teams[pos].revision < revision => {
                self.teams.remove(pos);
                true
            }
            _ => false,
        }
    }

    fn is_tombstoned(&self, id: &str, revision: i64) -> bool {
        self.tombstones.get(id).is_some_and(|&dead| revision <= dead)
    }

    /// Teams in rank order.
    pub fn teams(&self) -> &[PublicTeam] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Teams in rank order with positional 1-based ranks.
    pub fn ranked(&self) -> Vec<RankedTeam> {
        self.teams
            .iter()
            .enumerate()
            .map(|(i, team)| RankedTeam {
                rank: i + 1,
                team: team.clone(),
            })
            .collect()
    }
}
