//! SQLite storage for the Novus server.
//!
//! Provides persistence for teams, challenges, challenge files, the
//! submission log, identities and admin grants.

mod db;
mod models;
mod queries_admin;
mod queries_challenges;
mod queries_submissions;
mod queries_teams;

#[cfg(test)]
mod tests;

pub use db::NovusDatabase;
pub use models::*;
pub use novus_core::db::DatabaseError;
pub use queries_challenges::{ChallengeUpdate, NewChallenge, NewChallengeFile};
pub use queries_submissions::{AttemptOutcome, SubmissionFilter};
pub use queries_teams::{NewMember, NewTeam, TeamUpdate};
