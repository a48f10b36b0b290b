//! Novus CTF Server Library
//!
//! - `SQLite` storage for teams, challenges, submissions and admin grants
//! - Flag verification with exactly-once scoring
//! - Admin bootstrap against an identity provider
//! - Team change feed and the live leaderboard view built on it
//! - JSON HTTP API (axum)

pub mod api;
pub mod auth;
pub mod feed;
pub mod identity;
pub mod scoring;
pub mod setup;
pub mod storage;
