//! `Novus` Core Library
//!
//! Shared functionality for the `Novus` CTF platform:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and the shared database error type
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
