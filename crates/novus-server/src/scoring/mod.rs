//! Flag verification and scoring.

mod verifier;

pub use verifier::{FlagVerifier, VerifyError, VerifyOutcome, VerifyRequest, flag_matches};
