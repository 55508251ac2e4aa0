//! Adaptive learning: user accept/reject decisions aggregated into
//! per-domain patterns that shift checker confidence.

pub mod decay;
pub mod key;
pub mod store;
pub mod types;

pub use store::{LearningStore, StoreConfidence};
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum LearningError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bundle serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported learning bundle version: {0}")]
    UnsupportedBundleVersion(u32),

    #[error("Unknown learning domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Candidate is empty after normalization")]
    EmptyCandidate,

    #[error("Learning store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for LearningError {
    fn from(e: rusqlite::Error) -> Self {
        LearningError::Database(DatabaseError::Sqlite(e))
    }
}
