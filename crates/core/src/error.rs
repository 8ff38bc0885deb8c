//! Error types shared across the workspace

use crate::transaction::SlotId;
use crate::validation::ValidationError;
use thiserror::Error;

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A field value was rejected; the message is user-facing
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No active session: {0}")]
    NoActiveSession(String),

    #[error("Transaction is incomplete, missing: {}", format_missing(.missing))]
    IncompleteRecord { missing: Vec<SlotId> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_missing(missing: &[SlotId]) -> String {
    missing
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Missing fields for an incomplete record, empty otherwise
    pub fn missing_fields(&self) -> &[SlotId] {
        match self {
            Error::IncompleteRecord { missing } => missing,
            _ => &[],
        }
    }
}
