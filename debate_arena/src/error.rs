//! Error taxonomy shared by the tournament, belt and economy modules.

use serde::{Deserialize, Serialize};

/// Broad category of an engine error.
///
/// HTTP handlers map these onto status codes; the engine itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or inconsistent input (e.g. a tied bracket match with no winner)
    Validation,
    /// A challenge policy rule rejected the request
    Eligibility,
    /// Transition attempted on an entity in the wrong or a terminal state
    StateConflict,
    /// Settings are missing or nonsensical
    Configuration,
    /// Referenced record does not exist
    NotFound,
    /// Persistence layer failure
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Eligibility => write!(f, "eligibility"),
            ErrorKind::StateConflict => write!(f, "state_conflict"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Storage => write!(f, "storage"),
        }
    }
}
