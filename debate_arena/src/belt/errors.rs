//! Belt challenge error types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{BeltId, BeltType, ChallengeId, ChallengeStatus};
use crate::economy::EconomyError;
use crate::error::ErrorKind;
use crate::tournament::models::UserId;

/// Why a challenge request was refused.
///
/// The variant names double as stable reason codes for API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityReason {
    /// Belt has no holder to challenge
    BeltVacant,
    /// Holders cannot challenge their own belt
    ChallengerIsHolder,
    /// New holders are protected until `until`
    GracePeriod { until: DateTime<Utc> },
    /// Same challenger challenged this belt too recently
    Cooldown { until: DateTime<Utc> },
    /// Same challenger already has an open challenge on this belt
    DuplicatePending,
    /// Rating gap between challenger and holder is too wide
    EloOutOfRange { gap: i32, allowed: i32 },
    /// Free challenges are used up and coins cannot cover the fee
    InsufficientCoins { available: i64, required: i64 },
    /// Only the current holder may answer a challenge
    NotHolder,
}

impl EligibilityReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EligibilityReason::BeltVacant => "BELT_VACANT",
            EligibilityReason::ChallengerIsHolder => "CHALLENGER_IS_HOLDER",
            EligibilityReason::GracePeriod { .. } => "GRACE_PERIOD",
            EligibilityReason::Cooldown { .. } => "COOLDOWN",
            EligibilityReason::DuplicatePending => "DUPLICATE_PENDING",
            EligibilityReason::EloOutOfRange { .. } => "ELO_OUT_OF_RANGE",
            EligibilityReason::InsufficientCoins { .. } => "INSUFFICIENT_COINS",
            EligibilityReason::NotHolder => "NOT_HOLDER",
        }
    }
}

impl std::fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EligibilityReason::BeltVacant => write!(f, "belt has no holder"),
            EligibilityReason::ChallengerIsHolder => write!(f, "you already hold this belt"),
            EligibilityReason::GracePeriod { until } => {
                write!(f, "holder is protected until {until}")
            }
            EligibilityReason::Cooldown { until } => {
                write!(f, "you can challenge this belt again after {until}")
            }
            EligibilityReason::DuplicatePending => {
                write!(f, "you already have a pending challenge for this belt")
            }
            EligibilityReason::EloOutOfRange { gap, allowed } => {
                write!(f, "rating gap {gap} exceeds the allowed {allowed}")
            }
            EligibilityReason::InsufficientCoins {
                available,
                required,
            } => write!(f, "need {required} coins, have {available}"),
            EligibilityReason::NotHolder => write!(f, "only the belt holder can respond"),
        }
    }
}

/// Belt challenge errors
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("Belt not found: {0}")]
    BeltNotFound(BeltId),

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(ChallengeId),

    #[error("No settings configured for {0} belts")]
    MissingSettings(BeltType),

    #[error("Invalid {belt_type} belt settings: {reason}")]
    InvalidSettings { belt_type: BeltType, reason: String },

    #[error("Challenge not allowed: {0}")]
    Ineligible(EligibilityReason),

    #[error("Challenge {0} has expired")]
    Expired(ChallengeId),

    #[error("Challenge {id} is already {status}")]
    AlreadyResolved {
        id: ChallengeId,
        status: ChallengeStatus,
    },

    #[error("Challenge {0} already has a recorded outcome")]
    OutcomeRecorded(ChallengeId),

    #[error("User {user_id} did not take part in challenge {id}")]
    NotAParticipant { id: ChallengeId, user_id: UserId },

    #[error("Challenge {0} was changed by another request")]
    ConcurrentUpdate(ChallengeId),

    #[error("Belt {0} was changed by another request")]
    BeltChanged(BeltId),

    #[error("Economy error: {0}")]
    Economy(#[from] EconomyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ChallengeError {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChallengeError::BeltNotFound(_) | ChallengeError::ChallengeNotFound(_) => {
                ErrorKind::NotFound
            }
            ChallengeError::MissingSettings(_) | ChallengeError::InvalidSettings { .. } => {
                ErrorKind::Configuration
            }
            ChallengeError::Ineligible(_) => ErrorKind::Eligibility,
            ChallengeError::Expired(_)
            | ChallengeError::AlreadyResolved { .. }
            | ChallengeError::OutcomeRecorded(_)
            | ChallengeError::ConcurrentUpdate(_)
            | ChallengeError::BeltChanged(_) => ErrorKind::StateConflict,
            ChallengeError::NotAParticipant { .. } => ErrorKind::Validation,
            ChallengeError::Economy(e) => e.kind(),
            ChallengeError::Database(_) => ErrorKind::Storage,
        }
    }

    /// Whether the challenge already sits in `status`.
    ///
    /// Handlers use this to treat a repeated decline as success.
    pub fn is_already(&self, status: ChallengeStatus) -> bool {
        matches!(self, ChallengeError::AlreadyResolved { status: current, .. } if *current == status)
    }

    /// Reason code for eligibility failures
    pub fn reason(&self) -> Option<&EligibilityReason> {
        match self {
            ChallengeError::Ineligible(reason) => Some(reason),
            _ => None,
        }
    }

    /// Get a client-safe error message
    pub fn client_message(&self) -> String {
        match self {
            ChallengeError::Database(_) => "Internal server error".to_string(),
            ChallengeError::MissingSettings(_) | ChallengeError::InvalidSettings { .. } => {
                "Belt challenges are temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<EligibilityReason> for ChallengeError {
    fn from(reason: EligibilityReason) -> Self {
        ChallengeError::Ineligible(reason)
    }
}

/// Result type for challenge operations
pub type ChallengeResult<T> = Result<T, ChallengeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_already_matches_only_same_status() {
        let err = ChallengeError::AlreadyResolved {
            id: 4,
            status: ChallengeStatus::Declined,
        };
        assert!(err.is_already(ChallengeStatus::Declined));
        assert!(!err.is_already(ChallengeStatus::Accepted));
        assert!(!ChallengeError::Expired(4).is_already(ChallengeStatus::Declined));
    }

    #[test]
    fn test_reason_codes_serialize_with_tag() {
        let reason = EligibilityReason::InsufficientCoins {
            available: 10,
            required: 50,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_COINS");
        assert_eq!(json["required"], 50);
        assert_eq!(reason.code(), "INSUFFICIENT_COINS");
    }

    #[test]
    fn test_kinds_and_client_messages() {
        let err = ChallengeError::from(EligibilityReason::ChallengerIsHolder);
        assert_eq!(err.kind(), ErrorKind::Eligibility);
        assert_eq!(
            err.client_message(),
            "Challenge not allowed: you already hold this belt"
        );

        let err = ChallengeError::MissingSettings(BeltType::Rookie);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(
            err.client_message(),
            "Belt challenges are temporarily unavailable"
        );

        assert_eq!(ChallengeError::Expired(1).kind(), ErrorKind::StateConflict);
    }
}
