//! Tournament error types.

use thiserror::Error;

use super::models::{
    DebatePosition, MatchId, ParticipantId, TournamentFormat, TournamentId, TournamentStatus,
    UserId,
};
use crate::belt::ChallengeError;
use crate::economy::EconomyError;
use crate::error::ErrorKind;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Tournament is full")]
    TournamentFull,

    #[error("User {0} already registered")]
    AlreadyRegistered(UserId),

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Cannot move tournament from {from} to {to}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    #[error("The {0} side is full")]
    PositionFull(DebatePosition),

    #[error("Round {round} is not complete: {pending} match(es) still open")]
    RoundIncomplete { round: u32, pending: usize },

    #[error("Round {expected} was already advanced by another request")]
    StaleRound { expected: u32 },

    #[error("Match {0} already has a final result")]
    MatchAlreadyFinal(MatchId),

    #[error("Insufficient participants: need {needed}, have {current}")]
    InsufficientParticipants { needed: usize, current: usize },

    #[error("Invalid tournament setup: {0}")]
    InvalidSetup(String),

    #[error("Match {match_id} has no winner")]
    MissingWinner { match_id: MatchId },

    #[error("Match {match_id} names winner {winner_id}, who did not play in it")]
    WinnerNotInMatch {
        match_id: MatchId,
        winner_id: ParticipantId,
    },

    #[error("Match {match_id} is missing a score for participant {participant_id}")]
    MissingScore {
        match_id: MatchId,
        participant_id: ParticipantId,
    },

    #[error("Score {score} for participant {participant_id} is outside 0-100")]
    ScoreOutOfRange { participant_id: ParticipantId, score: u32 },

    #[error("Participant {0} is not an active member of this tournament")]
    UnknownParticipant(ParticipantId),

    #[error("Participant {participant_id} is scheduled {count} times in round {round}")]
    SchedulingConflict {
        participant_id: ParticipantId,
        round: u32,
        count: usize,
    },

    #[error("{format} tournaments require a debate position")]
    PositionRequired { format: TournamentFormat },

    #[error("Round {round} has no matches")]
    EmptyRound { round: u32 },

    #[error("Match {match_id} belongs to round {round}, current round is {current_round}")]
    WrongRound {
        match_id: MatchId,
        round: u32,
        current_round: u32,
    },

    #[error("Match {0} has no opponent to advance")]
    NoOpponent(MatchId),

    #[error("Round {round} left {remaining} participants and no champion")]
    NoChampion { round: u32, remaining: usize },

    #[error("Every participant forfeited round {round}")]
    AllForfeited { round: u32 },

    #[error("Economy error: {0}")]
    Economy(#[from] EconomyError),

    #[error("Champion belt could not be awarded: {0}")]
    BeltAward(#[from] ChallengeError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TournamentError {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            TournamentError::NotFound(_) | TournamentError::MatchNotFound(_) => {
                ErrorKind::NotFound
            }
            TournamentError::TournamentFull
            | TournamentError::AlreadyRegistered(_)
            | TournamentError::InvalidState { .. }
            | TournamentError::InvalidTransition { .. }
            | TournamentError::PositionFull(_)
            | TournamentError::RoundIncomplete { .. }
            | TournamentError::StaleRound { .. }
            | TournamentError::WrongRound { .. }
            | TournamentError::MatchAlreadyFinal(_) => ErrorKind::StateConflict,
            TournamentError::Economy(e) => e.kind(),
            TournamentError::BeltAward(e) => e.kind(),
            TournamentError::Database(_) | TournamentError::Serialization(_) => {
                ErrorKind::Storage
            }
            _ => ErrorKind::Validation,
        }
    }

    /// Get a client-safe error message
    ///
    /// Storage errors are replaced with a generic message so SQL details are
    /// never shown to users.
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Database(_) | TournamentError::Serialization(_) => {
                "Internal server error".to_string()
            }
            TournamentError::BeltAward(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;
