//! Tournament data models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tournament ID type
pub type TournamentId = i64;

/// Participant ID type
pub type ParticipantId = i64;

/// Match ID type
pub type MatchId = i64;

/// User ID type
pub type UserId = i64;

/// Highest score a judge can award a debater in a single round
pub const MAX_ROUND_SCORE: u32 = 100;

/// Tournament format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentFormat {
    /// Single elimination; match winners advance
    Bracket,
    /// Per-position score ranking; match outcome only decides the final
    Championship,
    /// Survival; lowest cumulative scorers are eliminated each round
    KingOfTheHill,
}

impl TournamentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentFormat::Bracket => "BRACKET",
            TournamentFormat::Championship => "CHAMPIONSHIP",
            TournamentFormat::KingOfTheHill => "KING_OF_THE_HILL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BRACKET" => Some(TournamentFormat::Bracket),
            "CHAMPIONSHIP" => Some(TournamentFormat::Championship),
            "KING_OF_THE_HILL" => Some(TournamentFormat::KingOfTheHill),
            _ => None,
        }
    }
}

impl std::fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    Upcoming,
    RegistrationOpen,
    InProgress,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "UPCOMING",
            TournamentStatus::RegistrationOpen => "REGISTRATION_OPEN",
            TournamentStatus::InProgress => "IN_PROGRESS",
            TournamentStatus::Completed => "COMPLETED",
            TournamentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UPCOMING" => Some(TournamentStatus::Upcoming),
            "REGISTRATION_OPEN" => Some(TournamentStatus::RegistrationOpen),
            "IN_PROGRESS" => Some(TournamentStatus::InProgress),
            "COMPLETED" => Some(TournamentStatus::Completed),
            "CANCELLED" => Some(TournamentStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled tournaments never change status again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Completed | TournamentStatus::Cancelled
        )
    }

    /// Whether moving to `next` keeps the lifecycle monotonic
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, next),
            (Upcoming, RegistrationOpen)
                | (RegistrationOpen, InProgress)
                | (InProgress, Completed)
                | (Upcoming | RegistrationOpen | InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How advancing participants are re-paired between rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReseedMethod {
    /// Seed ascending
    ByOriginalSeed,
    /// Cumulative score descending, then seed ascending
    ByCurrentScore,
}

impl ReseedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReseedMethod::ByOriginalSeed => "BY_ORIGINAL_SEED",
            ReseedMethod::ByCurrentScore => "BY_CURRENT_SCORE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BY_ORIGINAL_SEED" => Some(ReseedMethod::ByOriginalSeed),
            "BY_CURRENT_SCORE" => Some(ReseedMethod::ByCurrentScore),
            _ => None,
        }
    }
}

/// Side a debater argues in a Championship tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebatePosition {
    Pro,
    Con,
}

impl DebatePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebatePosition::Pro => "PRO",
            DebatePosition::Con => "CON",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRO" => Some(DebatePosition::Pro),
            "CON" => Some(DebatePosition::Con),
            _ => None,
        }
    }
}

impl std::fmt::Display for DebatePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Active,
    Eliminated,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Active => "ACTIVE",
            ParticipantStatus::Eliminated => "ELIMINATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(ParticipantStatus::Active),
            "ELIMINATED" => Some(ParticipantStatus::Eliminated),
            _ => None,
        }
    }
}

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    InProgress,
    Completed,
    Forfeited,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::InProgress => "IN_PROGRESS",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Forfeited => "FORFEITED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(MatchStatus::Pending),
            "IN_PROGRESS" => Some(MatchStatus::InProgress),
            "COMPLETED" => Some(MatchStatus::Completed),
            "FORFEITED" => Some(MatchStatus::Forfeited),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Forfeited)
    }
}

/// Per-criterion judge scores.
///
/// Judging criteria are admin-configurable, so the breakdown is keyed by
/// criterion name rather than a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(pub BTreeMap<String, u32>);

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: impl Into<String>, score: u32) -> Self {
        self.0.insert(criterion.into(), score);
        self
    }

    pub fn get(&self, criterion: &str) -> Option<u32> {
        self.0.get(criterion).copied()
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }
}

/// Tournament record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    /// Round being played (0 before the tournament starts)
    pub current_round: u32,
    /// Number of rounds, fixed when the tournament starts
    pub total_rounds: u32,
    pub max_participants: u32,
    pub reseed_after_round: bool,
    pub reseed_method: ReseedMethod,
    /// King of the Hill: participants eliminated after each non-final round
    pub eliminations_per_round: u32,
    /// Coins charged for the tournament belt, computed once at creation
    pub belt_cost: i64,
    /// Belt awarded to the champion, if any
    pub belt_id: Option<i64>,
    pub champion_id: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tournament creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub format: TournamentFormat,
    pub max_participants: u32,
    pub reseed_after_round: bool,
    pub reseed_method: ReseedMethod,
    /// King of the Hill only; defaults to the configured round count
    pub total_rounds: Option<u32>,
    /// King of the Hill only
    pub eliminations_per_round: u32,
    pub belt_id: Option<i64>,
    /// Open registration immediately instead of starting as `UPCOMING`
    pub open_registration: bool,
}

impl NewTournament {
    /// Single elimination bracket with no reseeding
    pub fn bracket(name: impl Into<String>, max_participants: u32) -> Self {
        Self {
            name: name.into(),
            format: TournamentFormat::Bracket,
            max_participants,
            reseed_after_round: false,
            reseed_method: ReseedMethod::ByOriginalSeed,
            total_rounds: None,
            eliminations_per_round: 0,
            belt_id: None,
            open_registration: true,
        }
    }

    /// Position-ranked championship
    pub fn championship(name: impl Into<String>, max_participants: u32) -> Self {
        Self {
            format: TournamentFormat::Championship,
            ..Self::bracket(name, max_participants)
        }
    }

    /// Survival format eliminating `eliminations_per_round` each round
    pub fn king_of_the_hill(
        name: impl Into<String>,
        max_participants: u32,
        eliminations_per_round: u32,
    ) -> Self {
        Self {
            format: TournamentFormat::KingOfTheHill,
            eliminations_per_round,
            ..Self::bracket(name, max_participants)
        }
    }

    pub fn with_reseeding(mut self, method: ReseedMethod) -> Self {
        self.reseed_after_round = true;
        self.reseed_method = method;
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.total_rounds = Some(rounds);
        self
    }

    pub fn with_belt(mut self, belt_id: i64) -> Self {
        self.belt_id = Some(belt_id);
        self
    }
}

/// Tournament participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    /// Unique within the tournament; lower is stronger
    pub seed: u32,
    pub status: ParticipantStatus,
    pub selected_position: Option<DebatePosition>,
    pub cumulative_score: u32,
    pub wins: u32,
    pub losses: u32,
    pub elimination_round: Option<u32>,
    pub elimination_reason: Option<String>,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }
}

/// Tournament match (one debate)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    /// Slot order within the round, starting at 1
    pub match_number: u32,
    pub participant1_id: Option<ParticipantId>,
    pub participant2_id: Option<ParticipantId>,
    pub winner_id: Option<ParticipantId>,
    pub participant1_score: Option<u32>,
    pub participant2_score: Option<u32>,
    pub participant1_breakdown: Option<ScoreBreakdown>,
    pub participant2_breakdown: Option<ScoreBreakdown>,
    pub participant1_feedback: Option<String>,
    pub participant2_feedback: Option<String>,
    pub status: MatchStatus,
}

impl Match {
    /// Participants named in this match
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participant1_id.into_iter().chain(self.participant2_id)
    }

    pub fn involves(&self, participant_id: ParticipantId) -> bool {
        self.participant1_id == Some(participant_id) || self.participant2_id == Some(participant_id)
    }

    /// Only one side is named (bye or solo heat)
    pub fn is_single_sided(&self) -> bool {
        self.participant1_id.is_some() != self.participant2_id.is_some()
    }

    pub fn score_for(&self, participant_id: ParticipantId) -> Option<u32> {
        if self.participant1_id == Some(participant_id) {
            self.participant1_score
        } else if self.participant2_id == Some(participant_id) {
            self.participant2_score
        } else {
            None
        }
    }

    pub fn feedback_for(&self, participant_id: ParticipantId) -> Option<&str> {
        if self.participant1_id == Some(participant_id) {
            self.participant1_feedback.as_deref()
        } else if self.participant2_id == Some(participant_id) {
            self.participant2_feedback.as_deref()
        } else {
            None
        }
    }

    /// The other named participant, if any
    pub fn opponent_of(&self, participant_id: ParticipantId) -> Option<ParticipantId> {
        if self.participant1_id == Some(participant_id) {
            self.participant2_id
        } else if self.participant2_id == Some(participant_id) {
            self.participant1_id
        } else {
            None
        }
    }
}

/// Match to be inserted for an upcoming round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDraft {
    pub round: u32,
    pub match_number: u32,
    pub participant1_id: Option<ParticipantId>,
    pub participant2_id: Option<ParticipantId>,
    /// Set for byes, which are written already completed
    pub winner_id: Option<ParticipantId>,
    pub status: MatchStatus,
}

/// Judged result of a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner_id: Option<ParticipantId>,
    pub participant1_score: Option<u32>,
    pub participant2_score: Option<u32>,
    pub participant1_breakdown: Option<ScoreBreakdown>,
    pub participant2_breakdown: Option<ScoreBreakdown>,
    pub participant1_feedback: Option<String>,
    pub participant2_feedback: Option<String>,
}

impl MatchResult {
    pub fn scored(participant1_score: u32, participant2_score: u32) -> Self {
        Self {
            participant1_score: Some(participant1_score),
            participant2_score: Some(participant2_score),
            ..Self::default()
        }
    }

    pub fn with_winner(mut self, winner_id: ParticipantId) -> Self {
        self.winner_id = Some(winner_id);
        self
    }

    pub fn with_feedback(mut self, participant1: Option<String>, participant2: Option<String>) -> Self {
        self.participant1_feedback = participant1;
        self.participant2_feedback = participant2;
        self
    }
}

/// Shorten an elimination reason for display.
///
/// Stored reasons are never truncated; this is for rendering only.
pub fn display_reason(reason: &str, max_chars: usize) -> String {
    if reason.chars().count() <= max_chars {
        return reason.to_string();
    }
    let mut short: String = reason.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
