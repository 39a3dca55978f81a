//! Tournament module for bracket, championship and King of the Hill events.
//!
//! This module provides tournament management functionality including:
//! - Tournament creation and registration
//! - Seeding, byes and pairing ([`seeding`])
//! - Round progression for all three formats ([`progression`])
//! - Elimination tracking and champion selection
//!
//! ## Example
//!
//! ```no_run
//! use debate_arena::config::EconomyConfig;
//! use debate_arena::db::InMemoryStore;
//! use debate_arena::tournament::{NewTournament, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TournamentManager::new(Arc::new(InMemoryStore::new()), EconomyConfig::default());
//!
//!     let tournament = manager
//!         .create_tournament(NewTournament::bracket("Sunday Open", 8))
//!         .await?;
//!     for user_id in 1..=8 {
//!         manager.register_participant(tournament.id, user_id, None).await?;
//!     }
//!     manager.start_tournament(tournament.id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod progression;
pub mod seeding;

pub use errors::{TournamentError, TournamentResult};
pub use manager::TournamentManager;
pub use models::{
    DebatePosition, Match, MatchDraft, MatchId, MatchResult, MatchStatus, NewTournament,
    Participant, ParticipantId, ParticipantStatus, ReseedMethod, ScoreBreakdown, Tournament,
    TournamentFormat, TournamentId, TournamentStatus, UserId, display_reason,
};
pub use progression::RoundAdvance;
