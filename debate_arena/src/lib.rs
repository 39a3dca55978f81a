//! # Debate Arena
//!
//! Tournament progression and belt-challenge economy engine for an AI-judged
//! debate platform.
//!
//! The engine is split into pure decision code and thin async managers:
//!
//! - [`tournament::progression`] turns a tournament snapshot and its judged
//!   round into the complete next state for all three formats:
//!   - **Bracket**: single elimination, match winners advance
//!   - **Championship**: PRO and CON groups ranked by round score
//!   - **King of the Hill**: lowest cumulative scores drop out each round
//! - [`belt::policy`] decides challenge eligibility, expiry, forced
//!   acceptance and settlement for title belts.
//! - [`economy`] prices challenges and splits coin pools.
//!
//! [`TournamentManager`] and [`BeltManager`] load inputs from a repository,
//! call the pure code and persist the outcome atomically. PostgreSQL and
//! in-memory repositories live in [`db`].
//!
//! ## Core Modules
//!
//! - [`tournament`]: tournaments, participants, matches and round progression
//! - [`belt`]: belts, challenges and the challenge state machine
//! - [`economy`]: entry fees, payouts and belt costs
//! - [`db`]: connection pool and repositories
//! - [`config`]: environment-driven economy settings
//!
//! ## Example
//!
//! ```
//! use debate_arena::economy::{TournamentBeltCosts, tournament_belt_cost};
//!
//! let cost = tournament_belt_cost(16, &TournamentBeltCosts::default());
//! assert_eq!(cost, 1000);
//! ```

/// Belt challenge policy and manager.
pub mod belt;
pub use belt::{BeltManager, ChallengeError};

/// Environment configuration.
pub mod config;
pub use config::{ConfigError, EconomyConfig};

/// Database pool and repositories.
pub mod db;

/// Coin economy calculator.
pub mod economy;

/// Shared error taxonomy.
pub mod error;
pub use error::ErrorKind;

/// Tournament progression engine.
pub mod tournament;
pub use tournament::{TournamentError, TournamentManager};
