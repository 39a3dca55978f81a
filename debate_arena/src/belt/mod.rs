//! Belt challenge system.
//!
//! Holders defend belts against challengers. A challenge moves through
//! `PENDING -> ACCEPTED | DECLINED | EXPIRED`; expiry is never scheduled, it is
//! observed through [`policy::challenge_status_on`] whenever a challenge is
//! read and written back by [`BeltManager`] on the next decision. A pending
//! challenge also expires once its holder loses the belt.
//!
//! Every belt write names the [`BeltVersion`] it was decided on, so two
//! requests racing on one belt cannot both apply.
//!
//! The rules live in [`policy`] as pure functions of belt, settings, history
//! and time. [`BeltManager`] loads those inputs from a [`BeltRepository`],
//! asks the policy, and persists the outcome as one transition.
//!
//! ## Example
//!
//! ```no_run
//! use debate_arena::belt::BeltManager;
//! use debate_arena::config::EconomyConfig;
//! use debate_arena::db::InMemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::with_default_settings().await;
//!     let belts = BeltManager::new(Arc::new(store), EconomyConfig::default());
//!
//!     let challenge = belts.create_challenge(1, 42, chrono::Utc::now()).await?;
//!     println!("Challenge {} costs {} coins", challenge.id, challenge.entry_fee);
//!     Ok(())
//! }
//! ```
//!
//! [`BeltRepository`]: crate::db::BeltRepository

pub mod errors;
pub mod manager;
pub mod models;
pub mod policy;

pub use errors::{ChallengeError, ChallengeResult, EligibilityReason};
pub use manager::BeltManager;
pub use models::{
    Belt, BeltChallenge, BeltId, BeltSettings, BeltStatus, BeltType, BeltVersion, ChallengeDraft,
    ChallengeId, ChallengeStatus, MAX_SETTING_DAYS,
};
pub use policy::{BeltStanding, ChallengeQuote, DeclineDecision, ForcedReason, Settlement};
