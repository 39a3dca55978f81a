//! Coin economy calculator.
//!
//! Pure functions deriving coin flows from belt settings:
//! - Challenge entry fees (`base * multiplier^factor`, rounded to whole coins)
//! - Payout splits between winner, loser and platform
//! - Tournament belt cost tiers
//!
//! Nothing in this module performs I/O; every input arrives as an argument.
//!
//! ## Example
//!
//! ```
//! use debate_arena::economy::{PayoutPolicy, entry_fee, payout_split};
//!
//! let fee = entry_fee(100, 1.5, 2).unwrap();
//! assert_eq!(fee, 225);
//!
//! let policy = PayoutPolicy::new(70, 20, 10);
//! let split = payout_split(fee, &policy).unwrap();
//! assert_eq!(split.total(), fee);
//! ```

pub mod calculator;
pub mod errors;

pub use calculator::{
    PayoutPolicy, PayoutSplit, TournamentBeltCosts, entry_fee, payout_split, tournament_belt_cost,
};
pub use errors::{EconomyError, EconomyResult};
