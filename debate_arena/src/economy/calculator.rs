//! Entry fee, payout and belt cost calculations.

use serde::{Deserialize, Serialize};

use super::errors::{EconomyError, EconomyResult};

/// Percentage split applied to a challenge or tournament pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPolicy {
    /// Share of the pool paid to the winner
    pub winner_reward_percent: u32,
    /// Share of the pool paid to the loser
    pub loser_consolation_percent: u32,
    /// Share of the pool retained by the platform
    pub platform_fee_percent: u32,
}

impl PayoutPolicy {
    pub fn new(winner: u32, loser: u32, platform: u32) -> Self {
        Self {
            winner_reward_percent: winner,
            loser_consolation_percent: loser,
            platform_fee_percent: platform,
        }
    }

    /// Sum of the three percentages
    pub fn total_percent(&self) -> u32 {
        self.winner_reward_percent
            .saturating_add(self.loser_consolation_percent)
            .saturating_add(self.platform_fee_percent)
    }

    /// Reject policies that would hand out more than the pool
    pub fn validate(&self) -> EconomyResult<()> {
        let sum = self.total_percent();
        if sum > 100 {
            return Err(EconomyError::PercentagesExceedTotal { sum });
        }
        Ok(())
    }
}

/// Coins credited to each party from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSplit {
    pub winner: i64,
    pub loser: i64,
    pub platform: i64,
}

impl PayoutSplit {
    /// Total coins distributed
    pub fn total(&self) -> i64 {
        self.winner + self.loser + self.platform
    }
}

/// Belt cost per tournament size tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentBeltCosts {
    /// Up to 8 participants
    pub small: i64,
    /// Up to 31 participants
    pub medium: i64,
    /// 32 participants and more
    pub large: i64,
}

impl Default for TournamentBeltCosts {
    fn default() -> Self {
        Self {
            small: 500,
            medium: 1_000,
            large: 2_500,
        }
    }
}

impl TournamentBeltCosts {
    pub fn validate(&self) -> EconomyResult<()> {
        for cost in [self.small, self.medium, self.large] {
            if cost < 0 {
                return Err(EconomyError::InvalidBeltCost(cost));
            }
        }
        Ok(())
    }
}

/// Compute a challenge entry fee: `base * multiplier^context_factor`, rounded
/// to the nearest whole coin.
///
/// # Errors
///
/// * `EconomyError::InvalidFeeBase` - negative base
/// * `EconomyError::InvalidMultiplier` - negative, NaN or infinite multiplier
/// * `EconomyError::FeeOverflow` - result does not fit in `i64`
pub fn entry_fee(base: i64, multiplier: f64, context_factor: u32) -> EconomyResult<i64> {
    if base < 0 {
        return Err(EconomyError::InvalidFeeBase(base));
    }
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(EconomyError::InvalidMultiplier(multiplier));
    }

    let exponent = i32::try_from(context_factor).map_err(|_| EconomyError::FeeOverflow)?;
    let fee = (base as f64 * multiplier.powi(exponent)).round();

    if !fee.is_finite() || fee >= i64::MAX as f64 {
        return Err(EconomyError::FeeOverflow);
    }

    Ok(fee as i64)
}

/// Split a pool between winner, loser and platform.
///
/// Each share is floored; the rounding remainder of the combined percentage
/// goes to the platform, so the split never exceeds the pool and equals it
/// exactly when the percentages total 100.
pub fn payout_split(total_pool: i64, policy: &PayoutPolicy) -> EconomyResult<PayoutSplit> {
    if total_pool < 0 {
        return Err(EconomyError::NegativePool(total_pool));
    }
    policy.validate()?;

    let pool = i128::from(total_pool);
    let share = |percent: u32| pool * i128::from(percent) / 100;

    let winner = share(policy.winner_reward_percent);
    let loser = share(policy.loser_consolation_percent);
    let distributed = share(policy.total_percent());
    let platform = distributed - winner - loser;

    // Every share is bounded by `total_pool`, so the narrowing cannot fail
    Ok(PayoutSplit {
        winner: winner as i64,
        loser: loser as i64,
        platform: platform as i64,
    })
}

/// Pick the belt cost tier for a tournament of `size` participants.
///
/// Evaluated once when the tournament is created.
pub fn tournament_belt_cost(size: u32, costs: &TournamentBeltCosts) -> i64 {
    match size {
        0..=8 => costs.small,
        9..=31 => costs.medium,
        _ => costs.large,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_fee_base_case() {
        assert_eq!(entry_fee(100, 2.0, 0).unwrap(), 100);
        assert_eq!(entry_fee(100, 2.0, 3).unwrap(), 800);
    }

    #[test]
    fn test_entry_fee_rounds_to_nearest_coin() {
        // 50 * 1.25^3 = 97.65625
        assert_eq!(entry_fee(50, 1.25, 3).unwrap(), 98);
        // 10 * 1.25 = 12.5 rounds away from zero
        assert_eq!(entry_fee(10, 1.25, 1).unwrap(), 13);
    }

    #[test]
    fn test_entry_fee_rejects_bad_inputs() {
        assert_eq!(entry_fee(-1, 1.0, 1), Err(EconomyError::InvalidFeeBase(-1)));
        assert!(matches!(
            entry_fee(10, f64::NAN, 1),
            Err(EconomyError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            entry_fee(10, -1.5, 1),
            Err(EconomyError::InvalidMultiplier(_))
        ));
        assert_eq!(entry_fee(i64::MAX / 2, 10.0, 4), Err(EconomyError::FeeOverflow));
    }

    #[test]
    fn test_payout_split_full_distribution() {
        let policy = PayoutPolicy::new(70, 20, 10);
        let split = payout_split(1000, &policy).unwrap();
        assert_eq!(split.winner, 700);
        assert_eq!(split.loser, 200);
        assert_eq!(split.platform, 100);
        assert_eq!(split.total(), 1000);
    }

    #[test]
    fn test_payout_split_remainder_goes_to_platform() {
        let policy = PayoutPolicy::new(70, 20, 10);
        let split = payout_split(7, &policy).unwrap();
        // 4.9 -> 4, 1.4 -> 1, remainder 2
        assert_eq!(split.winner, 4);
        assert_eq!(split.loser, 1);
        assert_eq!(split.platform, 2);
        assert_eq!(split.total(), 7);
    }

    #[test]
    fn test_payout_split_under_hundred_percent() {
        let policy = PayoutPolicy::new(60, 20, 5);
        let split = payout_split(1000, &policy).unwrap();
        assert_eq!(split.total(), 850);
    }

    #[test]
    fn test_payout_split_rejects_overcommitted_policy() {
        let policy = PayoutPolicy::new(80, 20, 10);
        assert_eq!(
            payout_split(1000, &policy),
            Err(EconomyError::PercentagesExceedTotal { sum: 110 })
        );
        assert_eq!(
            EconomyError::PercentagesExceedTotal { sum: 110 }.kind(),
            crate::error::ErrorKind::Configuration
        );
    }

    #[test]
    fn test_payout_split_zero_and_negative_pool() {
        let policy = PayoutPolicy::new(70, 20, 10);
        assert_eq!(payout_split(0, &policy).unwrap().total(), 0);
        assert_eq!(payout_split(-5, &policy), Err(EconomyError::NegativePool(-5)));
    }

    #[test]
    fn test_tournament_belt_cost_tiers() {
        let costs = TournamentBeltCosts {
            small: 100,
            medium: 200,
            large: 300,
        };
        assert_eq!(tournament_belt_cost(4, &costs), 100);
        assert_eq!(tournament_belt_cost(8, &costs), 100);
        assert_eq!(tournament_belt_cost(16, &costs), 200);
        assert_eq!(tournament_belt_cost(31, &costs), 200);
        assert_eq!(tournament_belt_cost(32, &costs), 300);
        assert_eq!(tournament_belt_cost(128, &costs), 300);
    }
}
