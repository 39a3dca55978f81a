//! Coin conservation tests for challenge payouts.
//!
//! A payout split must never hand out more coins than the pool holds, and
//! must distribute the whole pool when the percentages reach 100. Rounding
//! remainders always land with the platform.

use debate_arena::belt::{BeltSettings, BeltType};
use debate_arena::economy::{PayoutPolicy, entry_fee, payout_split};
use proptest::prelude::*;

#[test]
fn test_default_belt_policies_conserve_every_fee() {
    for belt_type in BeltType::ALL {
        let settings = BeltSettings::defaults_for(belt_type);
        let policy = settings.payout_policy();
        let fee = entry_fee(
            settings.entry_fee_base,
            settings.entry_fee_multiplier,
            belt_type.tier(),
        )
        .unwrap();
        let split = payout_split(fee, &policy).unwrap();

        assert_eq!(
            split.total(),
            fee,
            "{belt_type}: fee {fee} split into {split:?}"
        );
    }
}

#[test]
fn test_small_pools_round_toward_the_platform() {
    let policy = PayoutPolicy::new(70, 20, 10);
    for pool in 0..100 {
        let split = payout_split(pool, &policy).unwrap();
        assert_eq!(split.total(), pool, "pool {pool}: {split:?}");
        assert_eq!(split.winner, pool * 70 / 100);
        assert_eq!(split.loser, pool * 20 / 100);
    }
}

#[test]
fn test_fees_grow_with_belt_prestige() {
    let mut previous = 0;
    for tier in 0..4 {
        let fee = entry_fee(100, 1.5, tier).unwrap();
        assert!(fee > previous, "tier {tier} fee {fee} <= {previous}");
        previous = fee;
    }
}

proptest! {
    #[test]
    fn test_split_never_exceeds_pool(
        pool in 0i64..=10_000_000,
        winner in 0u32..=100,
        loser in 0u32..=100,
        platform in 0u32..=100,
    ) {
        let policy = PayoutPolicy::new(winner, loser, platform);
        match payout_split(pool, &policy) {
            Ok(split) => {
                prop_assert!(policy.total_percent() <= 100);
                prop_assert!(split.winner >= 0 && split.loser >= 0 && split.platform >= 0);
                prop_assert!(split.total() <= pool);
                if policy.total_percent() == 100 {
                    prop_assert_eq!(split.total(), pool);
                }
            }
            Err(_) => prop_assert!(policy.total_percent() > 100),
        }
    }

    #[test]
    fn test_full_split_is_exact(
        pool in 0i64..=i64::MAX / 2,
        winner in 0u32..=100,
        loser_share in 0u32..=100,
    ) {
        let loser = loser_share.min(100 - winner);
        let policy = PayoutPolicy::new(winner, loser, 100 - winner - loser);
        let split = payout_split(pool, &policy).unwrap();
        prop_assert_eq!(split.total(), pool);
        prop_assert!(split.winner <= pool);
    }
}
