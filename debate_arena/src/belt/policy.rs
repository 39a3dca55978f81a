//! Belt challenge policy.
//!
//! Pure decision functions for the challenge state machine
//! (`PENDING -> ACCEPTED | DECLINED | EXPIRED`). Settings and the current time
//! are always passed in; nothing here reads clocks or global state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ChallengeError, ChallengeResult, EligibilityReason};
use super::models::{Belt, BeltChallenge, BeltSettings, BeltStatus, ChallengeStatus};
use crate::economy::{self, PayoutSplit};
use crate::tournament::models::UserId;

/// Rolling window for free challenges
pub const FREE_CHALLENGE_WINDOW_DAYS: i64 = 7;

/// Effective status of a challenge at `now`.
///
/// A pending challenge past its expiry reads as `EXPIRED` even before the
/// transition has been written back.
pub fn resolve_challenge_status(challenge: &BeltChallenge, now: DateTime<Utc>) -> ChallengeStatus {
    if challenge.status == ChallengeStatus::Pending && now > challenge.expires_at {
        ChallengeStatus::Expired
    } else {
        challenge.status
    }
}

/// Effective status of a challenge against the belt as it stands at `now`.
///
/// Besides lapsing, a pending challenge expires once its holder has lost the
/// belt: nobody is left who may answer it.
pub fn challenge_status_on(challenge: &BeltChallenge, belt: &Belt, now: DateTime<Utc>) -> ChallengeStatus {
    match resolve_challenge_status(challenge, now) {
        ChallengeStatus::Pending if belt.current_holder_id != Some(challenge.holder_id) => {
            ChallengeStatus::Expired
        }
        status => status,
    }
}

/// How a belt can currently be challenged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "standing", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeltStanding {
    /// Nobody holds the belt
    Vacant,
    /// Holder took the belt recently and cannot be challenged yet
    Protected { until: DateTime<Utc> },
    /// Normal rules apply
    Open,
    /// Holder is overdue; the next challenge cannot be declined
    MandatoryDefense,
    /// Holder has gone quiet with nothing pending; anyone may challenge
    Inactive,
}

/// `at` plus `days`, or `None` when that leaves chrono's range
fn days_after(at: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|span| at.checked_add_signed(span))
}

fn older_than(moment: Option<DateTime<Utc>>, days: i64, now: DateTime<Utc>) -> bool {
    moment
        .and_then(|at| days_after(at, days))
        .is_some_and(|deadline| now > deadline)
}

/// Classify a belt at `now`.
///
/// `has_pending` must reflect pending challenges that are not yet expired.
pub fn belt_standing(
    belt: &Belt,
    settings: &BeltSettings,
    has_pending: bool,
    now: DateTime<Utc>,
) -> BeltStanding {
    if belt.current_holder_id.is_none() || belt.status == BeltStatus::Vacant {
        return BeltStanding::Vacant;
    }

    let last_active = belt.last_active_at();
    if !has_pending
        && (belt.status == BeltStatus::Inactive
            || older_than(last_active, settings.inactivity_days, now))
    {
        return BeltStanding::Inactive;
    }

    if let Some(became_holder_at) = belt.became_holder_at {
        match days_after(became_holder_at, settings.grace_period_days) {
            Some(until) if now < until => return BeltStanding::Protected { until },
            Some(_) => {}
            None => {
                return BeltStanding::Protected {
                    until: DateTime::<Utc>::MAX_UTC,
                };
            }
        }
    }

    if older_than(last_active, settings.mandatory_defense_days, now) {
        return BeltStanding::MandatoryDefense;
    }

    BeltStanding::Open
}

/// Free challenges `challenger_id` consumed in the rolling window ending at `now`.
///
/// Slots are consumed on acceptance, so the acceptance time is what counts.
pub fn free_challenges_used(
    history: &[BeltChallenge],
    challenger_id: UserId,
    now: DateTime<Utc>,
) -> u32 {
    let window_start = now - Duration::days(FREE_CHALLENGE_WINDOW_DAYS);
    history
        .iter()
        .filter(|c| c.challenger_id == challenger_id && c.used_free_challenge)
        .filter(|c| c.responded_at.is_some_and(|at| at > window_start && at <= now))
        .count() as u32
}

/// Everything the policy needs to judge a new challenge
#[derive(Debug, Clone)]
pub struct ChallengeRequest<'a> {
    pub belt: &'a Belt,
    pub settings: &'a BeltSettings,
    pub challenger_id: UserId,
    pub challenger_coins: i64,
    pub challenger_elo: Option<i32>,
    pub holder_elo: Option<i32>,
    /// Challenges the challenger issued, across all belts
    pub history: &'a [BeltChallenge],
    /// Any non-expired pending challenge exists on this belt
    pub belt_has_pending: bool,
    pub require_coins: bool,
    pub now: DateTime<Utc>,
}

/// Terms of an eligible challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeQuote {
    pub entry_fee: i64,
    pub coin_reward: i64,
    pub standing: BeltStanding,
    /// A free slot would cover this challenge if accepted now
    pub free_slot_available: bool,
}

pub(crate) fn check_settings(settings: &BeltSettings) -> ChallengeResult<()> {
    settings
        .validate()
        .map_err(|reason| ChallengeError::InvalidSettings {
            belt_type: settings.belt_type,
            reason,
        })
}

/// Decide whether a challenge may be created and on what terms.
///
/// # Errors
///
/// * `ChallengeError::InvalidSettings` - settings are unusable
/// * `ChallengeError::Ineligible` - a rule rejected the request; the reason
///   code says which
pub fn evaluate_challenge(request: &ChallengeRequest<'_>) -> ChallengeResult<ChallengeQuote> {
    let ChallengeRequest {
        belt,
        settings,
        challenger_id,
        now,
        ..
    } = *request;

    check_settings(settings)?;

    let Some(holder_id) = belt.current_holder_id else {
        return Err(EligibilityReason::BeltVacant.into());
    };
    if challenger_id == holder_id {
        return Err(EligibilityReason::ChallengerIsHolder.into());
    }

    let standing = belt_standing(belt, settings, request.belt_has_pending, now);
    let free_slot_available = free_challenges_used(request.history, challenger_id, now)
        < settings.free_challenges_per_week;

    if standing == BeltStanding::Inactive {
        log::debug!(
            "Belt {} is inactive; challenge from user {} bypasses eligibility checks",
            belt.id,
            challenger_id
        );
        return Ok(ChallengeQuote {
            entry_fee: 0,
            coin_reward: 0,
            standing,
            free_slot_available,
        });
    }

    if let BeltStanding::Protected { until } = standing {
        return Err(EligibilityReason::GracePeriod { until }.into());
    }

    let previous = request
        .history
        .iter()
        .filter(|c| c.belt_id == belt.id && c.challenger_id == challenger_id);

    if let Some(latest) = previous.clone().max_by_key(|c| c.created_at) {
        let until = days_after(latest.created_at, settings.challenge_cooldown_days)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < until {
            return Err(EligibilityReason::Cooldown { until }.into());
        }
    }

    if previous
        .clone()
        .any(|c| challenge_status_on(c, belt, now) == ChallengeStatus::Pending)
    {
        return Err(EligibilityReason::DuplicatePending.into());
    }

    if settings.elo_range > 0 {
        if let (Some(challenger), Some(holder)) = (request.challenger_elo, request.holder_elo) {
            let gap = (challenger - holder).abs();
            if gap > settings.elo_range {
                return Err(EligibilityReason::EloOutOfRange {
                    gap,
                    allowed: settings.elo_range,
                }
                .into());
            }
        }
    }

    let entry_fee = economy::entry_fee(
        settings.entry_fee_base,
        settings.entry_fee_multiplier,
        belt.belt_type.tier(),
    )?;
    let coin_reward = economy::payout_split(entry_fee, &settings.payout_policy())?.winner;

    if request.require_coins && !free_slot_available && request.challenger_coins < entry_fee {
        return Err(EligibilityReason::InsufficientCoins {
            available: request.challenger_coins,
            required: entry_fee,
        }
        .into());
    }

    Ok(ChallengeQuote {
        entry_fee,
        coin_reward,
        standing,
        free_slot_available,
    })
}

/// How an accepted challenge is paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptancePlan {
    /// Coins to debit from the challenger
    pub charge: i64,
    pub use_free_slot: bool,
}

/// Work out payment for accepting `challenge` at `now`.
///
/// A free slot is used when one is left in the window; otherwise the entry fee
/// is charged. A forced acceptance never fails on payment: when the challenger
/// can no longer cover the fee it is waived.
pub fn plan_acceptance(
    challenge: &BeltChallenge,
    settings: &BeltSettings,
    history: &[BeltChallenge],
    challenger_coins: i64,
    require_coins: bool,
    forced: bool,
    now: DateTime<Utc>,
) -> ChallengeResult<AcceptancePlan> {
    let free = AcceptancePlan {
        charge: 0,
        use_free_slot: false,
    };

    if !require_coins || challenge.entry_fee == 0 {
        return Ok(free);
    }

    if free_challenges_used(history, challenge.challenger_id, now) < settings.free_challenges_per_week {
        return Ok(AcceptancePlan {
            charge: 0,
            use_free_slot: true,
        });
    }

    if challenger_coins >= challenge.entry_fee {
        return Ok(AcceptancePlan {
            charge: challenge.entry_fee,
            use_free_slot: false,
        });
    }

    if forced {
        return Ok(free);
    }

    Err(EligibilityReason::InsufficientCoins {
        available: challenger_coins,
        required: challenge.entry_fee,
    }
    .into())
}

/// Why a decline was turned into an acceptance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForcedReason {
    /// Holder already used every allowed decline
    DeclineLimit,
    /// Holder has not defended within the mandatory window
    MandatoryDefense,
}

/// Outcome of a holder's attempt to decline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineDecision {
    Decline { decline_count: u32 },
    ForceAccept(ForcedReason),
}

/// Decide what a decline does.
///
/// Once `decline_count >= max_declines`, or the holder is past the mandatory
/// defense window, the challenge is accepted instead.
pub fn decide_decline(belt: &Belt, settings: &BeltSettings, now: DateTime<Utc>) -> DeclineDecision {
    if belt.decline_count >= settings.max_declines {
        return DeclineDecision::ForceAccept(ForcedReason::DeclineLimit);
    }

    if older_than(belt.last_active_at(), settings.mandatory_defense_days, now) {
        return DeclineDecision::ForceAccept(ForcedReason::MandatoryDefense);
    }

    DeclineDecision::Decline {
        decline_count: (belt.decline_count + 1).min(settings.max_declines),
    }
}

/// Belt and coin consequences of a finished challenge debate
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub belt: Belt,
    pub winner_id: UserId,
    pub loser_id: UserId,
    pub payout: PayoutSplit,
    /// The challenged holder still held the belt, so the debate decided it
    pub title_at_stake: bool,
    /// The challenger took the belt
    pub title_changed: bool,
}

/// Settle an accepted challenge won by `winner_id`.
///
/// Coins are always paid out. The belt only moves, or records a defense,
/// while the challenged holder still holds it; a debate against a former
/// holder leaves the belt with whoever holds it now.
pub fn settle_challenge(
    challenge: &BeltChallenge,
    belt: &Belt,
    settings: &BeltSettings,
    winner_id: UserId,
    now: DateTime<Utc>,
) -> ChallengeResult<Settlement> {
    if challenge.status != ChallengeStatus::Accepted {
        return Err(ChallengeError::AlreadyResolved {
            id: challenge.id,
            status: challenge.status,
        });
    }
    if challenge.winner_id.is_some() {
        return Err(ChallengeError::OutcomeRecorded(challenge.id));
    }

    let loser_id = if winner_id == challenge.challenger_id {
        challenge.holder_id
    } else if winner_id == challenge.holder_id {
        challenge.challenger_id
    } else {
        return Err(ChallengeError::NotAParticipant {
            id: challenge.id,
            user_id: winner_id,
        });
    };

    let payout = economy::payout_split(challenge.fee_paid, &settings.payout_policy())?;

    let mut belt = belt.clone();
    let title_at_stake = belt.current_holder_id == Some(challenge.holder_id);
    let title_changed = title_at_stake && winner_id == challenge.challenger_id;
    if title_changed {
        belt.transfer_to(winner_id, now);
    } else if title_at_stake {
        belt.record_defense(now);
    }

    Ok(Settlement {
        belt,
        winner_id,
        loser_id,
        payout,
        title_at_stake,
        title_changed,
    })
}
