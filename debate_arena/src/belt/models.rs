//! Belt and challenge data models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::economy::PayoutPolicy;
use crate::tournament::models::UserId;

/// Belt ID type
pub type BeltId = i64;

/// Challenge ID type
pub type ChallengeId = i64;

/// Belt type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeltType {
    Rookie,
    Category,
    Championship,
    Undefeated,
    Tournament,
}

impl BeltType {
    pub const ALL: [BeltType; 5] = [
        BeltType::Rookie,
        BeltType::Category,
        BeltType::Championship,
        BeltType::Undefeated,
        BeltType::Tournament,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BeltType::Rookie => "ROOKIE",
            BeltType::Category => "CATEGORY",
            BeltType::Championship => "CHAMPIONSHIP",
            BeltType::Undefeated => "UNDEFEATED",
            BeltType::Tournament => "TOURNAMENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ROOKIE" => Some(BeltType::Rookie),
            "CATEGORY" => Some(BeltType::Category),
            "CHAMPIONSHIP" => Some(BeltType::Championship),
            "UNDEFEATED" => Some(BeltType::Undefeated),
            "TOURNAMENT" => Some(BeltType::Tournament),
            _ => None,
        }
    }

    /// Prestige tier, used as the entry fee exponent
    pub fn tier(&self) -> u32 {
        match self {
            BeltType::Rookie => 0,
            BeltType::Category => 1,
            BeltType::Undefeated | BeltType::Tournament => 2,
            BeltType::Championship => 3,
        }
    }
}

impl std::fmt::Display for BeltType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored belt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeltStatus {
    Active,
    /// Holder went quiet; anyone may challenge without the usual checks
    Inactive,
    /// No holder
    Vacant,
}

impl BeltStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeltStatus::Active => "ACTIVE",
            BeltStatus::Inactive => "INACTIVE",
            BeltStatus::Vacant => "VACANT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(BeltStatus::Active),
            "INACTIVE" => Some(BeltStatus::Inactive),
            "VACANT" => Some(BeltStatus::Vacant),
            _ => None,
        }
    }
}

/// Belt record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belt {
    pub id: BeltId,
    pub name: String,
    pub belt_type: BeltType,
    pub category: Option<String>,
    pub status: BeltStatus,
    pub current_holder_id: Option<UserId>,
    pub became_holder_at: Option<DateTime<Utc>>,
    pub last_defended_at: Option<DateTime<Utc>>,
    /// Declines since the last defense
    pub decline_count: u32,
    pub successful_defenses: u32,
    pub created_at: DateTime<Utc>,
}

impl Belt {
    /// Last time the holder proved activity: last defense, else when they took the belt
    pub fn last_active_at(&self) -> Option<DateTime<Utc>> {
        self.last_defended_at.or(self.became_holder_at)
    }

    /// Hand the belt to a new holder
    pub fn transfer_to(&mut self, holder: UserId, now: DateTime<Utc>) {
        self.current_holder_id = Some(holder);
        self.became_holder_at = Some(now);
        self.last_defended_at = Some(now);
        self.decline_count = 0;
        self.successful_defenses = 0;
        self.status = BeltStatus::Active;
    }

    /// Fields a belt decision depends on
    pub fn version(&self) -> BeltVersion {
        BeltVersion {
            holder_id: self.current_holder_id,
            decline_count: self.decline_count,
            successful_defenses: self.successful_defenses,
        }
    }

    /// Record a successful title defense
    pub fn record_defense(&mut self, now: DateTime<Utc>) {
        self.last_defended_at = Some(now);
        self.decline_count = 0;
        self.successful_defenses += 1;
        self.status = BeltStatus::Active;
    }
}

/// Snapshot of the belt state a decision was made on.
///
/// Belt writes carry the version they were read at and fail when the stored
/// belt has moved on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltVersion {
    pub holder_id: Option<UserId>,
    pub decline_count: u32,
    pub successful_defenses: u32,
}

/// Challenge status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "PENDING",
            ChallengeStatus::Accepted => "ACCEPTED",
            ChallengeStatus::Declined => "DECLINED",
            ChallengeStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ChallengeStatus::Pending),
            "ACCEPTED" => Some(ChallengeStatus::Accepted),
            "DECLINED" => Some(ChallengeStatus::Declined),
            "EXPIRED" => Some(ChallengeStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeStatus::Pending)
    }
}

impl std::fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Belt challenge record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltChallenge {
    pub id: ChallengeId,
    pub belt_id: BeltId,
    pub challenger_id: UserId,
    /// Holder at the time the challenge was issued
    pub holder_id: UserId,
    pub status: ChallengeStatus,
    pub entry_fee: i64,
    pub coin_reward: i64,
    /// Coins actually debited from the challenger on acceptance
    pub fee_paid: i64,
    /// A weekly free slot paid for this challenge
    pub used_free_challenge: bool,
    /// Accepted because the holder could no longer decline
    pub force_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub winner_id: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Challenge to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDraft {
    pub belt_id: BeltId,
    pub challenger_id: UserId,
    pub holder_id: UserId,
    pub entry_fee: i64,
    pub coin_reward: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Longest period any day-based setting may span
pub const MAX_SETTING_DAYS: i64 = 36_500;

/// Admin-configured policy for one belt type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltSettings {
    pub belt_type: BeltType,
    /// Expected defense cadence, shown to holders
    pub defense_period_days: i64,
    pub inactivity_days: i64,
    pub mandatory_defense_days: i64,
    pub grace_period_days: i64,
    pub max_declines: u32,
    pub challenge_cooldown_days: i64,
    pub challenge_expiry_days: i64,
    pub free_challenges_per_week: u32,
    /// Maximum ELO gap between challenger and holder (0 disables the check)
    pub elo_range: i32,
    pub entry_fee_base: i64,
    pub entry_fee_multiplier: f64,
    pub winner_reward_percent: u32,
    pub loser_consolation_percent: u32,
    pub platform_fee_percent: u32,
}

impl BeltSettings {
    /// Development defaults for a belt type
    pub fn defaults_for(belt_type: BeltType) -> Self {
        let (entry_fee_base, grace_period_days, inactivity_days) = match belt_type {
            BeltType::Rookie => (25, 3, 30),
            BeltType::Category => (50, 7, 45),
            BeltType::Undefeated => (75, 7, 60),
            BeltType::Tournament => (100, 14, 60),
            BeltType::Championship => (100, 14, 90),
        };

        Self {
            belt_type,
            defense_period_days: 30,
            inactivity_days,
            mandatory_defense_days: 21,
            grace_period_days,
            max_declines: 2,
            challenge_cooldown_days: 7,
            challenge_expiry_days: 3,
            free_challenges_per_week: 1,
            elo_range: 0,
            entry_fee_base,
            entry_fee_multiplier: 1.5,
            winner_reward_percent: 70,
            loser_consolation_percent: 20,
            platform_fee_percent: 10,
        }
    }

    pub fn payout_policy(&self) -> PayoutPolicy {
        PayoutPolicy::new(
            self.winner_reward_percent,
            self.loser_consolation_percent,
            self.platform_fee_percent,
        )
    }

    pub fn challenge_expiry(&self) -> Duration {
        Duration::days(self.challenge_expiry_days)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        let day_fields = [
            ("defense_period_days", self.defense_period_days),
            ("inactivity_days", self.inactivity_days),
            ("mandatory_defense_days", self.mandatory_defense_days),
            ("grace_period_days", self.grace_period_days),
            ("challenge_cooldown_days", self.challenge_cooldown_days),
            ("challenge_expiry_days", self.challenge_expiry_days),
        ];
        for (name, days) in day_fields {
            if days < 0 {
                return Err(format!("{name} must not be negative"));
            }
            if days > MAX_SETTING_DAYS {
                return Err(format!("{name} must be at most {MAX_SETTING_DAYS} days"));
            }
        }

        if self.challenge_expiry_days == 0 {
            return Err("challenge_expiry_days must be at least 1".to_string());
        }

        if self.elo_range < 0 {
            return Err("elo_range must not be negative".to_string());
        }

        if self.entry_fee_base < 0 {
            return Err("entry_fee_base must not be negative".to_string());
        }

        if !self.entry_fee_multiplier.is_finite() || self.entry_fee_multiplier < 0.0 {
            return Err("entry_fee_multiplier must be a non-negative number".to_string());
        }

        let policy = self.payout_policy();
        if policy.total_percent() > 100 {
            return Err(format!(
                "reward, consolation and platform percentages sum to {}%",
                policy.total_percent()
            ));
        }

        Ok(())
    }
}
