//! Belt manager: runs the challenge state machine against a repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::errors::{ChallengeError, ChallengeResult, EligibilityReason};
use super::models::{
    Belt, BeltChallenge, BeltId, BeltSettings, BeltStatus, BeltType, ChallengeDraft, ChallengeId,
    ChallengeStatus,
};
use super::policy::{
    self, BeltStanding, ChallengeRequest, DeclineDecision, Settlement, challenge_status_on,
    check_settings,
};
use crate::config::EconomyConfig;
use crate::db::repository::{BeltRepository, ChallengeTransition, CoinReason};
use crate::tournament::models::UserId;

/// Belt manager
#[derive(Clone)]
pub struct BeltManager {
    repo: Arc<dyn BeltRepository>,
    config: EconomyConfig,
}

impl BeltManager {
    /// Create a new belt manager
    pub fn new(repo: Arc<dyn BeltRepository>, config: EconomyConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    async fn load_belt(&self, id: BeltId) -> ChallengeResult<Belt> {
        self.repo
            .get_belt(id)
            .await?
            .ok_or(ChallengeError::BeltNotFound(id))
    }

    async fn load_challenge(&self, id: ChallengeId) -> ChallengeResult<BeltChallenge> {
        self.repo
            .get_challenge(id)
            .await?
            .ok_or(ChallengeError::ChallengeNotFound(id))
    }

    async fn settings_for(&self, belt_type: BeltType) -> ChallengeResult<BeltSettings> {
        let settings = self
            .repo
            .belt_settings(belt_type)
            .await?
            .ok_or(ChallengeError::MissingSettings(belt_type))?;
        check_settings(&settings)?;
        Ok(settings)
    }

    /// Write back an expiry that has so far only been observed
    async fn persist_expiry(&self, challenge: &BeltChallenge) -> ChallengeResult<BeltChallenge> {
        let mut expired = challenge.clone();
        expired.status = ChallengeStatus::Expired;

        match self
            .repo
            .apply_transition(&ChallengeTransition::new(expired.clone(), ChallengeStatus::Pending))
            .await
        {
            Ok(()) => {
                log::info!(
                    "Challenge {} on belt {} expired unanswered",
                    challenge.id,
                    challenge.belt_id
                );
                Ok(expired)
            }
            // Someone else already moved it on
            Err(ChallengeError::ConcurrentUpdate(id)) => self.load_challenge(id).await,
            Err(e) => Err(e),
        }
    }

    /// Challenges on a belt, with overdue or orphaned pending ones expired in storage
    async fn belt_challenges(
        &self,
        belt: &Belt,
        now: DateTime<Utc>,
    ) -> ChallengeResult<Vec<BeltChallenge>> {
        let mut challenges = self.repo.challenges_for_belt(belt.id).await?;
        for challenge in &mut challenges {
            if challenge.status == ChallengeStatus::Pending
                && challenge_status_on(challenge, belt, now) == ChallengeStatus::Expired
            {
                *challenge = self.persist_expiry(challenge).await?;
            }
        }
        Ok(challenges)
    }

    /// Load a challenge that must still be answerable at `now`, with its belt
    async fn open_challenge(
        &self,
        id: ChallengeId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<(BeltChallenge, Belt)> {
        let challenge = self.load_challenge(id).await?;
        let belt = self.load_belt(challenge.belt_id).await?;

        match challenge_status_on(&challenge, &belt, now) {
            ChallengeStatus::Pending => Ok((challenge, belt)),
            ChallengeStatus::Expired => {
                if challenge.status == ChallengeStatus::Pending {
                    self.persist_expiry(&challenge).await?;
                }
                Err(ChallengeError::Expired(id))
            }
            status => Err(ChallengeError::AlreadyResolved { id, status }),
        }
    }

    /// Issue a challenge for a belt.
    ///
    /// # Errors
    ///
    /// * `ChallengeError::BeltNotFound` - no such belt
    /// * `ChallengeError::MissingSettings` / `InvalidSettings` - belt type is
    ///   not configured
    /// * `ChallengeError::Ineligible` - a policy rule rejected the request
    pub async fn create_challenge(
        &self,
        belt_id: BeltId,
        challenger_id: UserId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltChallenge> {
        let mut belt = self.load_belt(belt_id).await?;
        let settings = self.settings_for(belt.belt_type).await?;

        let on_belt = self.belt_challenges(&belt, now).await?;
        let belt_has_pending = on_belt.iter().any(|c| c.status == ChallengeStatus::Pending);
        let history = self.repo.challenges_by_challenger(challenger_id).await?;
        let challenger_coins = self.repo.coin_balance(challenger_id).await?;

        let (challenger_elo, holder_elo) = match belt.current_holder_id {
            Some(holder_id) if settings.elo_range > 0 => (
                self.repo.user_elo(challenger_id).await?,
                self.repo.user_elo(holder_id).await?,
            ),
            _ => (None, None),
        };

        let request = ChallengeRequest {
            belt: &belt,
            settings: &settings,
            challenger_id,
            challenger_coins,
            challenger_elo,
            holder_elo,
            history: &history,
            belt_has_pending,
            require_coins: self.config.require_coins_for_challenge,
            now,
        };

        let quote = match policy::evaluate_challenge(&request) {
            Ok(quote) => quote,
            Err(e) => {
                log::debug!(
                    "User {} may not challenge belt {}: {}",
                    challenger_id,
                    belt_id,
                    e
                );
                return Err(e);
            }
        };

        let holder_id = belt
            .current_holder_id
            .ok_or(ChallengeError::Ineligible(EligibilityReason::BeltVacant))?;

        if quote.standing == BeltStanding::Inactive && belt.status != BeltStatus::Inactive {
            let read = belt.version();
            belt.status = BeltStatus::Inactive;
            self.repo.save_belt(read, &belt).await?;
            log::warn!(
                "Belt {} marked inactive; holder {} has not defended since {:?}",
                belt.id,
                holder_id,
                belt.last_active_at()
            );
        }

        let challenge = self
            .repo
            .insert_challenge(&ChallengeDraft {
                belt_id,
                challenger_id,
                holder_id,
                entry_fee: quote.entry_fee,
                coin_reward: quote.coin_reward,
                created_at: now,
                expires_at: now + settings.challenge_expiry(),
            })
            .await?;

        log::info!(
            "User {} challenged user {} for belt {} (challenge {}, fee {})",
            challenger_id,
            holder_id,
            belt_id,
            challenge.id,
            challenge.entry_fee
        );

        Ok(challenge)
    }

    fn ensure_holder(
        belt: &Belt,
        challenge: &BeltChallenge,
        responder_id: UserId,
    ) -> ChallengeResult<()> {
        if challenge.holder_id != responder_id || belt.current_holder_id != Some(responder_id) {
            return Err(EligibilityReason::NotHolder.into());
        }
        Ok(())
    }

    /// Accept against `belt` as read; the write fails if the belt moved since.
    async fn accept(
        &self,
        challenge: BeltChallenge,
        belt: &Belt,
        settings: &BeltSettings,
        forced: bool,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltChallenge> {
        let history = self
            .repo
            .challenges_by_challenger(challenge.challenger_id)
            .await?;
        let coins = self.repo.coin_balance(challenge.challenger_id).await?;

        let plan = policy::plan_acceptance(
            &challenge,
            settings,
            &history,
            coins,
            self.config.require_coins_for_challenge,
            forced,
            now,
        )?;

        let mut accepted = challenge;
        accepted.status = ChallengeStatus::Accepted;
        accepted.responded_at = Some(now);
        accepted.fee_paid = plan.charge;
        accepted.used_free_challenge = plan.use_free_slot;
        accepted.force_accepted = forced;

        let transition = ChallengeTransition::new(accepted.clone(), ChallengeStatus::Pending)
            .with_belt(belt, belt.clone())
            .with_coins(
                accepted.challenger_id,
                -plan.charge,
                CoinReason::ChallengeEntryFee,
            );
        self.repo.apply_transition(&transition).await?;

        log::info!(
            "Challenge {} accepted (fee paid {}, free slot {})",
            accepted.id,
            accepted.fee_paid,
            accepted.used_free_challenge
        );

        Ok(accepted)
    }

    /// Holder accepts a pending challenge.
    ///
    /// Uses one of the challenger's free weekly slots when available, otherwise
    /// debits the entry fee.
    ///
    /// # Errors
    ///
    /// * `ChallengeError::Expired` - the challenge lapsed before the answer, or
    ///   the challenged holder has since lost the belt
    /// * `ChallengeError::AlreadyResolved` - it was already answered
    /// * `ChallengeError::Ineligible(NotHolder)` - `holder_id` does not hold the belt
    /// * `ChallengeError::Ineligible(InsufficientCoins)` - the challenger can
    ///   no longer pay
    /// * `ChallengeError::BeltChanged` - the belt changed hands mid-answer
    pub async fn accept_challenge(
        &self,
        id: ChallengeId,
        holder_id: UserId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltChallenge> {
        let (challenge, belt) = self.open_challenge(id, now).await?;
        Self::ensure_holder(&belt, &challenge, holder_id)?;
        let settings = self.settings_for(belt.belt_type).await?;

        self.accept(challenge, &belt, &settings, false, now).await
    }

    /// Holder declines a pending challenge.
    ///
    /// A holder out of declines, or overdue for a defense, cannot decline: the
    /// challenge comes back accepted with `force_accepted` set.
    pub async fn decline_challenge(
        &self,
        id: ChallengeId,
        holder_id: UserId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltChallenge> {
        let (challenge, belt) = self.open_challenge(id, now).await?;
        Self::ensure_holder(&belt, &challenge, holder_id)?;
        let settings = self.settings_for(belt.belt_type).await?;

        match policy::decide_decline(&belt, &settings, now) {
            DeclineDecision::Decline { decline_count } => {
                let mut declined = challenge;
                declined.status = ChallengeStatus::Declined;
                declined.responded_at = Some(now);
                let mut updated = belt.clone();
                updated.decline_count = decline_count;

                let transition = ChallengeTransition::new(declined.clone(), ChallengeStatus::Pending)
                    .with_belt(&belt, updated);
                self.repo.apply_transition(&transition).await?;

                log::info!(
                    "Challenge {} declined by holder {} ({} of {} declines used)",
                    declined.id,
                    holder_id,
                    decline_count,
                    settings.max_declines
                );
                Ok(declined)
            }
            DeclineDecision::ForceAccept(reason) => {
                log::warn!(
                    "Holder {} cannot decline challenge {} ({:?}); accepting",
                    holder_id,
                    challenge.id,
                    reason
                );
                self.accept(challenge, &belt, &settings, true, now).await
            }
        }
    }

    /// Record who won the debate for an accepted challenge and settle it.
    ///
    /// When the challenged holder lost the belt elsewhere before this debate
    /// finished, only coins are settled.
    ///
    /// # Errors
    ///
    /// * `ChallengeError::AlreadyResolved` / `OutcomeRecorded` - not an open
    ///   accepted challenge
    /// * `ChallengeError::NotAParticipant` - `winner_id` was not in the debate
    /// * `ChallengeError::BeltChanged` - the belt moved while settling; a retry
    ///   settles against the new holder
    pub async fn record_challenge_outcome(
        &self,
        id: ChallengeId,
        winner_id: UserId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<Settlement> {
        let challenge = self.load_challenge(id).await?;
        let belt = self.load_belt(challenge.belt_id).await?;
        let settings = self.settings_for(belt.belt_type).await?;

        let settlement = policy::settle_challenge(&challenge, &belt, &settings, winner_id, now)?;

        let challenged_holder = challenge.holder_id;
        let mut completed = challenge;
        completed.winner_id = Some(winner_id);
        completed.completed_at = Some(now);

        let mut transition = ChallengeTransition::new(completed, ChallengeStatus::Accepted);
        if settlement.title_at_stake {
            transition = transition.with_belt(&belt, settlement.belt.clone());
        }
        let transition = transition
            .with_coins(
                settlement.winner_id,
                settlement.payout.winner,
                CoinReason::ChallengeReward,
            )
            .with_coins(
                settlement.loser_id,
                settlement.payout.loser,
                CoinReason::ChallengeConsolation,
            );
        self.repo.apply_transition(&transition).await?;

        if !settlement.title_at_stake {
            log::warn!(
                "Challenge {} settled for coins only; user {} no longer holds belt {}",
                id,
                challenged_holder,
                belt.id
            );
        } else if settlement.title_changed {
            log::info!(
                "Belt {} transferred from user {} to user {}",
                belt.id,
                settlement.loser_id,
                settlement.winner_id
            );
        } else {
            log::info!(
                "User {} defended belt {} ({} successful defenses)",
                settlement.winner_id,
                belt.id,
                settlement.belt.successful_defenses
            );
        }

        Ok(settlement)
    }

    /// Give a belt to `user_id` outright, e.g. a vacant belt or a tournament prize.
    ///
    /// Awarding a belt to its current holder changes nothing.
    pub async fn award_belt(
        &self,
        belt_id: BeltId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<Belt> {
        let mut belt = self.load_belt(belt_id).await?;
        if belt.current_holder_id == Some(user_id) {
            return Ok(belt);
        }

        let read = belt.version();
        let previous = belt.current_holder_id;
        belt.transfer_to(user_id, now);
        self.repo.save_belt(read, &belt).await?;

        log::info!(
            "Belt {} awarded to user {} (previous holder {:?})",
            belt_id,
            user_id,
            previous
        );

        Ok(belt)
    }

    /// Challenge with its status as of `now`.
    ///
    /// Overdue pending challenges, and those whose holder has lost the belt,
    /// read as expired even before anything has written the expiry back.
    pub async fn get_challenge(
        &self,
        id: ChallengeId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltChallenge> {
        let mut challenge = self.load_challenge(id).await?;
        let belt = self.load_belt(challenge.belt_id).await?;
        challenge.status = challenge_status_on(&challenge, &belt, now);
        Ok(challenge)
    }

    /// How a belt can be challenged at `now`
    pub async fn belt_standing(
        &self,
        belt_id: BeltId,
        now: DateTime<Utc>,
    ) -> ChallengeResult<BeltStanding> {
        let belt = self.load_belt(belt_id).await?;
        let settings = self.settings_for(belt.belt_type).await?;
        let has_pending = self
            .repo
            .challenges_for_belt(belt_id)
            .await?
            .iter()
            .any(|c| challenge_status_on(c, &belt, now) == ChallengeStatus::Pending);

        Ok(policy::belt_standing(&belt, &settings, has_pending, now))
    }
}
