//! In-memory repository implementation.
//!
//! Backs both repository traits with a single mutex-guarded state, which makes
//! every trait method trivially atomic. Used by the test suites and by
//! embedders that do not need durable storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::repository::{BeltRepository, ChallengeTransition, CoinMovement, TournamentRepository};
use crate::belt::errors::{ChallengeError, ChallengeResult, EligibilityReason};
use crate::belt::models::{
    Belt, BeltChallenge, BeltId, BeltSettings, BeltType, BeltVersion, ChallengeDraft, ChallengeId,
    ChallengeStatus,
};
use crate::tournament::errors::{TournamentError, TournamentResult};
use crate::tournament::models::{
    DebatePosition, Match, MatchDraft, MatchId, MatchResult, MatchStatus, Participant,
    ParticipantStatus, Tournament, TournamentId, TournamentStatus, UserId,
};
use crate::tournament::progression::RoundAdvance;

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    tournaments: BTreeMap<TournamentId, Tournament>,
    participants: BTreeMap<i64, Participant>,
    matches: BTreeMap<MatchId, Match>,
    belts: BTreeMap<BeltId, Belt>,
    settings: HashMap<BeltType, BeltSettings>,
    challenges: BTreeMap<ChallengeId, BeltChallenge>,
    coins: HashMap<UserId, i64>,
    elo: HashMap<UserId, i32>,
    ledger: Vec<CoinMovement>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// The stored belt must still be at `expected`
    fn check_belt(&self, id: BeltId, expected: BeltVersion) -> ChallengeResult<()> {
        match self.belts.get(&id) {
            Some(stored) if stored.version() == expected => Ok(()),
            Some(_) => Err(ChallengeError::BeltChanged(id)),
            None => Err(ChallengeError::BeltNotFound(id)),
        }
    }

    fn insert_matches(&mut self, tournament_id: TournamentId, drafts: &[MatchDraft]) {
        for draft in drafts {
            let id = self.next_id();
            self.matches.insert(
                id,
                Match {
                    id,
                    tournament_id,
                    round: draft.round,
                    match_number: draft.match_number,
                    participant1_id: draft.participant1_id,
                    participant2_id: draft.participant2_id,
                    winner_id: draft.winner_id,
                    participant1_score: None,
                    participant2_score: None,
                    participant1_breakdown: None,
                    participant2_breakdown: None,
                    participant1_feedback: None,
                    participant2_feedback: None,
                    status: draft.status,
                },
            );
        }
    }
}

/// Process-local store implementing every repository trait
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with development settings for every belt type
    pub async fn with_default_settings() -> Self {
        let store = Self::new();
        for belt_type in BeltType::ALL {
            store.set_settings(BeltSettings::defaults_for(belt_type)).await;
        }
        store
    }

    pub async fn set_settings(&self, settings: BeltSettings) {
        self.state
            .lock()
            .await
            .settings
            .insert(settings.belt_type, settings);
    }

    /// Insert a belt, assigning a fresh ID
    pub async fn insert_belt(&self, mut belt: Belt) -> Belt {
        let mut state = self.state.lock().await;
        belt.id = state.next_id();
        state.belts.insert(belt.id, belt.clone());
        belt
    }

    pub async fn set_coins(&self, user_id: UserId, coins: i64) {
        self.state.lock().await.coins.insert(user_id, coins);
    }

    pub async fn set_elo(&self, user_id: UserId, elo: i32) {
        self.state.lock().await.elo.insert(user_id, elo);
    }

    pub async fn coins(&self, user_id: UserId) -> i64 {
        self.state
            .lock()
            .await
            .coins
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Every coin movement applied so far, oldest first
    pub async fn ledger(&self) -> Vec<CoinMovement> {
        self.state.lock().await.ledger.clone()
    }

    /// Store a match as-is, bypassing the round bookkeeping
    pub async fn put_match(&self, m: Match) {
        self.state.lock().await.matches.insert(m.id, m);
    }

    /// Overwrite a challenge as stored, bypassing every guard
    pub async fn put_challenge(&self, challenge: BeltChallenge) {
        self.state
            .lock()
            .await
            .challenges
            .insert(challenge.id, challenge);
    }
}

#[async_trait]
impl TournamentRepository for InMemoryStore {
    async fn insert_tournament(&self, tournament: &Tournament) -> TournamentResult<TournamentId> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.tournaments.insert(
            id,
            Tournament {
                id,
                ..tournament.clone()
            },
        );
        Ok(id)
    }

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        Ok(self.state.lock().await.tournaments.get(&id).cloned())
    }

    async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .values()
            .rev()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> TournamentResult<bool> {
        let mut state = self.state.lock().await;
        match state.tournaments.get_mut(&id) {
            Some(t) if t.status == from => {
                t.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_participant(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        position: Option<DebatePosition>,
    ) -> TournamentResult<Participant> {
        let mut state = self.state.lock().await;

        let tournament = state
            .tournaments
            .get(&tournament_id)
            .ok_or(TournamentError::NotFound(tournament_id))?;
        if tournament.status != TournamentStatus::RegistrationOpen {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::RegistrationOpen,
                actual: tournament.status,
            });
        }
        let capacity = tournament.max_participants as usize;

        let seats: Vec<&Participant> = state
            .participants
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .collect();
        if seats.iter().any(|p| p.user_id == user_id) {
            return Err(TournamentError::AlreadyRegistered(user_id));
        }
        if seats.len() >= capacity {
            return Err(TournamentError::TournamentFull);
        }
        let seed = seats.len() as u32 + 1;

        let id = state.next_id();
        let participant = Participant {
            id,
            tournament_id,
            user_id,
            seed,
            status: ParticipantStatus::Active,
            selected_position: position,
            cumulative_score: 0,
            wins: 0,
            losses: 0,
            elimination_round: None,
            elimination_reason: None,
        };
        state.participants.insert(id, participant.clone());

        Ok(participant)
    }

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Participant>> {
        let state = self.state.lock().await;
        let mut participants: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.seed);
        Ok(participants)
    }

    async fn list_matches(
        &self,
        tournament_id: TournamentId,
        round: Option<u32>,
    ) -> TournamentResult<Vec<Match>> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .filter(|m| round.is_none_or(|r| m.round == r))
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.round, m.match_number));
        Ok(matches)
    }

    async fn get_match(&self, id: MatchId) -> TournamentResult<Option<Match>> {
        Ok(self.state.lock().await.matches.get(&id).cloned())
    }

    async fn start_tournament(
        &self,
        tournament_id: TournamentId,
        total_rounds: u32,
        matches: &[MatchDraft],
        now: DateTime<Utc>,
    ) -> TournamentResult<bool> {
        let mut state = self.state.lock().await;
        match state.tournaments.get_mut(&tournament_id) {
            Some(t) if t.status == TournamentStatus::RegistrationOpen => {
                t.status = TournamentStatus::InProgress;
                t.current_round = 1;
                t.total_rounds = total_rounds;
                t.started_at = Some(now);
            }
            _ => return Ok(false),
        }
        state.insert_matches(tournament_id, matches);
        Ok(true)
    }

    async fn record_match_result(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        result: &MatchResult,
    ) -> TournamentResult<bool> {
        let mut state = self.state.lock().await;
        let Some(m) = state.matches.get_mut(&match_id) else {
            return Ok(false);
        };
        if m.status.is_terminal() {
            return Ok(false);
        }

        m.status = status;
        m.winner_id = result.winner_id;
        m.participant1_score = result.participant1_score;
        m.participant2_score = result.participant2_score;
        m.participant1_breakdown = result.participant1_breakdown.clone();
        m.participant2_breakdown = result.participant2_breakdown.clone();
        m.participant1_feedback = result.participant1_feedback.clone();
        m.participant2_feedback = result.participant2_feedback.clone();
        Ok(true)
    }

    async fn apply_round_advance(&self, advance: &RoundAdvance) -> TournamentResult<()> {
        let mut state = self.state.lock().await;
        let t = &advance.tournament;

        let stored = state.tournaments.get_mut(&t.id);
        match stored {
            Some(stored)
                if stored.current_round == advance.completed_round
                    && stored.status == TournamentStatus::InProgress =>
            {
                *stored = t.clone();
            }
            _ => {
                return Err(TournamentError::StaleRound {
                    expected: advance.completed_round,
                });
            }
        }

        for p in &advance.participants {
            state.participants.insert(p.id, p.clone());
        }
        state.insert_matches(t.id, &advance.next_matches);
        Ok(())
    }
}

#[async_trait]
impl BeltRepository for InMemoryStore {
    async fn get_belt(&self, id: BeltId) -> ChallengeResult<Option<Belt>> {
        Ok(self.state.lock().await.belts.get(&id).cloned())
    }

    async fn save_belt(&self, expected: BeltVersion, belt: &Belt) -> ChallengeResult<()> {
        let mut state = self.state.lock().await;
        state.check_belt(belt.id, expected)?;
        state.belts.insert(belt.id, belt.clone());
        Ok(())
    }

    async fn belt_settings(&self, belt_type: BeltType) -> ChallengeResult<Option<BeltSettings>> {
        Ok(self.state.lock().await.settings.get(&belt_type).cloned())
    }

    async fn get_challenge(&self, id: ChallengeId) -> ChallengeResult<Option<BeltChallenge>> {
        Ok(self.state.lock().await.challenges.get(&id).cloned())
    }

    async fn challenges_for_belt(&self, belt_id: BeltId) -> ChallengeResult<Vec<BeltChallenge>> {
        let state = self.state.lock().await;
        Ok(state
            .challenges
            .values()
            .filter(|c| c.belt_id == belt_id)
            .cloned()
            .collect())
    }

    async fn challenges_by_challenger(
        &self,
        user_id: UserId,
    ) -> ChallengeResult<Vec<BeltChallenge>> {
        let state = self.state.lock().await;
        Ok(state
            .challenges
            .values()
            .filter(|c| c.challenger_id == user_id)
            .cloned()
            .collect())
    }

    async fn coin_balance(&self, user_id: UserId) -> ChallengeResult<i64> {
        Ok(self.coins(user_id).await)
    }

    async fn user_elo(&self, user_id: UserId) -> ChallengeResult<Option<i32>> {
        Ok(self.state.lock().await.elo.get(&user_id).copied())
    }

    async fn insert_challenge(&self, draft: &ChallengeDraft) -> ChallengeResult<BeltChallenge> {
        let mut state = self.state.lock().await;

        let duplicate = state.challenges.values().any(|c| {
            c.belt_id == draft.belt_id
                && c.challenger_id == draft.challenger_id
                && c.status == ChallengeStatus::Pending
        });
        if duplicate {
            return Err(EligibilityReason::DuplicatePending.into());
        }

        let id = state.next_id();
        let challenge = BeltChallenge {
            id,
            belt_id: draft.belt_id,
            challenger_id: draft.challenger_id,
            holder_id: draft.holder_id,
            status: ChallengeStatus::Pending,
            entry_fee: draft.entry_fee,
            coin_reward: draft.coin_reward,
            fee_paid: 0,
            used_free_challenge: false,
            force_accepted: false,
            created_at: draft.created_at,
            expires_at: draft.expires_at,
            responded_at: None,
            winner_id: None,
            completed_at: None,
        };
        state.challenges.insert(id, challenge.clone());
        Ok(challenge)
    }

    async fn apply_transition(&self, transition: &ChallengeTransition) -> ChallengeResult<()> {
        let mut state = self.state.lock().await;
        let id = transition.challenge.id;

        let current = state
            .challenges
            .get(&id)
            .ok_or(ChallengeError::ChallengeNotFound(id))?;
        if current.status != transition.expected_status || current.completed_at.is_some() {
            return Err(ChallengeError::ConcurrentUpdate(id));
        }
        if let Some(write) = &transition.belt {
            state.check_belt(write.belt.id, write.expected)?;
        }

        // Check every debit before touching anything
        let mut balances = state.coins.clone();
        for movement in &transition.coins {
            let balance = balances.entry(movement.user_id).or_insert(0);
            if *balance + movement.amount < 0 {
                return Err(EligibilityReason::InsufficientCoins {
                    available: *balance,
                    required: -movement.amount,
                }
                .into());
            }
            *balance += movement.amount;
        }

        state.coins = balances;
        state.ledger.extend(transition.coins.iter().cloned());
        state.challenges.insert(id, transition.challenge.clone());
        if let Some(write) = &transition.belt {
            state.belts.insert(write.belt.id, write.belt.clone());
        }
        Ok(())
    }
}
