//! Tournament manager for setting up and running debate tournaments.

use std::sync::Arc;

use chrono::Utc;

use super::errors::{TournamentError, TournamentResult};
use super::models::{
    DebatePosition, Match, MatchId, MatchResult, MatchStatus, NewTournament, Participant,
    ParticipantId, Tournament, TournamentFormat, TournamentId, TournamentStatus, UserId,
    MAX_ROUND_SCORE,
};
use super::progression::{self, RoundAdvance};
use crate::belt::{Belt, BeltManager};
use crate::config::EconomyConfig;
use crate::db::repository::TournamentRepository;
use crate::economy::tournament_belt_cost;

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    repo: Arc<dyn TournamentRepository>,
    config: EconomyConfig,
    belts: Option<BeltManager>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(repo: Arc<dyn TournamentRepository>, config: EconomyConfig) -> Self {
        Self {
            repo,
            config,
            belts: None,
        }
    }

    /// Award champion belts through `belts`
    pub fn with_belts(mut self, belts: BeltManager) -> Self {
        self.belts = Some(belts);
        self
    }

    /// Create a new tournament
    ///
    /// The belt cost is fixed here from the configured size tiers.
    pub async fn create_tournament(&self, new: NewTournament) -> TournamentResult<Tournament> {
        validate_new(&new)?;

        let belt_cost = tournament_belt_cost(new.max_participants, &self.config.tournament_belt_costs);
        let status = if new.open_registration {
            TournamentStatus::RegistrationOpen
        } else {
            TournamentStatus::Upcoming
        };

        let mut tournament = Tournament {
            id: 0,
            name: new.name.trim().to_string(),
            format: new.format,
            status,
            current_round: 0,
            total_rounds: new.total_rounds.unwrap_or(0),
            max_participants: new.max_participants,
            reseed_after_round: new.reseed_after_round,
            reseed_method: new.reseed_method,
            eliminations_per_round: new.eliminations_per_round,
            belt_cost,
            belt_id: new.belt_id,
            champion_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        tournament.id = self.repo.insert_tournament(&tournament).await?;

        log::info!(
            "Created {} tournament {} '{}' for {} participants (belt cost {})",
            tournament.format,
            tournament.id,
            tournament.name,
            tournament.max_participants,
            tournament.belt_cost
        );

        Ok(tournament)
    }

    /// Get a tournament
    pub async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.repo
            .get_tournament(id)
            .await?
            .ok_or(TournamentError::NotFound(id))
    }

    /// List tournaments, newest first
    pub async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>> {
        self.repo.list_tournaments(status).await
    }

    /// Participants in seed order
    pub async fn participants(&self, id: TournamentId) -> TournamentResult<Vec<Participant>> {
        self.repo.list_participants(id).await
    }

    /// Matches of one round, or of the whole tournament
    pub async fn matches(
        &self,
        id: TournamentId,
        round: Option<u32>,
    ) -> TournamentResult<Vec<Match>> {
        self.repo.list_matches(id, round).await
    }

    /// Get a match
    pub async fn get_match(&self, id: MatchId) -> TournamentResult<Match> {
        self.repo
            .get_match(id)
            .await?
            .ok_or(TournamentError::MatchNotFound(id))
    }

    async fn transition(
        &self,
        id: TournamentId,
        to: TournamentStatus,
    ) -> TournamentResult<Tournament> {
        let tournament = self.get_tournament(id).await?;
        if !tournament.status.can_transition_to(to) {
            return Err(TournamentError::InvalidTransition {
                from: tournament.status,
                to,
            });
        }

        if !self.repo.update_status(id, tournament.status, to).await? {
            let current = self.get_tournament(id).await?;
            return Err(TournamentError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        log::info!("Tournament {} moved from {} to {}", id, tournament.status, to);
        Ok(Tournament {
            status: to,
            ..tournament
        })
    }

    /// Open registration for an upcoming tournament
    pub async fn open_registration(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.transition(id, TournamentStatus::RegistrationOpen).await
    }

    /// Cancel a tournament that has not finished
    pub async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.transition(id, TournamentStatus::Cancelled).await
    }

    /// Register a user for a tournament
    ///
    /// Seeds follow registration order. Championship entrants must pick a
    /// side, and each side holds half the field.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidState` - registration is not open
    /// * `TournamentError::PositionRequired` - championship entry without a side
    /// * `TournamentError::PositionFull` - the chosen side is full
    /// * `TournamentError::TournamentFull` / `AlreadyRegistered`
    pub async fn register_participant(
        &self,
        id: TournamentId,
        user_id: UserId,
        position: Option<DebatePosition>,
    ) -> TournamentResult<Participant> {
        let tournament = self.get_tournament(id).await?;
        if tournament.status != TournamentStatus::RegistrationOpen {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::RegistrationOpen,
                actual: tournament.status,
            });
        }

        if tournament.format == TournamentFormat::Championship {
            let side = position.ok_or(TournamentError::PositionRequired {
                format: tournament.format,
            })?;
            let taken = self
                .repo
                .list_participants(id)
                .await?
                .iter()
                .filter(|p| p.selected_position == Some(side))
                .count();
            if taken as u32 >= tournament.max_participants / 2 {
                return Err(TournamentError::PositionFull(side));
            }
        }

        let participant = self.repo.insert_participant(id, user_id, position).await?;

        log::info!(
            "User {} registered for tournament {} as seed {}",
            user_id,
            id,
            participant.seed
        );

        Ok(participant)
    }

    /// Start a tournament and write its first round
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidState` - registration is not open
    /// * `TournamentError::InsufficientParticipants` - too few entrants (a
    ///   championship needs a full field)
    /// * `TournamentError::InvalidSetup` - unbalanced championship sides
    pub async fn start_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self.get_tournament(id).await?;
        if tournament.status != TournamentStatus::RegistrationOpen {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::RegistrationOpen,
                actual: tournament.status,
            });
        }

        let participants = self.repo.list_participants(id).await?;
        let (total_rounds, matches) =
            progression::plan_first_round(&tournament, &participants, self.config.koth_default_rounds)?;

        if !self
            .repo
            .start_tournament(id, total_rounds, &matches, Utc::now())
            .await?
        {
            let current = self.get_tournament(id).await?;
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::RegistrationOpen,
                actual: current.status,
            });
        }

        log::info!(
            "Tournament {} started: {} participants, {} rounds, {} round-one matches",
            id,
            participants.len(),
            total_rounds,
            matches.len()
        );

        self.get_tournament(id).await
    }

    /// Load a match that can still take a result in the current round
    async fn playable_match(&self, match_id: MatchId) -> TournamentResult<(Tournament, Match)> {
        let m = self.get_match(match_id).await?;
        if m.status.is_terminal() {
            return Err(TournamentError::MatchAlreadyFinal(match_id));
        }

        let tournament = self.get_tournament(m.tournament_id).await?;
        if tournament.status != TournamentStatus::InProgress {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::InProgress,
                actual: tournament.status,
            });
        }
        if m.round != tournament.current_round {
            return Err(TournamentError::WrongRound {
                match_id,
                round: m.round,
                current_round: tournament.current_round,
            });
        }

        Ok((tournament, m))
    }

    async fn store_result(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        result: &MatchResult,
    ) -> TournamentResult<Match> {
        if !self.repo.record_match_result(match_id, status, result).await? {
            return Err(TournamentError::MatchAlreadyFinal(match_id));
        }
        self.get_match(match_id).await
    }

    /// Record the judged result of a match
    ///
    /// Winner and scores are checked against the match. A result the round
    /// could not be advanced with (a bracket match without a winner, a ranked
    /// round without both scores) is refused and the match stays open.
    pub async fn record_match_result(
        &self,
        match_id: MatchId,
        result: MatchResult,
    ) -> TournamentResult<Match> {
        let (tournament, m) = self.playable_match(match_id).await?;

        let sides = [
            (m.participant1_id, result.participant1_score),
            (m.participant2_id, result.participant2_score),
        ];
        for (participant, score) in sides {
            if let (Some(participant_id), Some(score)) = (participant, score) {
                if score > MAX_ROUND_SCORE {
                    return Err(TournamentError::ScoreOutOfRange {
                        participant_id,
                        score,
                    });
                }
            }
        }

        if let Some(winner_id) = result.winner_id {
            if !m.involves(winner_id) {
                return Err(TournamentError::WinnerNotInMatch { match_id, winner_id });
            }
        }
        progression::check_result(&tournament, &m, &result)?;

        let stored = self
            .store_result(match_id, MatchStatus::Completed, &result)
            .await?;

        log::info!(
            "Recorded result for match {} (round {}): winner {:?}",
            match_id,
            stored.round,
            stored.winner_id
        );

        Ok(stored)
    }

    /// Record that `forfeiting_id` forfeited a match
    ///
    /// The opponent, if any, is recorded as winner.
    pub async fn forfeit_match(
        &self,
        match_id: MatchId,
        forfeiting_id: ParticipantId,
    ) -> TournamentResult<Match> {
        let (tournament, m) = self.playable_match(match_id).await?;
        if !m.involves(forfeiting_id) {
            return Err(TournamentError::UnknownParticipant(forfeiting_id));
        }

        let winner_id = m.opponent_of(forfeiting_id);
        if winner_id.is_none() && tournament.format == TournamentFormat::Bracket {
            return Err(TournamentError::NoOpponent(match_id));
        }

        let result = MatchResult {
            winner_id,
            ..MatchResult::default()
        };
        let stored = self
            .store_result(match_id, MatchStatus::Forfeited, &result)
            .await?;

        log::info!(
            "Participant {} forfeited match {} (round {})",
            forfeiting_id,
            match_id,
            stored.round
        );

        Ok(stored)
    }

    /// Apply the results of the current round.
    ///
    /// Either the whole transition is stored or nothing is; two callers racing
    /// on the same round see one success and one `StaleRound`. When the final
    /// round completes and the tournament carries a belt, the belt goes to the
    /// champion. A failed award is logged and can be retried with
    /// [`TournamentManager::award_champion_belt`].
    pub async fn advance_round(&self, id: TournamentId) -> TournamentResult<RoundAdvance> {
        let tournament = self.get_tournament(id).await?;
        let participants = self.repo.list_participants(id).await?;
        let matches = self
            .repo
            .list_matches(id, Some(tournament.current_round))
            .await?;

        let advance = progression::advance(&tournament, &participants, &matches, Utc::now())?;
        self.repo.apply_round_advance(&advance).await?;

        if advance.is_final() {
            if let Err(e) = self.award_champion_belt(id).await {
                log::error!("Tournament {id} completed but its belt was not awarded: {e}");
            }
        }

        Ok(advance)
    }

    /// Give the tournament belt to the champion's user.
    ///
    /// Returns `None` when the tournament has no belt or no belt manager is
    /// configured. Safe to repeat.
    pub async fn award_champion_belt(&self, id: TournamentId) -> TournamentResult<Option<Belt>> {
        let tournament = self.get_tournament(id).await?;
        let (Some(belt_id), Some(belts)) = (tournament.belt_id, &self.belts) else {
            return Ok(None);
        };

        if tournament.status != TournamentStatus::Completed {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::Completed,
                actual: tournament.status,
            });
        }
        let champion_id = tournament.champion_id.ok_or(TournamentError::NoChampion {
            round: tournament.current_round,
            remaining: 0,
        })?;

        let champion = self
            .repo
            .list_participants(id)
            .await?
            .into_iter()
            .find(|p| p.id == champion_id)
            .ok_or(TournamentError::UnknownParticipant(champion_id))?;

        let belt = belts.award_belt(belt_id, champion.user_id, Utc::now()).await?;
        Ok(Some(belt))
    }
}

fn validate_new(new: &NewTournament) -> TournamentResult<()> {
    if new.name.trim().is_empty() {
        return Err(TournamentError::InvalidSetup(
            "tournament name must not be empty".to_string(),
        ));
    }

    if new.max_participants < 2 {
        return Err(TournamentError::InvalidSetup(format!(
            "at least 2 participants required, got {}",
            new.max_participants
        )));
    }

    match new.format {
        TournamentFormat::Championship if !new.max_participants.is_power_of_two() => {
            Err(TournamentError::InvalidSetup(format!(
                "championship size must be a power of two, got {}",
                new.max_participants
            )))
        }
        TournamentFormat::KingOfTheHill if new.eliminations_per_round == 0 => Err(
            TournamentError::InvalidSetup("eliminations per round must be at least 1".to_string()),
        ),
        TournamentFormat::KingOfTheHill if new.total_rounds == Some(0) => Err(
            TournamentError::InvalidSetup("at least one round required".to_string()),
        ),
        TournamentFormat::Bracket | TournamentFormat::Championship if new.total_rounds.is_some() => {
            Err(TournamentError::InvalidSetup(format!(
                "{} round count follows from the field size",
                new.format
            )))
        }
        _ => Ok(()),
    }
}
