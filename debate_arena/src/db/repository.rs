//! Repository trait definitions for testability and dependency injection.
//!
//! The managers depend only on these traits. Every method that changes more
//! than one row is atomic: the PostgreSQL implementations run it inside one
//! transaction and guard it with the state the caller read, so a concurrent
//! writer turns into a state conflict instead of a lost update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::belt::errors::{ChallengeError, ChallengeResult, EligibilityReason};
use crate::belt::models::{
    Belt, BeltChallenge, BeltId, BeltSettings, BeltStatus, BeltType, BeltVersion, ChallengeDraft,
    ChallengeId, ChallengeStatus,
};
use crate::tournament::errors::{TournamentError, TournamentResult};
use crate::tournament::models::{
    DebatePosition, Match, MatchDraft, MatchId, MatchResult, MatchStatus, Participant,
    ParticipantStatus, ReseedMethod, ScoreBreakdown, Tournament, TournamentFormat, TournamentId,
    TournamentStatus, UserId,
};
use crate::tournament::progression::RoundAdvance;

/// Trait for tournament repository operations
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Insert a tournament, returning its new ID
    async fn insert_tournament(&self, tournament: &Tournament) -> TournamentResult<TournamentId>;

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>>;

    /// Tournaments, newest first, optionally filtered by status
    async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>>;

    /// Move a tournament from `from` to `to`.
    ///
    /// Returns `false` when the stored status is no longer `from`.
    async fn update_status(
        &self,
        id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> TournamentResult<bool>;

    /// Register a user with the next free seed.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidState` - registration is not open
    /// * `TournamentError::TournamentFull` - every seat is taken
    /// * `TournamentError::AlreadyRegistered` - the user already has a seat
    async fn insert_participant(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        position: Option<DebatePosition>,
    ) -> TournamentResult<Participant>;

    /// Participants in seed order
    async fn list_participants(&self, tournament_id: TournamentId)
    -> TournamentResult<Vec<Participant>>;

    /// Matches in round and slot order, optionally for one round
    async fn list_matches(
        &self,
        tournament_id: TournamentId,
        round: Option<u32>,
    ) -> TournamentResult<Vec<Match>>;

    async fn get_match(&self, id: MatchId) -> TournamentResult<Option<Match>>;

    /// Move `REGISTRATION_OPEN -> IN_PROGRESS` and write round-one matches.
    ///
    /// Returns `false` when registration is no longer open.
    async fn start_tournament(
        &self,
        tournament_id: TournamentId,
        total_rounds: u32,
        matches: &[MatchDraft],
        now: DateTime<Utc>,
    ) -> TournamentResult<bool>;

    /// Store a judged result.
    ///
    /// Returns `false` when the match already had a final result.
    async fn record_match_result(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        result: &MatchResult,
    ) -> TournamentResult<bool>;

    /// Persist a whole round transition.
    ///
    /// # Errors
    ///
    /// * `TournamentError::StaleRound` - the round was already advanced
    async fn apply_round_advance(&self, advance: &RoundAdvance) -> TournamentResult<()>;
}

/// Why coins moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoinReason {
    ChallengeEntryFee,
    ChallengeReward,
    ChallengeConsolation,
}

impl CoinReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinReason::ChallengeEntryFee => "CHALLENGE_ENTRY_FEE",
            CoinReason::ChallengeReward => "CHALLENGE_REWARD",
            CoinReason::ChallengeConsolation => "CHALLENGE_CONSOLATION",
        }
    }
}

/// One balance change; negative amounts are debits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinMovement {
    pub user_id: UserId,
    pub amount: i64,
    pub reason: CoinReason,
}

/// Belt to store, guarded by the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct BeltWrite {
    pub expected: BeltVersion,
    pub belt: Belt,
}

/// Challenge state change applied as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeTransition {
    /// Challenge as it should be stored afterwards
    pub challenge: BeltChallenge,
    /// Status the caller read; the write fails if it changed since
    pub expected_status: ChallengeStatus,
    /// Belt to store alongside
    pub belt: Option<BeltWrite>,
    pub coins: Vec<CoinMovement>,
}

impl ChallengeTransition {
    pub fn new(challenge: BeltChallenge, expected_status: ChallengeStatus) -> Self {
        Self {
            challenge,
            expected_status,
            belt: None,
            coins: Vec::new(),
        }
    }

    /// Store `belt` too, provided the stored belt still matches `read`
    pub fn with_belt(mut self, read: &Belt, belt: Belt) -> Self {
        self.belt = Some(BeltWrite {
            expected: read.version(),
            belt,
        });
        self
    }

    pub fn with_coins(mut self, user_id: UserId, amount: i64, reason: CoinReason) -> Self {
        if amount != 0 {
            self.coins.push(CoinMovement {
                user_id,
                amount,
                reason,
            });
        }
        self
    }
}

/// Trait for belt and challenge repository operations
#[async_trait]
pub trait BeltRepository: Send + Sync {
    async fn get_belt(&self, id: BeltId) -> ChallengeResult<Option<Belt>>;

    /// Store a belt read at `expected`.
    ///
    /// # Errors
    ///
    /// * `ChallengeError::BeltChanged` - the stored belt is no longer at `expected`
    async fn save_belt(&self, expected: BeltVersion, belt: &Belt) -> ChallengeResult<()>;

    async fn belt_settings(&self, belt_type: BeltType) -> ChallengeResult<Option<BeltSettings>>;

    async fn get_challenge(&self, id: ChallengeId) -> ChallengeResult<Option<BeltChallenge>>;

    async fn challenges_for_belt(&self, belt_id: BeltId) -> ChallengeResult<Vec<BeltChallenge>>;

    /// Every challenge the user issued, across all belts
    async fn challenges_by_challenger(&self, user_id: UserId)
    -> ChallengeResult<Vec<BeltChallenge>>;

    /// Coin balance; unknown users have none
    async fn coin_balance(&self, user_id: UserId) -> ChallengeResult<i64>;

    async fn user_elo(&self, user_id: UserId) -> ChallengeResult<Option<i32>>;

    /// Insert a pending challenge
    ///
    /// # Errors
    ///
    /// * `ChallengeError::Ineligible(DuplicatePending)` - the pair already has
    ///   an open challenge
    async fn insert_challenge(&self, draft: &ChallengeDraft) -> ChallengeResult<BeltChallenge>;

    /// Apply a challenge transition atomically.
    ///
    /// # Errors
    ///
    /// * `ChallengeError::ConcurrentUpdate` - the challenge left `expected_status`
    /// * `ChallengeError::BeltChanged` - the belt moved on since it was read
    /// * `ChallengeError::Ineligible(InsufficientCoins)` - a debit would
    ///   overdraw a balance
    async fn apply_transition(&self, transition: &ChallengeTransition) -> ChallengeResult<()>;
}

fn column_error(column: &str, raw: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value {raw:?}").into(),
    }
}

fn text_enum<T>(row: &PgRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| column_error(column, &raw))
}

fn count(row: &PgRow, column: &str) -> Result<u32, sqlx::Error> {
    let raw: i32 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| column_error(column, &raw.to_string()))
}

fn opt_count(row: &PgRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    let raw: Option<i32> = row.try_get(column)?;
    raw.map(|v| u32::try_from(v).map_err(|_| column_error(column, &v.to_string())))
        .transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

const TOURNAMENT_COLUMNS: &str = "id, name, format, status, current_round, total_rounds,
    max_participants, reseed_after_round, reseed_method, eliminations_per_round, belt_cost,
    belt_id, champion_id, created_at, started_at, completed_at";

const PARTICIPANT_COLUMNS: &str = "id, tournament_id, user_id, seed, status, selected_position,
    cumulative_score, wins, losses, elimination_round, elimination_reason";

const MATCH_COLUMNS: &str = "id, tournament_id, round, match_number, participant1_id,
    participant2_id, winner_id, participant1_score, participant2_score, participant1_breakdown,
    participant2_breakdown, participant1_feedback, participant2_feedback, status";

fn tournament_from_row(r: &PgRow) -> Result<Tournament, sqlx::Error> {
    Ok(Tournament {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        format: text_enum(r, "format", TournamentFormat::parse)?,
        status: text_enum(r, "status", TournamentStatus::parse)?,
        current_round: count(r, "current_round")?,
        total_rounds: count(r, "total_rounds")?,
        max_participants: count(r, "max_participants")?,
        reseed_after_round: r.try_get("reseed_after_round")?,
        reseed_method: text_enum(r, "reseed_method", ReseedMethod::parse)?,
        eliminations_per_round: count(r, "eliminations_per_round")?,
        belt_cost: r.try_get("belt_cost")?,
        belt_id: r.try_get("belt_id")?,
        champion_id: r.try_get("champion_id")?,
        created_at: r.try_get("created_at")?,
        started_at: r.try_get("started_at")?,
        completed_at: r.try_get("completed_at")?,
    })
}

fn participant_from_row(r: &PgRow) -> Result<Participant, sqlx::Error> {
    let position: Option<String> = r.try_get("selected_position")?;
    let selected_position = match position {
        Some(raw) => Some(
            DebatePosition::parse(&raw).ok_or_else(|| column_error("selected_position", &raw))?,
        ),
        None => None,
    };

    Ok(Participant {
        id: r.try_get("id")?,
        tournament_id: r.try_get("tournament_id")?,
        user_id: r.try_get("user_id")?,
        seed: count(r, "seed")?,
        status: text_enum(r, "status", ParticipantStatus::parse)?,
        selected_position,
        cumulative_score: count(r, "cumulative_score")?,
        wins: count(r, "wins")?,
        losses: count(r, "losses")?,
        elimination_round: opt_count(r, "elimination_round")?,
        elimination_reason: r.try_get("elimination_reason")?,
    })
}

fn match_from_row(r: &PgRow) -> Result<Match, sqlx::Error> {
    let breakdown = |column: &str| -> Result<Option<ScoreBreakdown>, sqlx::Error> {
        Ok(r
            .try_get::<Option<Json<ScoreBreakdown>>, _>(column)?
            .map(|json| json.0))
    };

    Ok(Match {
        id: r.try_get("id")?,
        tournament_id: r.try_get("tournament_id")?,
        round: count(r, "round")?,
        match_number: count(r, "match_number")?,
        participant1_id: r.try_get("participant1_id")?,
        participant2_id: r.try_get("participant2_id")?,
        winner_id: r.try_get("winner_id")?,
        participant1_score: opt_count(r, "participant1_score")?,
        participant2_score: opt_count(r, "participant2_score")?,
        participant1_breakdown: breakdown("participant1_breakdown")?,
        participant2_breakdown: breakdown("participant2_breakdown")?,
        participant1_feedback: r.try_get("participant1_feedback")?,
        participant2_feedback: r.try_get("participant2_feedback")?,
        status: text_enum(r, "status", MatchStatus::parse)?,
    })
}

/// PostgreSQL implementation of `TournamentRepository`
#[derive(Clone)]
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_matches(
        tx: &mut Transaction<'_, Postgres>,
        tournament_id: TournamentId,
        matches: &[MatchDraft],
    ) -> Result<(), sqlx::Error> {
        for draft in matches {
            sqlx::query(
                "INSERT INTO tournament_matches
                    (tournament_id, round, match_number, participant1_id, participant2_id, winner_id, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(tournament_id)
            .bind(draft.round as i32)
            .bind(draft.match_number as i32)
            .bind(draft.participant1_id)
            .bind(draft.participant2_id)
            .bind(draft.winner_id)
            .bind(draft.status.as_str())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn insert_tournament(&self, t: &Tournament) -> TournamentResult<TournamentId> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournaments (name, format, status, current_round, total_rounds, max_participants,
                reseed_after_round, reseed_method, eliminations_per_round, belt_cost, belt_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&t.name)
        .bind(t.format.as_str())
        .bind(t.status.as_str())
        .bind(t.current_round as i32)
        .bind(t.total_rounds as i32)
        .bind(t.max_participants as i32)
        .bind(t.reseed_after_round)
        .bind(t.reseed_method.as_str())
        .bind(t.eliminations_per_round as i32)
        .bind(t.belt_cost)
        .bind(t.belt_id)
        .bind(t.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        let row = sqlx::query(&format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(tournament_from_row).transpose()?)
    }

    async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>> {
        let rows = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments
             WHERE $1::TEXT IS NULL OR status = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(tournament_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn update_status(
        &self,
        id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> TournamentResult<bool> {
        let result = sqlx::query("UPDATE tournaments SET status = $1 WHERE id = $2 AND status = $3")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_participant(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        position: Option<DebatePosition>,
    ) -> TournamentResult<Participant> {
        let mut tx = self.pool.begin().await?;

        // Lock the tournament row so concurrent registrations see each other's seeds
        let row = sqlx::query("SELECT status, max_participants FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;

        let status = text_enum(&row, "status", TournamentStatus::parse)?;
        if status != TournamentStatus::RegistrationOpen {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::RegistrationOpen,
                actual: status,
            });
        }
        let capacity = count(&row, "max_participants")?;

        let existing = sqlx::query(
            "SELECT user_id FROM tournament_participants WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(TournamentError::AlreadyRegistered(user_id));
        }

        let registered: i64 =
            sqlx::query("SELECT COUNT(*) AS registered FROM tournament_participants WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_one(&mut *tx)
                .await?
                .try_get("registered")?;

        if registered >= i64::from(capacity) {
            return Err(TournamentError::TournamentFull);
        }

        let row = sqlx::query(&format!(
            "INSERT INTO tournament_participants (tournament_id, user_id, seed, status, selected_position)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(tournament_id)
        .bind(user_id)
        .bind(registered as i32 + 1)
        .bind(ParticipantStatus::Active.as_str())
        .bind(position.map(|p| p.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        let participant = participant_from_row(&row)?;
        tx.commit().await?;

        Ok(participant)
    }

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Participant>> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM tournament_participants
             WHERE tournament_id = $1 ORDER BY seed"
        ))
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(participant_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn list_matches(
        &self,
        tournament_id: TournamentId,
        round: Option<u32>,
    ) -> TournamentResult<Vec<Match>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM tournament_matches
             WHERE tournament_id = $1 AND ($2::INTEGER IS NULL OR round = $2)
             ORDER BY round, match_number"
        ))
        .bind(tournament_id)
        .bind(round.map(|r| r as i32))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(match_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_match(&self, id: MatchId) -> TournamentResult<Option<Match>> {
        let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM tournament_matches WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(match_from_row).transpose()?)
    }

    async fn start_tournament(
        &self,
        tournament_id: TournamentId,
        total_rounds: u32,
        matches: &[MatchDraft],
        now: DateTime<Utc>,
    ) -> TournamentResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE tournaments
             SET status = $1, current_round = 1, total_rounds = $2, started_at = $3
             WHERE id = $4 AND status = $5",
        )
        .bind(TournamentStatus::InProgress.as_str())
        .bind(total_rounds as i32)
        .bind(now)
        .bind(tournament_id)
        .bind(TournamentStatus::RegistrationOpen.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::insert_matches(&mut tx, tournament_id, matches).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn record_match_result(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        result: &MatchResult,
    ) -> TournamentResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE tournament_matches
            SET status = $1, winner_id = $2, participant1_score = $3, participant2_score = $4,
                participant1_breakdown = $5, participant2_breakdown = $6,
                participant1_feedback = $7, participant2_feedback = $8
            WHERE id = $9 AND status NOT IN ('COMPLETED', 'FORFEITED')
            "#,
        )
        .bind(status.as_str())
        .bind(result.winner_id)
        .bind(result.participant1_score.map(|s| s as i32))
        .bind(result.participant2_score.map(|s| s as i32))
        .bind(result.participant1_breakdown.as_ref().map(Json))
        .bind(result.participant2_breakdown.as_ref().map(Json))
        .bind(&result.participant1_feedback)
        .bind(&result.participant2_feedback)
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn apply_round_advance(&self, advance: &RoundAdvance) -> TournamentResult<()> {
        let t = &advance.tournament;
        let mut tx = self.pool.begin().await?;

        // Optimistic guard: only the first writer for this round wins
        let updated = sqlx::query(
            "UPDATE tournaments
             SET status = $1, current_round = $2, champion_id = $3, completed_at = $4
             WHERE id = $5 AND current_round = $6 AND status = $7",
        )
        .bind(t.status.as_str())
        .bind(t.current_round as i32)
        .bind(t.champion_id)
        .bind(t.completed_at)
        .bind(t.id)
        .bind(advance.completed_round as i32)
        .bind(TournamentStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(TournamentError::StaleRound {
                expected: advance.completed_round,
            });
        }

        for p in &advance.participants {
            sqlx::query(
                "UPDATE tournament_participants
                 SET status = $1, cumulative_score = $2, wins = $3, losses = $4,
                     elimination_round = $5, elimination_reason = $6
                 WHERE id = $7",
            )
            .bind(p.status.as_str())
            .bind(p.cumulative_score as i32)
            .bind(p.wins as i32)
            .bind(p.losses as i32)
            .bind(p.elimination_round.map(|r| r as i32))
            .bind(&p.elimination_reason)
            .bind(p.id)
            .execute(&mut *tx)
            .await?;
        }

        Self::insert_matches(&mut tx, t.id, &advance.next_matches).await?;
        tx.commit().await?;

        Ok(())
    }
}

const CHALLENGE_COLUMNS: &str = "id, belt_id, challenger_id, holder_id, status, entry_fee,
    coin_reward, fee_paid, used_free_challenge, force_accepted, created_at, expires_at,
    responded_at, winner_id, completed_at";

const BELT_COLUMNS: &str = "id, name, belt_type, category, status, current_holder_id,
    became_holder_at, last_defended_at, decline_count, successful_defenses, created_at";

fn belt_from_row(r: &PgRow) -> Result<Belt, sqlx::Error> {
    Ok(Belt {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        belt_type: text_enum(r, "belt_type", BeltType::parse)?,
        category: r.try_get("category")?,
        status: text_enum(r, "status", BeltStatus::parse)?,
        current_holder_id: r.try_get("current_holder_id")?,
        became_holder_at: r.try_get("became_holder_at")?,
        last_defended_at: r.try_get("last_defended_at")?,
        decline_count: count(r, "decline_count")?,
        successful_defenses: count(r, "successful_defenses")?,
        created_at: r.try_get("created_at")?,
    })
}

fn challenge_from_row(r: &PgRow) -> Result<BeltChallenge, sqlx::Error> {
    Ok(BeltChallenge {
        id: r.try_get("id")?,
        belt_id: r.try_get("belt_id")?,
        challenger_id: r.try_get("challenger_id")?,
        holder_id: r.try_get("holder_id")?,
        status: text_enum(r, "status", ChallengeStatus::parse)?,
        entry_fee: r.try_get("entry_fee")?,
        coin_reward: r.try_get("coin_reward")?,
        fee_paid: r.try_get("fee_paid")?,
        used_free_challenge: r.try_get("used_free_challenge")?,
        force_accepted: r.try_get("force_accepted")?,
        created_at: r.try_get("created_at")?,
        expires_at: r.try_get("expires_at")?,
        responded_at: r.try_get("responded_at")?,
        winner_id: r.try_get("winner_id")?,
        completed_at: r.try_get("completed_at")?,
    })
}

fn settings_from_row(r: &PgRow) -> Result<BeltSettings, sqlx::Error> {
    let days = |column: &str| -> Result<i64, sqlx::Error> { Ok(i64::from(r.try_get::<i32, _>(column)?)) };

    Ok(BeltSettings {
        belt_type: text_enum(r, "belt_type", BeltType::parse)?,
        defense_period_days: days("defense_period_days")?,
        inactivity_days: days("inactivity_days")?,
        mandatory_defense_days: days("mandatory_defense_days")?,
        grace_period_days: days("grace_period_days")?,
        max_declines: count(r, "max_declines")?,
        challenge_cooldown_days: days("challenge_cooldown_days")?,
        challenge_expiry_days: days("challenge_expiry_days")?,
        free_challenges_per_week: count(r, "free_challenges_per_week")?,
        elo_range: r.try_get("elo_range")?,
        entry_fee_base: r.try_get("entry_fee_base")?,
        entry_fee_multiplier: r.try_get("entry_fee_multiplier")?,
        winner_reward_percent: count(r, "winner_reward_percent")?,
        loser_consolation_percent: count(r, "loser_consolation_percent")?,
        platform_fee_percent: count(r, "platform_fee_percent")?,
    })
}

/// PostgreSQL implementation of `BeltRepository`
#[derive(Clone)]
pub struct PgBeltRepository {
    pool: PgPool,
}

impl PgBeltRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_belt(
        tx: &mut Transaction<'_, Postgres>,
        expected: BeltVersion,
        belt: &Belt,
    ) -> ChallengeResult<()> {
        let updated = sqlx::query(
            "UPDATE belts
             SET status = $1, current_holder_id = $2, became_holder_at = $3, last_defended_at = $4,
                 decline_count = $5, successful_defenses = $6
             WHERE id = $7 AND current_holder_id IS NOT DISTINCT FROM $8
               AND decline_count = $9 AND successful_defenses = $10",
        )
        .bind(belt.status.as_str())
        .bind(belt.current_holder_id)
        .bind(belt.became_holder_at)
        .bind(belt.last_defended_at)
        .bind(belt.decline_count as i32)
        .bind(belt.successful_defenses as i32)
        .bind(belt.id)
        .bind(expected.holder_id)
        .bind(expected.decline_count as i32)
        .bind(expected.successful_defenses as i32)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ChallengeError::BeltChanged(belt.id));
        }
        Ok(())
    }

    async fn move_coins(
        tx: &mut Transaction<'_, Postgres>,
        challenge_id: ChallengeId,
        movement: &CoinMovement,
    ) -> ChallengeResult<()> {
        // Debits only succeed while the balance covers them
        let updated = sqlx::query(
            "UPDATE users SET coins = coins + $1
             WHERE id = $2 AND coins + $1 >= 0
             RETURNING coins",
        )
        .bind(movement.amount)
        .bind(movement.user_id)
        .fetch_optional(&mut **tx)
        .await?;

        let balance_after: i64 = match updated {
            Some(row) => row.try_get("coins")?,
            None => {
                let available: i64 = sqlx::query("SELECT coins FROM users WHERE id = $1")
                    .bind(movement.user_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .map(|row| row.try_get("coins"))
                    .transpose()?
                    .unwrap_or(0);
                return Err(EligibilityReason::InsufficientCoins {
                    available,
                    required: -movement.amount,
                }
                .into());
            }
        };

        sqlx::query(
            "INSERT INTO coin_transactions (user_id, amount, balance_after, reason, challenge_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(movement.user_id)
        .bind(movement.amount)
        .bind(balance_after)
        .bind(movement.reason.as_str())
        .bind(challenge_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BeltRepository for PgBeltRepository {
    async fn get_belt(&self, id: BeltId) -> ChallengeResult<Option<Belt>> {
        let row = sqlx::query(&format!("SELECT {BELT_COLUMNS} FROM belts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(belt_from_row).transpose()?)
    }

    async fn save_belt(&self, expected: BeltVersion, belt: &Belt) -> ChallengeResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_belt(&mut tx, expected, belt).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn belt_settings(&self, belt_type: BeltType) -> ChallengeResult<Option<BeltSettings>> {
        let row = sqlx::query("SELECT * FROM belt_settings WHERE belt_type = $1")
            .bind(belt_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(settings_from_row).transpose()?)
    }

    async fn get_challenge(&self, id: ChallengeId) -> ChallengeResult<Option<BeltChallenge>> {
        let row = sqlx::query(&format!("SELECT {CHALLENGE_COLUMNS} FROM belt_challenges WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(challenge_from_row).transpose()?)
    }

    async fn challenges_for_belt(&self, belt_id: BeltId) -> ChallengeResult<Vec<BeltChallenge>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM belt_challenges WHERE belt_id = $1 ORDER BY created_at"
        ))
        .bind(belt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(challenge_from_row).collect::<Result<_, _>>()?)
    }

    async fn challenges_by_challenger(
        &self,
        user_id: UserId,
    ) -> ChallengeResult<Vec<BeltChallenge>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM belt_challenges WHERE challenger_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(challenge_from_row).collect::<Result<_, _>>()?)
    }

    async fn coin_balance(&self, user_id: UserId) -> ChallengeResult<i64> {
        let row = sqlx::query("SELECT coins FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get("coins")).transpose()?.unwrap_or(0))
    }

    async fn user_elo(&self, user_id: UserId) -> ChallengeResult<Option<i32>> {
        let row = sqlx::query("SELECT elo_rating FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get("elo_rating")).transpose()?)
    }

    async fn insert_challenge(&self, draft: &ChallengeDraft) -> ChallengeResult<BeltChallenge> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO belt_challenges
                (belt_id, challenger_id, holder_id, status, entry_fee, coin_reward, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {CHALLENGE_COLUMNS}"
        ))
        .bind(draft.belt_id)
        .bind(draft.challenger_id)
        .bind(draft.holder_id)
        .bind(ChallengeStatus::Pending.as_str())
        .bind(draft.entry_fee)
        .bind(draft.coin_reward)
        .bind(draft.created_at)
        .bind(draft.expires_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(challenge_from_row(&row)?),
            Err(e) if is_unique_violation(&e) => Err(EligibilityReason::DuplicatePending.into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_transition(&self, transition: &ChallengeTransition) -> ChallengeResult<()> {
        let c = &transition.challenge;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE belt_challenges
             SET status = $1, fee_paid = $2, used_free_challenge = $3, force_accepted = $4,
                 responded_at = $5, winner_id = $6, completed_at = $7
             WHERE id = $8 AND status = $9 AND completed_at IS NULL",
        )
        .bind(c.status.as_str())
        .bind(c.fee_paid)
        .bind(c.used_free_challenge)
        .bind(c.force_accepted)
        .bind(c.responded_at)
        .bind(c.winner_id)
        .bind(c.completed_at)
        .bind(c.id)
        .bind(transition.expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ChallengeError::ConcurrentUpdate(c.id));
        }

        if let Some(write) = &transition.belt {
            Self::write_belt(&mut tx, write.expected, &write.belt).await?;
        }

        for movement in &transition.coins {
            Self::move_coins(&mut tx, c.id, movement).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
