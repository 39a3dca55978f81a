//! Round progression engine.
//!
//! [`advance`] takes a snapshot of a tournament, its roster and its matches
//! and returns the complete next state as a [`RoundAdvance`]. It performs no
//! I/O; the manager persists the result as one unit.
//!
//! Tie-break policy per format:
//! - Bracket: never resolved by the engine. A two-sided match must name its
//!   winner, tied scores or not.
//! - Championship: round score, then cumulative score (higher first), then
//!   seed (lower first). The final is decided by the final match's winner.
//! - King of the Hill: cumulative score, then round score, then seed. Higher
//!   seed numbers are eliminated first when everything else is equal.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::errors::{TournamentError, TournamentResult};
use super::models::{
    DebatePosition, Match, MatchDraft, MatchResult, MatchStatus, Participant, ParticipantId,
    ParticipantStatus, Tournament, TournamentFormat, TournamentStatus, MAX_ROUND_SCORE,
};
use super::seeding::{
    bracket_pairings, bracket_rounds, position_pairings, reseed_order, sequential_pairings,
    to_drafts,
};

/// Result of advancing one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundAdvance {
    /// Tournament with round, status and champion updated
    pub tournament: Tournament,
    /// Round whose results were applied
    pub completed_round: u32,
    /// Every participant scheduled in the completed round, updated
    pub participants: Vec<Participant>,
    /// Matches for the next round (empty once the tournament completes)
    pub next_matches: Vec<MatchDraft>,
    /// Participants still in contention, in next-round slot order
    pub advancing: Vec<ParticipantId>,
    pub eliminated: Vec<ParticipantId>,
    pub champion_id: Option<ParticipantId>,
}

impl RoundAdvance {
    pub fn is_final(&self) -> bool {
        self.tournament.status == TournamentStatus::Completed
    }
}

/// What a format decided about one round
#[derive(Debug, Default)]
struct RoundDecision {
    /// Survivors in slot order
    advancing: Vec<ParticipantId>,
    eliminations: Vec<(ParticipantId, String)>,
    round_scores: HashMap<ParticipantId, u32>,
    wins: Vec<ParticipantId>,
    losses: Vec<ParticipantId>,
    /// Explicit champion when the format decides one
    champion: Option<ParticipantId>,
}

/// Number of rounds and round-one matches for a tournament about to start.
///
/// `koth_rounds` is the configured round count for King of the Hill events.
pub fn plan_first_round(
    tournament: &Tournament,
    participants: &[Participant],
    koth_rounds: u32,
) -> TournamentResult<(u32, Vec<MatchDraft>)> {
    let mut field: Vec<&Participant> = participants
        .iter()
        .filter(|p| p.tournament_id == tournament.id && p.is_active())
        .collect();
    field.sort_by_key(|p| p.seed);

    if field.len() < 2 {
        return Err(TournamentError::InsufficientParticipants {
            needed: 2,
            current: field.len(),
        });
    }

    match tournament.format {
        TournamentFormat::Bracket => {
            let ordered: Vec<ParticipantId> = field.iter().map(|p| p.id).collect();
            let rounds = bracket_rounds(field.len() as u32);
            Ok((rounds, to_drafts(1, &bracket_pairings(&ordered), true)))
        }
        TournamentFormat::Championship => {
            if field.len() as u32 != tournament.max_participants {
                return Err(TournamentError::InsufficientParticipants {
                    needed: tournament.max_participants as usize,
                    current: field.len(),
                });
            }
            let (pro, con) = split_positions(&field)?;
            if pro.len() != con.len() {
                return Err(TournamentError::InvalidSetup(format!(
                    "PRO and CON groups must be equal, got {} and {}",
                    pro.len(),
                    con.len()
                )));
            }
            let rounds = bracket_rounds(tournament.max_participants);
            Ok((rounds, to_drafts(1, &position_pairings(&pro, &con), false)))
        }
        TournamentFormat::KingOfTheHill => {
            let rounds = if tournament.total_rounds > 0 {
                tournament.total_rounds
            } else {
                koth_rounds
            };
            if rounds == 0 {
                return Err(TournamentError::InvalidSetup(
                    "King of the Hill needs at least one round".to_string(),
                ));
            }
            Ok((rounds, to_drafts(1, &sequential_pairings(&field), false)))
        }
    }
}

/// Check that a judged result carries what [`advance`] will need from `m`.
///
/// A completed match cannot be corrected, so a result that would leave the
/// round undecidable is refused before it is stored.
///
/// # Errors
///
/// * `TournamentError::MissingWinner` - a two-sided bracket match (or the
///   championship final) without a winner
/// * `TournamentError::MissingScore` - a ranked round without a score for
///   one of the sides
pub fn check_result(tournament: &Tournament, m: &Match, result: &MatchResult) -> TournamentResult<()> {
    let needs_winner = match tournament.format {
        TournamentFormat::Bracket => true,
        TournamentFormat::Championship => m.round >= tournament.total_rounds,
        TournamentFormat::KingOfTheHill => false,
    };

    if needs_winner {
        if m.participant1_id.is_some() && m.participant2_id.is_some() && result.winner_id.is_none() {
            return Err(TournamentError::MissingWinner { match_id: m.id });
        }
        return Ok(());
    }

    let sides = [
        (m.participant1_id, result.participant1_score),
        (m.participant2_id, result.participant2_score),
    ];
    match sides.into_iter().find(|(id, score)| id.is_some() && score.is_none()) {
        Some((Some(participant_id), _)) => Err(TournamentError::MissingScore {
            match_id: m.id,
            participant_id,
        }),
        _ => Ok(()),
    }
}

/// Apply the results of the current round.
///
/// # Errors
///
/// * `TournamentError::InvalidState` - tournament is not in progress
/// * `TournamentError::RoundIncomplete` - a match of the round is still open
/// * Validation errors for inconsistent match data; nothing is guessed
pub fn advance(
    tournament: &Tournament,
    participants: &[Participant],
    matches: &[Match],
    now: DateTime<Utc>,
) -> TournamentResult<RoundAdvance> {
    if tournament.status != TournamentStatus::InProgress {
        return Err(TournamentError::InvalidState {
            expected: TournamentStatus::InProgress,
            actual: tournament.status,
        });
    }

    let round = tournament.current_round;
    let mut round_matches: Vec<&Match> = matches
        .iter()
        .filter(|m| m.tournament_id == tournament.id && m.round == round)
        .collect();
    round_matches.sort_by_key(|m| m.match_number);

    if round_matches.is_empty() {
        return Err(TournamentError::EmptyRound { round });
    }

    let pending = round_matches
        .iter()
        .filter(|m| !m.status.is_terminal())
        .count();
    if pending > 0 {
        return Err(TournamentError::RoundIncomplete { round, pending });
    }

    let roster: HashMap<ParticipantId, &Participant> = participants
        .iter()
        .filter(|p| p.tournament_id == tournament.id)
        .map(|p| (p.id, p))
        .collect();

    validate_schedule(round, &roster, &round_matches)?;

    let is_final_round = round >= tournament.total_rounds;
    let decision = match tournament.format {
        TournamentFormat::Bracket => decide_bracket(round, &round_matches)?,
        TournamentFormat::Championship => {
            decide_championship(tournament, round, is_final_round, &roster, &round_matches)?
        }
        TournamentFormat::KingOfTheHill => {
            decide_king_of_the_hill(tournament, round, is_final_round, &roster, &round_matches)?
        }
    };

    let mut updated: HashMap<ParticipantId, Participant> = round_matches
        .iter()
        .flat_map(|m| m.participants())
        .filter_map(|id| roster.get(&id).map(|p| (id, (*p).clone())))
        .collect();

    for (id, score) in &decision.round_scores {
        if let Some(p) = updated.get_mut(id) {
            p.cumulative_score = p.cumulative_score.saturating_add(*score);
        }
    }
    for id in &decision.wins {
        if let Some(p) = updated.get_mut(id) {
            p.wins += 1;
        }
    }
    for id in &decision.losses {
        if let Some(p) = updated.get_mut(id) {
            p.losses += 1;
        }
    }
    for (id, reason) in &decision.eliminations {
        if let Some(p) = updated.get_mut(id) {
            eliminate(p, round, reason);
        }
    }

    let mut next = tournament.clone();
    let eliminated: Vec<ParticipantId> = decision.eliminations.iter().map(|(id, _)| *id).collect();
    let mut next_matches = Vec::new();
    let mut champion_id = None;

    if is_final_round || decision.advancing.len() <= 1 {
        champion_id = decision.champion.or_else(|| match decision.advancing.as_slice() {
            [sole] => Some(*sole),
            _ => None,
        });

        let Some(champion) = champion_id else {
            return Err(TournamentError::NoChampion {
                round,
                remaining: decision.advancing.len(),
            });
        };

        next.status = TournamentStatus::Completed;
        next.champion_id = Some(champion);
        next.completed_at = Some(now);
        log::info!(
            "Tournament {} completed after round {}: champion participant {}",
            tournament.id,
            round,
            champion
        );
    } else {
        next.current_round = round + 1;
        let survivors: Vec<&Participant> = decision
            .advancing
            .iter()
            .filter_map(|id| updated.get(id))
            .collect();
        next_matches = plan_next_round(&next, &survivors)?;
        log::info!(
            "Tournament {} advanced to round {}: {} advancing, {} eliminated",
            tournament.id,
            next.current_round,
            decision.advancing.len(),
            eliminated.len()
        );
    }

    let mut participants: Vec<Participant> = updated.into_values().collect();
    participants.sort_by_key(|p| p.seed);

    Ok(RoundAdvance {
        tournament: next,
        completed_round: round,
        participants,
        next_matches,
        advancing: decision.advancing,
        eliminated,
        champion_id,
    })
}

fn eliminate(participant: &mut Participant, round: u32, reason: &str) {
    // Elimination data is written once and never overwritten
    if participant.elimination_round.is_some() {
        return;
    }
    participant.status = ParticipantStatus::Eliminated;
    participant.elimination_round = Some(round);
    participant.elimination_reason = Some(reason.to_string());
}

/// Every active participant plays exactly once; every named participant is active.
fn validate_schedule(
    round: u32,
    roster: &HashMap<ParticipantId, &Participant>,
    round_matches: &[&Match],
) -> TournamentResult<()> {
    let mut appearances: HashMap<ParticipantId, usize> = HashMap::new();

    for m in round_matches {
        for id in m.participants() {
            match roster.get(&id) {
                Some(p) if p.is_active() => *appearances.entry(id).or_default() += 1,
                _ => return Err(TournamentError::UnknownParticipant(id)),
            }
            if let Some(score) = m.score_for(id) {
                if score > MAX_ROUND_SCORE {
                    return Err(TournamentError::ScoreOutOfRange {
                        participant_id: id,
                        score,
                    });
                }
            }
        }
        if let Some(winner_id) = m.winner_id {
            if !m.involves(winner_id) {
                return Err(TournamentError::WinnerNotInMatch {
                    match_id: m.id,
                    winner_id,
                });
            }
        }
    }

    let mut active: Vec<&&Participant> = roster.values().filter(|p| p.is_active()).collect();
    active.sort_by_key(|p| p.seed);
    for p in active {
        let count = appearances.get(&p.id).copied().unwrap_or(0);
        if count != 1 {
            return Err(TournamentError::SchedulingConflict {
                participant_id: p.id,
                round,
                count,
            });
        }
    }

    Ok(())
}

fn required_score(m: &Match, participant_id: ParticipantId) -> TournamentResult<u32> {
    m.score_for(participant_id)
        .ok_or(TournamentError::MissingScore {
            match_id: m.id,
            participant_id,
        })
}

/// Winner and loser of a two-sided match; `None` for a single-sided one
fn head_to_head(m: &Match) -> TournamentResult<Option<(ParticipantId, ParticipantId)>> {
    let (Some(_), Some(_)) = (m.participant1_id, m.participant2_id) else {
        return Ok(None);
    };
    let winner = m
        .winner_id
        .ok_or(TournamentError::MissingWinner { match_id: m.id })?;
    let loser = m
        .opponent_of(winner)
        .ok_or(TournamentError::WinnerNotInMatch {
            match_id: m.id,
            winner_id: winner,
        })?;
    Ok(Some((winner, loser)))
}

fn loss_reason(m: &Match, loser: ParticipantId, round: u32) -> String {
    if m.status == MatchStatus::Forfeited {
        return format!("Forfeited round {round}");
    }
    match m.feedback_for(loser) {
        Some(feedback) if !feedback.trim().is_empty() => feedback.to_string(),
        _ => format!("Lost match {} of round {round}", m.match_number),
    }
}

fn decide_bracket(round: u32, round_matches: &[&Match]) -> TournamentResult<RoundDecision> {
    let mut decision = RoundDecision::default();

    for m in round_matches {
        for id in m.participants() {
            if let Some(score) = m.score_for(id) {
                decision.round_scores.insert(id, score);
            }
        }

        match head_to_head(m)? {
            Some((winner, loser)) => {
                decision.advancing.push(winner);
                decision.wins.push(winner);
                decision.losses.push(loser);
                decision.eliminations.push((loser, loss_reason(m, loser, round)));
            }
            None => {
                // Bye: the only named side moves on
                if let Some(id) = m.participants().next() {
                    decision.advancing.push(id);
                }
            }
        }
    }

    if round_matches.len() == 1 {
        decision.champion = decision.advancing.first().copied();
    }

    Ok(decision)
}

fn split_positions<'a>(
    field: &[&'a Participant],
) -> TournamentResult<(Vec<&'a Participant>, Vec<&'a Participant>)> {
    let mut pro = Vec::new();
    let mut con = Vec::new();
    for p in field {
        match p.selected_position {
            Some(DebatePosition::Pro) => pro.push(*p),
            Some(DebatePosition::Con) => con.push(*p),
            None => {
                return Err(TournamentError::PositionRequired {
                    format: TournamentFormat::Championship,
                });
            }
        }
    }
    Ok((pro, con))
}

/// Per-position cutoff after `round`: `max_participants / 2^(round + 1)`, at least one
fn championship_cutoff(max_participants: u32, round: u32) -> usize {
    let shift = round.saturating_add(1);
    let cutoff = if shift >= u32::BITS {
        0
    } else {
        max_participants >> shift
    };
    cutoff.max(1) as usize
}

fn decide_championship(
    tournament: &Tournament,
    round: u32,
    is_final_round: bool,
    roster: &HashMap<ParticipantId, &Participant>,
    round_matches: &[&Match],
) -> TournamentResult<RoundDecision> {
    if is_final_round {
        // The final is a straight debate: the match winner takes the title
        let mut decision = decide_bracket(round, round_matches)?;
        if decision.advancing.len() != 1 {
            return Err(TournamentError::NoChampion {
                round,
                remaining: decision.advancing.len(),
            });
        }
        decision.champion = decision.advancing.first().copied();
        return Ok(decision);
    }

    let mut decision = RoundDecision::default();
    // (participant, round score, slot)
    let mut ranked: Vec<(&Participant, u32, usize)> = Vec::new();

    for (slot, m) in round_matches.iter().enumerate() {
        let mut forfeited = None;
        if m.status == MatchStatus::Forfeited {
            if let Some((winner, loser)) = head_to_head(m)? {
                decision.wins.push(winner);
                decision.losses.push(loser);
                decision.eliminations.push((loser, loss_reason(m, loser, round)));
                forfeited = Some(loser);
            }
        } else if let Some(winner) = m.winner_id {
            decision.wins.push(winner);
            if let Some(loser) = m.opponent_of(winner) {
                decision.losses.push(loser);
            }
        }

        for id in m.participants() {
            if Some(id) == forfeited {
                continue;
            }
            let score = if m.status == MatchStatus::Forfeited {
                m.score_for(id).unwrap_or(0)
            } else {
                required_score(m, id)?
            };
            decision.round_scores.insert(id, score);
            if let Some(p) = roster.get(&id) {
                ranked.push((p, score, slot * 2 + usize::from(m.participant2_id == Some(id))));
            }
        }
    }

    let cutoff = championship_cutoff(tournament.max_participants, round);
    let mut pro_slots = Vec::new();
    let mut con_slots = Vec::new();

    for position in [DebatePosition::Pro, DebatePosition::Con] {
        let mut group: Vec<&(&Participant, u32, usize)> = Vec::new();
        for entry in &ranked {
            match entry.0.selected_position {
                Some(pos) if pos == position => group.push(entry),
                Some(_) => {}
                None => {
                    return Err(TournamentError::PositionRequired {
                        format: TournamentFormat::Championship,
                    });
                }
            }
        }

        group.sort_by_key(|(p, score, _)| {
            (
                Reverse(*score),
                Reverse(p.cumulative_score.saturating_add(*score)),
                p.seed,
            )
        });

        let total = group.len();
        for (rank, (p, score, slot)) in group.into_iter().enumerate() {
            if rank < cutoff {
                match position {
                    DebatePosition::Pro => pro_slots.push((*slot, p.id)),
                    DebatePosition::Con => con_slots.push((*slot, p.id)),
                }
            } else {
                decision.eliminations.push((
                    p.id,
                    format!(
                        "Ranked {} of {total} {position} debaters in round {round} with {score}/{MAX_ROUND_SCORE}",
                        rank + 1
                    ),
                ));
            }
        }
    }

    // Survivors keep their slot order within each position group
    pro_slots.sort_unstable();
    con_slots.sort_unstable();
    decision.advancing = pro_slots
        .into_iter()
        .chain(con_slots)
        .map(|(_, id)| id)
        .collect();

    Ok(decision)
}

fn decide_king_of_the_hill(
    tournament: &Tournament,
    round: u32,
    is_final_round: bool,
    roster: &HashMap<ParticipantId, &Participant>,
    round_matches: &[&Match],
) -> TournamentResult<RoundDecision> {
    let mut decision = RoundDecision::default();
    let max_total = MAX_ROUND_SCORE.saturating_mul(tournament.total_rounds);
    // (participant, round score, cumulative after this round, feedback)
    let mut standing: Vec<(&Participant, u32, u32, Option<&str>)> = Vec::new();

    for m in round_matches {
        let mut forfeited = Vec::new();
        if m.status == MatchStatus::Forfeited {
            match head_to_head(m)? {
                Some((_, loser)) => forfeited.push(loser),
                None => forfeited.extend(m.participants()),
            }
            for loser in &forfeited {
                decision.eliminations.push((*loser, format!("Forfeited round {round}")));
            }
        }

        for id in m.participants() {
            if forfeited.contains(&id) {
                continue;
            }
            let score = if m.status == MatchStatus::Forfeited {
                m.score_for(id).unwrap_or(0)
            } else {
                required_score(m, id)?
            };
            decision.round_scores.insert(id, score);
            if let Some(p) = roster.get(&id) {
                let cumulative = p.cumulative_score.saturating_add(score);
                standing.push((p, score, cumulative, m.feedback_for(id)));
            }
        }
    }

    if standing.is_empty() {
        return Err(TournamentError::AllForfeited { round });
    }

    // Strongest first
    standing.sort_by_key(|(p, score, cumulative, _)| (Reverse(*cumulative), Reverse(*score), p.seed));

    let reason = |feedback: Option<&str>, fallback: String| match feedback {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => fallback,
    };

    if is_final_round {
        let total = standing.len();
        for (place, (p, _, cumulative, feedback)) in standing.iter().enumerate().skip(1) {
            decision.eliminations.push((
                p.id,
                reason(
                    *feedback,
                    format!("Finished {} of {total} with {cumulative}/{max_total}", place + 1),
                ),
            ));
        }
        decision.champion = Some(standing[0].0.id);
        decision.advancing = vec![standing[0].0.id];
        return Ok(decision);
    }

    let cut = (tournament.eliminations_per_round as usize).min(standing.len() - 1);
    let survivors = standing.len() - cut;
    for (p, _, cumulative, feedback) in &standing[survivors..] {
        decision.eliminations.push((
            p.id,
            reason(
                *feedback,
                format!("Lowest cumulative score after round {round}: {cumulative}/{max_total}"),
            ),
        ));
    }

    let mut advancing: Vec<&Participant> = standing[..survivors].iter().map(|(p, ..)| *p).collect();
    advancing.sort_by_key(|p| p.seed);
    decision.advancing = advancing.iter().map(|p| p.id).collect();

    Ok(decision)
}

/// Pairings for the round after `survivors` advanced.
fn plan_next_round(
    tournament: &Tournament,
    survivors: &[&Participant],
) -> TournamentResult<Vec<MatchDraft>> {
    let round = tournament.current_round;
    let reseed = tournament
        .reseed_after_round
        .then_some(tournament.reseed_method);

    let drafts = match tournament.format {
        TournamentFormat::Bracket => match reseed {
            Some(method) => {
                let ordered: Vec<ParticipantId> =
                    reseed_order(survivors, method).iter().map(|p| p.id).collect();
                to_drafts(round, &bracket_pairings(&ordered), true)
            }
            None => to_drafts(round, &sequential_pairings(survivors), true),
        },
        TournamentFormat::Championship => {
            let (mut pro, mut con) = split_positions(survivors)?;
            if let Some(method) = reseed {
                pro = reseed_order(&pro, method);
                con = reseed_order(&con, method);
            }
            to_drafts(round, &position_pairings(&pro, &con), false)
        }
        TournamentFormat::KingOfTheHill => {
            let ordered = match reseed {
                Some(method) => reseed_order(survivors, method),
                None => survivors.to_vec(),
            };
            to_drafts(round, &sequential_pairings(&ordered), false)
        }
    };

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::ReseedMethod;

    fn tournament(format: TournamentFormat, size: u32, total_rounds: u32) -> Tournament {
        Tournament {
            id: 1,
            name: "Test Open".to_string(),
            format,
            status: TournamentStatus::InProgress,
            current_round: 1,
            total_rounds,
            max_participants: size,
            reseed_after_round: false,
            reseed_method: ReseedMethod::ByOriginalSeed,
            eliminations_per_round: 1,
            belt_cost: 0,
            belt_id: None,
            champion_id: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    fn roster(n: u32) -> Vec<Participant> {
        (1..=n)
            .map(|seed| Participant {
                id: i64::from(seed),
                tournament_id: 1,
                user_id: 1000 + i64::from(seed),
                seed,
                status: ParticipantStatus::Active,
                selected_position: None,
                cumulative_score: 0,
                wins: 0,
                losses: 0,
                elimination_round: None,
                elimination_reason: None,
            })
            .collect()
    }

    fn played(id: i64, round: u32, number: u32, p1: i64, p2: Option<i64>) -> Match {
        Match {
            id,
            tournament_id: 1,
            round,
            match_number: number,
            participant1_id: Some(p1),
            participant2_id: p2,
            winner_id: None,
            participant1_score: None,
            participant2_score: None,
            participant1_breakdown: None,
            participant2_breakdown: None,
            participant1_feedback: None,
            participant2_feedback: None,
            status: MatchStatus::Completed,
        }
    }

    #[test]
    fn test_bracket_tie_without_winner_is_rejected() {
        let t = tournament(TournamentFormat::Bracket, 2, 1);
        let mut m = played(1, 1, 1, 1, Some(2));
        m.participant1_score = Some(70);
        m.participant2_score = Some(70);

        let err = advance(&t, &roster(2), &[m], Utc::now()).unwrap_err();
        assert!(matches!(err, TournamentError::MissingWinner { match_id: 1 }));
    }

    #[test]
    fn test_result_check_follows_what_advance_needs() {
        let m = played(1, 1, 1, 1, Some(2));
        let tie = MatchResult::scored(70, 70);

        let bracket = tournament(TournamentFormat::Bracket, 2, 1);
        assert!(matches!(
            check_result(&bracket, &m, &tie),
            Err(TournamentError::MissingWinner { match_id: 1 })
        ));
        assert!(check_result(&bracket, &m, &tie.clone().with_winner(2)).is_ok());

        let hill = tournament(TournamentFormat::KingOfTheHill, 2, 3);
        assert!(check_result(&hill, &m, &tie).is_ok());
        let one_sided = MatchResult {
            participant1_score: Some(60),
            ..MatchResult::default()
        };
        assert!(matches!(
            check_result(&hill, &m, &one_sided),
            Err(TournamentError::MissingScore { match_id: 1, participant_id: 2 })
        ));

        // Ranking rounds need scores, the final needs a winner
        let championship = tournament(TournamentFormat::Championship, 4, 2);
        assert!(check_result(&championship, &m, &tie).is_ok());
        let mut final_match = played(2, 2, 1, 1, Some(2));
        final_match.status = MatchStatus::Pending;
        assert!(matches!(
            check_result(&championship, &final_match, &tie),
            Err(TournamentError::MissingWinner { match_id: 2 })
        ));
    }

    #[test]
    fn test_all_forfeited_hill_round_is_rejected() {
        let t = tournament(TournamentFormat::KingOfTheHill, 2, 3);
        let heats: Vec<Match> = [played(1, 1, 1, 1, None), played(2, 1, 2, 2, None)]
            .into_iter()
            .map(|mut m| {
                m.status = MatchStatus::Forfeited;
                m
            })
            .collect();

        let err = advance(&t, &roster(2), &heats, Utc::now()).unwrap_err();
        assert!(matches!(err, TournamentError::AllForfeited { round: 1 }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_incomplete_round_is_rejected() {
        let t = tournament(TournamentFormat::Bracket, 4, 2);
        let mut a = played(1, 1, 1, 1, Some(4));
        a.winner_id = Some(1);
        let mut b = played(2, 1, 2, 2, Some(3));
        b.status = MatchStatus::InProgress;

        let err = advance(&t, &roster(4), &[a, b], Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            TournamentError::RoundIncomplete { round: 1, pending: 1 }
        ));
    }

    #[test]
    fn test_unscheduled_participant_is_rejected() {
        let t = tournament(TournamentFormat::Bracket, 4, 2);
        let mut a = played(1, 1, 1, 1, Some(4));
        a.winner_id = Some(1);

        let err = advance(&t, &roster(4), &[a], Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            TournamentError::SchedulingConflict { participant_id: 2, count: 0, .. }
        ));
    }

    #[test]
    fn test_score_out_of_range_is_rejected() {
        let t = tournament(TournamentFormat::Bracket, 2, 1);
        let mut m = played(1, 1, 1, 1, Some(2));
        m.participant1_score = Some(101);
        m.winner_id = Some(1);

        let err = advance(&t, &roster(2), &[m], Utc::now()).unwrap_err();
        assert!(matches!(err, TournamentError::ScoreOutOfRange { score: 101, .. }));
    }

    #[test]
    fn test_bracket_final_crowns_winner() {
        let t = tournament(TournamentFormat::Bracket, 2, 1);
        let mut m = played(1, 1, 1, 1, Some(2));
        m.winner_id = Some(2);

        let advance = advance(&t, &roster(2), &[m], Utc::now()).unwrap();
        assert!(advance.is_final());
        assert_eq!(advance.champion_id, Some(2));
        assert_eq!(advance.tournament.current_round, 1);
        assert!(advance.next_matches.is_empty());

        let loser = advance.participants.iter().find(|p| p.id == 1).unwrap();
        assert_eq!(loser.status, ParticipantStatus::Eliminated);
        assert_eq!(loser.losses, 1);
    }

    #[test]
    fn test_championship_cutoff_halves() {
        assert_eq!(championship_cutoff(8, 1), 2);
        assert_eq!(championship_cutoff(8, 2), 1);
        assert_eq!(championship_cutoff(16, 1), 4);
        assert_eq!(championship_cutoff(4, 1), 1);
        assert_eq!(championship_cutoff(4, 40), 1);
    }

    #[test]
    fn test_first_round_plan_for_king_of_the_hill() {
        let mut t = tournament(TournamentFormat::KingOfTheHill, 5, 0);
        t.status = TournamentStatus::RegistrationOpen;
        let (rounds, drafts) = plan_first_round(&t, &roster(5), 3).unwrap();
        assert_eq!(rounds, 3);
        assert_eq!(drafts.len(), 3);
        // Seed 1 debates solo, nobody gets a free pass
        assert_eq!(drafts[0].participant1_id, Some(1));
        assert_eq!(drafts[0].participant2_id, None);
        assert!(drafts.iter().all(|d| d.status == MatchStatus::Pending));
    }

    #[test]
    fn test_first_round_needs_two_participants() {
        let t = tournament(TournamentFormat::Bracket, 8, 0);
        let err = plan_first_round(&t, &roster(1), 3).unwrap_err();
        assert!(matches!(
            err,
            TournamentError::InsufficientParticipants { needed: 2, current: 1 }
        ));
    }
}
