//! Integration tests for championship tournaments
//!
//! Championship rounds rank PRO and CON debaters separately by round score;
//! only the final is decided by who won the debate.

use std::collections::HashMap;
use std::sync::Arc;

use debate_arena::config::EconomyConfig;
use debate_arena::db::InMemoryStore;
use debate_arena::error::ErrorKind;
use debate_arena::tournament::{
    DebatePosition, MatchResult, NewTournament, ParticipantId, Tournament, TournamentError,
    TournamentManager, TournamentStatus, UserId,
};

fn manager() -> TournamentManager {
    TournamentManager::new(Arc::new(InMemoryStore::new()), EconomyConfig::default())
}

/// Register `(user, side)` entrants and start; returns participant IDs by user
async fn start_championship(
    manager: &TournamentManager,
    size: u32,
    entrants: &[(UserId, DebatePosition)],
) -> (Tournament, HashMap<UserId, ParticipantId>) {
    let tournament = manager
        .create_tournament(NewTournament::championship("Spring Championship", size))
        .await
        .unwrap();
    let mut ids = HashMap::new();
    for (user_id, side) in entrants {
        let p = manager
            .register_participant(tournament.id, *user_id, Some(*side))
            .await
            .unwrap();
        ids.insert(*user_id, p.id);
    }
    let tournament = manager.start_tournament(tournament.id).await.unwrap();
    (tournament, ids)
}

/// Record `(first score, second score, winner)` for each round match in order
async fn score_round(
    manager: &TournamentManager,
    id: i64,
    round: u32,
    results: &[(u32, u32, Option<ParticipantId>)],
) {
    let matches = manager.matches(id, Some(round)).await.unwrap();
    assert_eq!(matches.len(), results.len());
    for (m, (first, second, winner)) in matches.iter().zip(results) {
        let mut result = MatchResult::scored(*first, *second);
        result.winner_id = *winner;
        manager.record_match_result(m.id, result).await.unwrap();
    }
}

#[tokio::test]
async fn test_rounds_rank_by_score_and_final_by_winner() {
    let manager = manager();
    let (tournament, ids) = start_championship(
        &manager,
        4,
        &[
            (1, DebatePosition::Pro),
            (2, DebatePosition::Con),
            (3, DebatePosition::Pro),
            (4, DebatePosition::Con),
        ],
    )
    .await;
    assert_eq!(tournament.total_rounds, 2);

    // PRO entrants face CON entrants in seed order
    let round_one = manager.matches(tournament.id, Some(1)).await.unwrap();
    assert_eq!(round_one[0].participant1_id, Some(ids[&1]));
    assert_eq!(round_one[0].participant2_id, Some(ids[&2]));
    assert_eq!(round_one[1].participant1_id, Some(ids[&3]));
    assert_eq!(round_one[1].participant2_id, Some(ids[&4]));

    // User 1 loses the debate but still outscores user 3
    score_round(
        &manager,
        tournament.id,
        1,
        &[(88, 92, Some(ids[&2])), (80, 50, Some(ids[&3]))],
    )
    .await;
    let advance = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advance.advancing, vec![ids[&1], ids[&2]]);
    assert_eq!(advance.eliminated.len(), 2);

    let roster = manager.participants(tournament.id).await.unwrap();
    let third = roster.iter().find(|p| p.user_id == 3).unwrap();
    assert!(!third.is_active());
    assert_eq!(third.wins, 1);
    assert_eq!(
        third.elimination_reason.as_deref(),
        Some("Ranked 2 of 2 PRO debaters in round 1 with 80/100")
    );
    let first = roster.iter().find(|p| p.user_id == 1).unwrap();
    assert!(first.is_active());
    assert_eq!(first.losses, 1);
    assert_eq!(first.cumulative_score, 88);

    // The final goes to the recorded winner regardless of score
    score_round(&manager, tournament.id, 2, &[(70, 85, Some(ids[&1]))]).await;
    let last = manager.advance_round(tournament.id).await.unwrap();
    assert!(last.is_final());
    assert_eq!(last.champion_id, Some(ids[&1]));

    let finished = manager.get_tournament(tournament.id).await.unwrap();
    assert_eq!(finished.status, TournamentStatus::Completed);
    assert_eq!(finished.champion_id, Some(ids[&1]));
}

#[tokio::test]
async fn test_eight_seat_cutoffs_halve_each_side() {
    let manager = manager();
    let entrants: Vec<(UserId, DebatePosition)> = (1..=8)
        .map(|user| {
            let side = if user % 2 == 1 {
                DebatePosition::Pro
            } else {
                DebatePosition::Con
            };
            (user, side)
        })
        .collect();
    let (tournament, ids) = start_championship(&manager, 8, &entrants).await;
    assert_eq!(tournament.total_rounds, 3);

    // Pairs: (1,2) (3,4) (5,6) (7,8)
    score_round(
        &manager,
        tournament.id,
        1,
        &[
            (90, 60, None),
            (70, 85, None),
            (75, 80, None),
            (95, 55, None),
        ],
    )
    .await;
    let advance = manager.advance_round(tournament.id).await.unwrap();
    // PRO keeps 7 (95) and 1 (90); CON keeps 4 (85) and 6 (80), each in slot order
    assert_eq!(
        advance.advancing,
        vec![ids[&1], ids[&7], ids[&4], ids[&6]]
    );

    let round_two = manager.matches(tournament.id, Some(2)).await.unwrap();
    assert_eq!(round_two.len(), 2);
    assert_eq!(round_two[0].participant1_id, Some(ids[&1]));
    assert_eq!(round_two[0].participant2_id, Some(ids[&4]));

    score_round(&manager, tournament.id, 2, &[(60, 70, None), (88, 40, None)]).await;
    let advance = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advance.advancing, vec![ids[&7], ids[&4]]);
    assert_eq!(advance.tournament.current_round, 3);
}

#[tokio::test]
async fn test_equal_round_scores_fall_back_to_seed() {
    let manager = manager();
    let (tournament, ids) = start_championship(
        &manager,
        4,
        &[
            (1, DebatePosition::Pro),
            (2, DebatePosition::Pro),
            (3, DebatePosition::Con),
            (4, DebatePosition::Con),
        ],
    )
    .await;

    score_round(&manager, tournament.id, 1, &[(75, 60, None), (75, 60, None)]).await;
    let advance = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advance.advancing, vec![ids[&1], ids[&3]]);
}

#[tokio::test]
async fn test_ranking_round_needs_every_score() {
    let manager = manager();
    let (tournament, ids) = start_championship(
        &manager,
        4,
        &[
            (1, DebatePosition::Pro),
            (2, DebatePosition::Con),
            (3, DebatePosition::Pro),
            (4, DebatePosition::Con),
        ],
    )
    .await;

    let matches = manager.matches(tournament.id, Some(1)).await.unwrap();
    let err = manager
        .record_match_result(
            matches[0].id,
            MatchResult::default().with_winner(ids[&1]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TournamentError::MissingScore { participant_id, .. } if participant_id == ids[&1]
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);

    // The match stays open for the complete result
    let open = manager.get_match(matches[0].id).await.unwrap();
    assert!(!open.status.is_terminal());
    score_round(&manager, tournament.id, 1, &[(90, 60, Some(ids[&1])), (70, 65, None)]).await;
    let advance = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advance.advancing, vec![ids[&1], ids[&4]]);
}

#[tokio::test]
async fn test_final_needs_a_winner() {
    let manager = manager();
    let (tournament, ids) = start_championship(
        &manager,
        4,
        &[
            (1, DebatePosition::Pro),
            (2, DebatePosition::Con),
            (3, DebatePosition::Pro),
            (4, DebatePosition::Con),
        ],
    )
    .await;

    score_round(&manager, tournament.id, 1, &[(90, 80, None), (60, 70, None)]).await;
    manager.advance_round(tournament.id).await.unwrap();

    let final_match = manager.matches(tournament.id, Some(2)).await.unwrap()[0].clone();
    let err = manager
        .record_match_result(final_match.id, MatchResult::scored(75, 75))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::MissingWinner { .. }));

    score_round(&manager, tournament.id, 2, &[(75, 75, Some(ids[&2]))]).await;
    let last = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(last.champion_id, Some(ids[&2]));
}

#[tokio::test]
async fn test_registration_requires_a_side_with_room() {
    let manager = manager();
    let tournament = manager
        .create_tournament(NewTournament::championship("Sides", 4))
        .await
        .unwrap();

    let err = manager
        .register_participant(tournament.id, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::PositionRequired { .. }));

    for user in [1, 2] {
        manager
            .register_participant(tournament.id, user, Some(DebatePosition::Pro))
            .await
            .unwrap();
    }
    let err = manager
        .register_participant(tournament.id, 3, Some(DebatePosition::Pro))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::PositionFull(DebatePosition::Pro)));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    // A half-empty field cannot start
    let err = manager.start_tournament(tournament.id).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::InsufficientParticipants { needed: 4, current: 2 }
    ));
}

#[tokio::test]
async fn test_championship_size_must_be_power_of_two() {
    let manager = manager();
    let err = manager
        .create_tournament(NewTournament::championship("Odd", 6))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::InvalidSetup(_)));
}
