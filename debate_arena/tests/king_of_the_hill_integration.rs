//! Integration tests for King of the Hill tournaments
//!
//! Everyone debates every round; after each round the lowest cumulative
//! scorers drop out until the final round crowns the leader.

use std::collections::HashMap;
use std::sync::Arc;

use debate_arena::config::EconomyConfig;
use debate_arena::db::InMemoryStore;
use debate_arena::error::ErrorKind;
use debate_arena::tournament::{
    MatchResult, NewTournament, ParticipantId, TournamentError, TournamentManager,
    TournamentStatus, display_reason,
};

fn manager() -> TournamentManager {
    TournamentManager::new(Arc::new(InMemoryStore::new()), EconomyConfig::default())
}

async fn start_hill(
    manager: &TournamentManager,
    new: NewTournament,
    entrants: u32,
) -> (i64, HashMap<u32, ParticipantId>) {
    let tournament = manager.create_tournament(new).await.unwrap();
    for user_id in 1..=i64::from(entrants) {
        manager
            .register_participant(tournament.id, 200 + user_id, None)
            .await
            .unwrap();
    }
    manager.start_tournament(tournament.id).await.unwrap();
    let seeds = manager
        .participants(tournament.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.seed, p.id))
        .collect();
    (tournament.id, seeds)
}

/// Record a score for every participant of the current round, keyed by seed
async fn score_round(
    manager: &TournamentManager,
    id: i64,
    round: u32,
    seeds: &HashMap<u32, ParticipantId>,
    scores: &[(u32, u32)],
    feedback: &[(u32, &str)],
) {
    let score_of = |pid: Option<ParticipantId>| {
        pid.and_then(|pid| {
            scores
                .iter()
                .find(|(seed, _)| seeds[seed] == pid)
                .map(|(_, score)| *score)
        })
    };
    let feedback_of = |pid: Option<ParticipantId>| {
        pid.and_then(|pid| {
            feedback
                .iter()
                .find(|(seed, _)| seeds[seed] == pid)
                .map(|(_, text)| text.to_string())
        })
    };

    for m in manager.matches(id, Some(round)).await.unwrap() {
        let result = MatchResult {
            participant1_score: score_of(m.participant1_id),
            participant2_score: score_of(m.participant2_id),
            ..MatchResult::default()
        }
        .with_feedback(feedback_of(m.participant1_id), feedback_of(m.participant2_id));
        manager.record_match_result(m.id, result).await.unwrap();
    }
}

#[tokio::test]
async fn test_lowest_cumulative_scores_drop_out() {
    let manager = manager();
    let (id, seeds) = start_hill(&manager, NewTournament::king_of_the_hill("Hill", 5, 1), 5).await;

    let tournament = manager.get_tournament(id).await.unwrap();
    assert_eq!(tournament.total_rounds, 3);

    // Odd field: seed 1 debates solo, the rest in neighbouring pairs
    let round_one = manager.matches(id, Some(1)).await.unwrap();
    assert_eq!(round_one.len(), 3);
    assert_eq!(round_one[0].participant1_id, Some(seeds[&1]));
    assert_eq!(round_one[0].participant2_id, None);

    score_round(
        &manager,
        id,
        1,
        &seeds,
        &[(1, 70), (2, 60), (3, 80), (4, 40), (5, 50)],
        &[(4, "Relied on anecdote over evidence")],
    )
    .await;
    let advance = manager.advance_round(id).await.unwrap();
    assert_eq!(advance.eliminated, vec![seeds[&4]]);
    assert_eq!(
        advance.advancing,
        vec![seeds[&1], seeds[&2], seeds[&3], seeds[&5]]
    );

    // Judge feedback becomes the elimination reason
    let fourth = advance.participants.iter().find(|p| p.seed == 4).unwrap();
    assert_eq!(
        fourth.elimination_reason.as_deref(),
        Some("Relied on anecdote over evidence")
    );
    assert_eq!(
        display_reason(fourth.elimination_reason.as_deref().unwrap(), 20),
        "Relied on anecdot..."
    );

    score_round(
        &manager,
        id,
        2,
        &seeds,
        &[(1, 50), (2, 90), (3, 60), (5, 85)],
        &[],
    )
    .await;
    let advance = manager.advance_round(id).await.unwrap();
    assert_eq!(advance.eliminated, vec![seeds[&1]]);
    let first = advance.participants.iter().find(|p| p.seed == 1).unwrap();
    assert_eq!(first.cumulative_score, 120);
    assert_eq!(
        first.elimination_reason.as_deref(),
        Some("Lowest cumulative score after round 2: 120/300")
    );

    score_round(&manager, id, 3, &seeds, &[(2, 70), (3, 95), (5, 80)], &[]).await;
    let last = manager.advance_round(id).await.unwrap();
    assert!(last.is_final());
    assert_eq!(last.champion_id, Some(seeds[&3]));

    let roster = manager.participants(id).await.unwrap();
    let reason = |seed: u32| {
        roster
            .iter()
            .find(|p| p.seed == seed)
            .and_then(|p| p.elimination_reason.clone())
    };
    assert_eq!(reason(2).as_deref(), Some("Finished 2 of 3 with 220/300"));
    assert_eq!(reason(5).as_deref(), Some("Finished 3 of 3 with 215/300"));
    assert_eq!(reason(3), None);

    let champion = roster.iter().find(|p| p.seed == 3).unwrap();
    assert_eq!(champion.cumulative_score, 235);
    assert!(champion.is_active());
}

#[tokio::test]
async fn test_field_reduced_to_one_ends_early() {
    let manager = manager();
    let (id, seeds) = start_hill(&manager, NewTournament::king_of_the_hill("Sprint", 3, 2), 3).await;

    score_round(&manager, id, 1, &seeds, &[(1, 50), (2, 90), (3, 40)], &[]).await;
    let advance = manager.advance_round(id).await.unwrap();
    assert!(advance.is_final());
    assert_eq!(advance.champion_id, Some(seeds[&2]));
    assert_eq!(advance.eliminated.len(), 2);

    let tournament = manager.get_tournament(id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Completed);
    assert_eq!(tournament.current_round, 1);
}

#[tokio::test]
async fn test_equal_totals_eliminate_the_higher_seed_number() {
    let manager = manager();
    let new = NewTournament::king_of_the_hill("Level", 4, 1).with_rounds(2);
    let (id, seeds) = start_hill(&manager, new, 4).await;

    score_round(&manager, id, 1, &seeds, &[(1, 60), (2, 60), (3, 60), (4, 60)], &[]).await;
    let advance = manager.advance_round(id).await.unwrap();
    assert_eq!(advance.eliminated, vec![seeds[&4]]);
}

#[tokio::test]
async fn test_every_participant_needs_a_score() {
    let manager = manager();
    let (id, seeds) = start_hill(&manager, NewTournament::king_of_the_hill("Gaps", 4, 1), 4).await;

    // Seeds 3 and 4 share a heat; seed 4 has no score
    let heat = manager
        .matches(id, Some(1))
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.involves(seeds[&4]))
        .unwrap();
    let partial = if heat.participant1_id == Some(seeds[&4]) {
        MatchResult {
            participant2_score: Some(60),
            ..MatchResult::default()
        }
    } else {
        MatchResult {
            participant1_score: Some(60),
            ..MatchResult::default()
        }
    };
    let err = manager.record_match_result(heat.id, partial).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::MissingScore { participant_id, .. } if participant_id == seeds[&4]
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Nothing was stored, so the full scores still go through
    score_round(&manager, id, 1, &seeds, &[(1, 60), (2, 60), (3, 60), (4, 55)], &[]).await;
    let advance = manager.advance_round(id).await.unwrap();
    assert_eq!(advance.eliminated, vec![seeds[&4]]);
}

#[tokio::test]
async fn test_hill_setup_validation() {
    let manager = manager();

    let err = manager
        .create_tournament(NewTournament::king_of_the_hill("No Cuts", 4, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::InvalidSetup(_)));

    let err = manager
        .create_tournament(NewTournament::king_of_the_hill("No Rounds", 4, 1).with_rounds(0))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::InvalidSetup(_)));
}
