//! Seeding and pairing helpers.
//!
//! Every function here is a pure function of its input ordering, so the same
//! advancing set always produces the same pairings regardless of call order.
//!
//! Bye policy: when a field cannot be paired evenly, the participant with the
//! lowest seed number receives the bye.

use super::models::{MatchDraft, MatchStatus, Participant, ParticipantId, ReseedMethod};

/// One slot of an upcoming round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub first: ParticipantId,
    /// `None` for a bye or solo heat
    pub second: Option<ParticipantId>,
}

impl Pairing {
    pub fn is_bye(&self) -> bool {
        self.second.is_none()
    }
}

/// Seed numbers in standard bracket slot order for a bracket of `size` slots.
///
/// `size` is rounded up to a power of two. For 8 slots this yields
/// `[1, 8, 4, 5, 2, 7, 3, 6]`, so seeds 1 and 2 can only meet in the final.
pub fn bracket_order(size: u32) -> Vec<u32> {
    let size = size.max(1).next_power_of_two();
    let mut order = vec![1u32];

    while (order.len() as u32) < size {
        let span = order.len() as u32 * 2 + 1;
        order = order.iter().flat_map(|&seed| [seed, span - seed]).collect();
    }

    order
}

/// Rounds needed to reduce `participants` to a single bracket winner
pub fn bracket_rounds(participants: u32) -> u32 {
    participants.max(1).next_power_of_two().trailing_zeros()
}

/// Pair a field ordered strongest-first using standard bracket order.
///
/// Slots beyond the field size become byes for the strongest entrants.
pub fn bracket_pairings(ordered: &[ParticipantId]) -> Vec<Pairing> {
    match ordered.len() {
        0 => return Vec::new(),
        1 => {
            return vec![Pairing {
                first: ordered[0],
                second: None,
            }];
        }
        _ => {}
    }

    let rank = |seed: u32| ordered.get(seed as usize - 1).copied();

    bracket_order(ordered.len() as u32)
        .chunks(2)
        .filter_map(|slot| {
            let (a, b) = (rank(slot[0]), rank(slot[1]));
            match (a, b) {
                (Some(first), second) => Some(Pairing { first, second }),
                (None, Some(first)) => Some(Pairing {
                    first,
                    second: None,
                }),
                (None, None) => None,
            }
        })
        .collect()
}

/// Pair neighbours in slot order (1v2, 3v4, ...).
///
/// With an odd field the lowest seed takes the bye, listed first.
pub fn sequential_pairings(slots: &[&Participant]) -> Vec<Pairing> {
    let mut remaining: Vec<&Participant> = slots.to_vec();
    let mut pairings = Vec::with_capacity(remaining.len().div_ceil(2));

    if remaining.len() % 2 == 1 {
        let bye_index = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.seed)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let bye = remaining.remove(bye_index);
        pairings.push(Pairing {
            first: bye.id,
            second: None,
        });
    }

    pairings.extend(remaining.chunks(2).map(|pair| Pairing {
        first: pair[0].id,
        second: pair.get(1).map(|p| p.id),
    }));

    pairings
}

/// Pair the i-th entrant of one position group with the i-th of the other.
///
/// Leftover entrants of a larger group debate solo.
pub fn position_pairings(pro: &[&Participant], con: &[&Participant]) -> Vec<Pairing> {
    let longest = pro.len().max(con.len());
    (0..longest)
        .filter_map(|i| match (pro.get(i), con.get(i)) {
            (Some(p), Some(c)) => Some(Pairing {
                first: p.id,
                second: Some(c.id),
            }),
            (Some(only), None) | (None, Some(only)) => Some(Pairing {
                first: only.id,
                second: None,
            }),
            (None, None) => None,
        })
        .collect()
}

/// Order participants for reseeding, strongest first.
pub fn reseed_order<'a>(participants: &[&'a Participant], method: ReseedMethod) -> Vec<&'a Participant> {
    let mut ordered = participants.to_vec();
    match method {
        ReseedMethod::ByOriginalSeed => ordered.sort_by_key(|p| p.seed),
        ReseedMethod::ByCurrentScore => ordered.sort_by(|a, b| {
            b.cumulative_score
                .cmp(&a.cumulative_score)
                .then(a.seed.cmp(&b.seed))
        }),
    }
    ordered
}

/// Turn pairings into match drafts for `round`.
///
/// When `complete_byes` is set, single-sided slots are written already
/// completed with the named participant as winner.
pub fn to_drafts(round: u32, pairings: &[Pairing], complete_byes: bool) -> Vec<MatchDraft> {
    pairings
        .iter()
        .enumerate()
        .map(|(i, pairing)| {
            let auto_win = complete_byes && pairing.is_bye();
            MatchDraft {
                round,
                match_number: i as u32 + 1,
                participant1_id: Some(pairing.first),
                participant2_id: pairing.second,
                winner_id: auto_win.then_some(pairing.first),
                status: if auto_win {
                    MatchStatus::Completed
                } else {
                    MatchStatus::Pending
                },
            }
        })
        .collect()
}
