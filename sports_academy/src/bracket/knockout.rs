//! Single-elimination planning.

use super::models::SessionPhase;
use super::plan::{BracketPlan, PlannedSession, PlannedSource};
use crate::ledger::LicenseId;

/// Seeds (1-indexed) in bracket-position order for a bracket of `size`
///
/// Built by repeatedly pairing every seed `s` with `2n + 1 - s`, so seed 1
/// meets the lowest seed and the top two seeds can only meet in the final.
/// `size` must be a power of two.
pub fn seeding_order(size: usize) -> Vec<usize> {
    let mut order = vec![1];
    while order.len() < size {
        let mirror = order.len() * 2 + 1;
        order = order.iter().flat_map(|&s| [s, mirror - s]).collect();
    }
    order
}

/// Bracket slot while rounds are folded together
#[derive(Debug, Clone)]
enum Slot {
    /// Entrant advancing without playing (bye)
    Direct(PlannedSource),
    /// Winner of a planned session
    Played(usize),
}

impl Slot {
    fn source(self) -> PlannedSource {
        match self {
            Slot::Direct(source) => source,
            Slot::Played(index) => PlannedSource::WinnerOf(index),
        }
    }
}

/// Append a knockout for `entrants` (seed order) to `plan`
///
/// Byes go to the top seeds and never produce a session, so exactly
/// `entrants.len() - 1` sessions are added, plus a third-place match when
/// requested and both semi-finals are played. Returns the final's index.
pub fn plan_knockout_into(
    plan: &mut BracketPlan,
    entrants: &[PlannedSource],
    third_place_match: bool,
) -> Option<usize> {
    let n = entrants.len();
    if n < 2 {
        return None;
    }

    let size = n.next_power_of_two();
    let order = seeding_order(size);

    let mut slots = Vec::with_capacity(size / 2);
    let mut position = 0;
    for pair in order.chunks(2) {
        let (high, low) = (pair[0], pair[1]);
        if low > n {
            slots.push(Slot::Direct(entrants[high - 1].clone()));
        } else {
            position += 1;
            let index = plan.push(PlannedSession {
                phase: SessionPhase::Knockout,
                round: 1,
                bracket_position: position,
                group_label: None,
                sources: vec![entrants[high - 1].clone(), entrants[low - 1].clone()],
            });
            slots.push(Slot::Played(index));
        }
    }

    let mut round = 1;
    let mut semi_finals = Vec::new();
    while slots.len() > 1 {
        round += 1;
        semi_finals = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Played(index) => Some(*index),
                Slot::Direct(_) => None,
            })
            .collect();

        let mut next = Vec::with_capacity(slots.len() / 2);
        let mut pairs = slots.into_iter();
        let mut position = 0;
        while let (Some(a), Some(b)) = (pairs.next(), pairs.next()) {
            position += 1;
            let index = plan.push(PlannedSession {
                phase: SessionPhase::Knockout,
                round,
                bracket_position: position,
                group_label: None,
                sources: vec![a.source(), b.source()],
            });
            next.push(Slot::Played(index));
        }
        slots = next;
    }

    let final_index = match slots.pop() {
        Some(Slot::Played(index)) => index,
        _ => return None,
    };

    if third_place_match && semi_finals.len() == 2 {
        plan.push(PlannedSession {
            phase: SessionPhase::Knockout,
            round,
            bracket_position: 2,
            group_label: None,
            sources: vec![
                PlannedSource::LoserOf(semi_finals[0]),
                PlannedSource::LoserOf(semi_finals[1]),
            ],
        });
    }

    Some(final_index)
}

/// Knockout plan for a seeded roster
pub fn plan_knockout(roster: &[LicenseId], third_place_match: bool) -> BracketPlan {
    let entrants: Vec<_> = roster.iter().copied().map(PlannedSource::Fixed).collect();
    let mut plan = BracketPlan::new();
    plan_knockout_into(&mut plan, &entrants, third_place_match);
    plan
}
