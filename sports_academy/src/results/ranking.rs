//! Individual-ranking placement.
//!
//! Placements use standard competition ranking: equal values share a
//! placement and the next placement skips accordingly (1, 2, 2, 4).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::models::{Measurement, PlacementEntry};
use crate::ledger::LicenseId;
use crate::tournament::{RankingDirection, RankingKind, RoundAggregation};

/// Values closer than this are treated as equal
pub const TIE_EPSILON: f64 = 1e-9;

fn ordering(a: f64, b: f64, direction: RankingDirection) -> Ordering {
    match direction {
        RankingDirection::Ascending => a.total_cmp(&b),
        RankingDirection::Descending => b.total_cmp(&a),
    }
}

/// Collapse per-round values into one
pub fn aggregate(values: &[f64], aggregation: RoundAggregation, direction: RankingDirection) -> f64 {
    match aggregation {
        RoundAggregation::Sum => values.iter().sum(),
        RoundAggregation::Best => values
            .iter()
            .copied()
            .min_by(|a, b| ordering(*a, *b, direction))
            .unwrap_or(0.0),
    }
}

/// Competition ranks for `values`, in input order
pub fn competition_ranks(values: &[f64], direction: RankingDirection) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| ordering(values[a], values[b], direction).then(a.cmp(&b)));

    // A tie run is measured from its first value so near-equal chains cannot drift.
    let mut ranks = vec![0; values.len()];
    let mut run_start = 0;
    for (position, &index) in order.iter().enumerate() {
        let leader = order[run_start];
        if position > 0 && (values[index] - values[leader]).abs() > TIE_EPSILON {
            run_start = position;
        }
        ranks[index] = run_start as u32 + 1;
    }
    ranks
}

/// Validate measurements against a roster and place them
///
/// Exactly one entry per roster member, each with `rounds` finite,
/// non-negative values. Entries are returned best first.
pub fn place_measurements(
    roster: &[LicenseId],
    measurements: &[Measurement],
    kind: RankingKind,
    direction: RankingDirection,
    aggregation: RoundAggregation,
    rounds: u32,
) -> Result<Vec<PlacementEntry>, String> {
    let expected: BTreeSet<LicenseId> = roster.iter().copied().collect();
    let mut seen = BTreeSet::new();
    for m in measurements {
        if !expected.contains(&m.license_id) {
            return Err(format!("license {} is not on the roster", m.license_id));
        }
        if !seen.insert(m.license_id) {
            return Err(format!("license {} is measured twice", m.license_id));
        }
        if m.values.len() != rounds as usize {
            return Err(format!(
                "license {} has {} value(s), {kind:?} scoring expects {rounds}",
                m.license_id,
                m.values.len()
            ));
        }
        if let Some(bad) = m.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(format!(
                "license {} has an invalid value {bad}",
                m.license_id
            ));
        }
    }
    if seen.len() != expected.len() {
        let missing: Vec<_> = expected.difference(&seen).map(ToString::to_string).collect();
        return Err(format!("missing measurements for {}", missing.join(", ")));
    }

    let values: Vec<f64> = measurements
        .iter()
        .map(|m| aggregate(&m.values, aggregation, direction))
        .collect();
    let ranks = competition_ranks(&values, direction);

    let mut placements: Vec<PlacementEntry> = measurements
        .iter()
        .zip(values)
        .zip(ranks)
        .map(|((m, value), placement)| PlacementEntry {
            license_id: m.license_id,
            value,
            placement,
        })
        .collect();
    placements.sort_by_key(|p| p.placement);
    Ok(placements)
}
