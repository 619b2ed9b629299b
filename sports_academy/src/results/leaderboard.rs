//! Percentiles and tiers. Derived on every read, never stored.

use super::models::{LeaderboardTier, StandingRow};

/// `placement / total * 100`, so the winner of a 20-player event is at 5.0
pub fn percentile(placement: u32, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    f64::from(placement) / total as f64 * 100.0
}

pub fn tier_for(percentile: f64) -> LeaderboardTier {
    if percentile <= 5.0 {
        LeaderboardTier::Top5
    } else if percentile <= 10.0 {
        LeaderboardTier::Top10
    } else if percentile <= 25.0 {
        LeaderboardTier::Top25
    } else {
        LeaderboardTier::Standard
    }
}

/// Fill percentile and tier of every row
pub fn apply(rows: &mut [StandingRow]) {
    let total = rows.len();
    for row in rows.iter_mut() {
        row.percentile = percentile(row.placement, total);
        row.tier = tier_for(row.percentile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        assert_eq!(percentile(1, 20), 5.0);
        assert_eq!(percentile(3, 4), 75.0);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier_for(5.0), LeaderboardTier::Top5);
        assert_eq!(tier_for(5.1), LeaderboardTier::Top10);
        assert_eq!(tier_for(10.0), LeaderboardTier::Top10);
        assert_eq!(tier_for(25.0), LeaderboardTier::Top25);
        assert_eq!(tier_for(25.01), LeaderboardTier::Standard);
    }

    #[test]
    fn test_small_field_winner_is_standard() {
        // 1 of 2 is the 50th percentile
        assert_eq!(tier_for(percentile(1, 2)), LeaderboardTier::Standard);
    }
}
