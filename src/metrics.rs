//! Per-cycle metrics aggregation.

use crate::models::{ArticleRecord, RunMetrics, ScrapedArticle};
use crate::utils::{hour_bucket, iso_utc, round_to};
use chrono::{DateTime, Utc};

/// Summarize one cycle from the raw snapshot and the creates planned for it.
///
/// `snapshot_premium_pct` is rounded to two decimals and is `0.0` for an
/// empty snapshot. `ts_hour` is `cycle_start` truncated to the hour.
///
/// # Arguments
///
/// * `scraped` - The raw snapshot, duplicates included
/// * `creates` - Records the reconciler planned to create this cycle
/// * `cycle_start` - When the cycle began
///
/// # Returns
///
/// A [`RunMetrics`] row ready for the store. Snapshot counts come from
/// `scraped`; `new_premium_count` counts creates flagged premium.
///
/// # Examples
///
/// ```ignore
/// let m = aggregate(&scraped, &plan.creates, Utc::now());
/// assert!(m.snapshot_premium_pct <= 100.0);
/// ```
pub fn aggregate(
    scraped: &[ScrapedArticle],
    creates: &[ArticleRecord],
    cycle_start: DateTime<Utc>,
) -> RunMetrics {
    let snapshot_total = scraped.len();
    let snapshot_premium = scraped.iter().filter(|a| a.is_premium).count();

    RunMetrics {
        ts_hour: iso_utc(hour_bucket(cycle_start)),
        snapshot_total,
        snapshot_premium,
        snapshot_premium_pct: premium_pct(snapshot_premium, snapshot_total),
        new_count: creates.len(),
        new_premium_count: creates.iter().filter(|c| c.is_premium).count(),
    }
}

/// Share of premium articles in percent, two decimals.
pub fn premium_pct(premium: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(premium as f64 / total as f64 * 100.0, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn scraped(id: &str, is_premium: bool) -> ScrapedArticle {
        ScrapedArticle {
            id: id.to_string(),
            title: format!("Title {id}"),
            url: format!("/sport/{id}.bild.html"),
            category: Some("sport".to_string()),
            is_premium,
        }
    }

    #[test]
    fn test_premium_pct_zero_total() {
        assert_eq!(premium_pct(0, 0), 0.0);
    }

    #[test]
    fn test_premium_pct_rounding() {
        assert_eq!(premium_pct(1, 2), 50.0);
        assert_eq!(premium_pct(1, 3), 33.33);
        assert_eq!(premium_pct(2, 3), 66.67);
        assert_eq!(premium_pct(7, 7), 100.0);
        assert_eq!(premium_pct(0, 9), 0.0);
        for total in 1..50usize {
            for premium in 0..=total {
                let pct = premium_pct(premium, total);
                let exact = premium as f64 / total as f64 * 100.0;
                assert!((0.0..=100.0).contains(&pct));
                assert!((pct - exact).abs() <= 0.005 + 1e-9);
            }
        }
    }

    #[test]
    fn test_aggregate_fresh_store_scenario() {
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 14, 37, 12).unwrap();
        let snapshot = vec![scraped("a1", true), scraped("a2", false)];
        let plan = reconcile(&HashMap::new(), &snapshot, start);

        let metrics = aggregate(&snapshot, &plan.creates, start);
        assert_eq!(metrics.ts_hour, "2025-05-06T14:00:00+00:00");
        assert_eq!(metrics.snapshot_total, 2);
        assert_eq!(metrics.snapshot_premium, 1);
        assert_eq!(metrics.snapshot_premium_pct, 50.0);
        assert_eq!(metrics.new_count, 2);
        assert_eq!(metrics.new_premium_count, 1);
    }

    #[test]
    fn test_aggregate_empty_snapshot() {
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 0, 5, 0).unwrap();
        let metrics = aggregate(&[], &[], start);
        assert_eq!(metrics.snapshot_total, 0);
        assert_eq!(metrics.snapshot_premium_pct, 0.0);
        assert_eq!(metrics.new_count, 0);
        assert_eq!(metrics.ts_hour, "2025-05-06T00:00:00+00:00");
    }

    #[test]
    fn test_aggregate_counts_only_creates_as_new() {
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 9, 0, 0).unwrap();
        let snapshot = vec![scraped("a1", true), scraped("a2", true), scraped("a3", false)];
        let known = snapshot[0].clone();
        let stored: HashMap<_, _> = reconcile(&HashMap::new(), &[known], start)
            .creates
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        let plan = reconcile(&stored, &snapshot, start);

        let metrics = aggregate(&snapshot, &plan.creates, start);
        assert_eq!(metrics.snapshot_total, 3);
        assert_eq!(metrics.snapshot_premium, 2);
        assert_eq!(metrics.snapshot_premium_pct, 66.67);
        assert_eq!(metrics.new_count, 2);
        assert_eq!(metrics.new_premium_count, 1);
    }
}
