//! Pre-event arbitrage detection: two- and three-way markets, optimal
//! stake split, and hash-based deduplication, grounded on
//! `examples/original_source/PythonScraper/core/arbitrage.py`.

use crate::model::{ArbOutcome, ArbitrageOpportunity, CurrentOddsRow};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub struct DetectorConfig {
    pub min_profit_pct: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { min_profit_pct: 1.0 }
    }
}

/// Result of evaluating one `(bet_type, margin)` group: the implied
/// probability sum was below 1, so a positive-profit split exists.
pub struct ArbResult {
    pub profit_pct: f64,
    pub best_odds: Vec<ArbOutcome>,
    pub stakes: Vec<f64>,
}

/// Compute an n-way arbitrage from `(bookmaker_id, outcome_tag, odd)`
/// rows, one best price per outcome already selected by the caller.
fn compute_arbitrage(best: &[(i32, String, f64)], min_profit_pct: f64) -> Option<ArbResult> {
    if best.len() < 2 || best.iter().any(|(_, _, odd)| *odd <= 0.0) {
        return None;
    }

    let implied: Vec<f64> = best.iter().map(|(_, _, odd)| 1.0 / odd).collect();
    let total_prob: f64 = implied.iter().sum();

    if total_prob >= 1.0 {
        return None;
    }

    let profit_pct = (1.0 / total_prob - 1.0) * 100.0;
    if profit_pct < min_profit_pct {
        return None;
    }

    let stakes: Vec<f64> = implied.iter().map(|p| (p / total_prob) * 100.0).collect();

    let best_odds = best
        .iter()
        .map(|(bookmaker_id, outcome, odd)| ArbOutcome {
            bookmaker_id: *bookmaker_id,
            outcome: outcome.clone(),
            odd: *odd,
        })
        .collect();

    Some(ArbResult { profit_pct, best_odds, stakes })
}

/// For each outcome slot (0-indexed), find the bookmaker offering the
/// best (highest) odd across all rows in the group.
fn best_per_outcome(
    rows: &[&CurrentOddsRow],
    outcome_labels: &[&str],
) -> Option<Vec<(i32, String, f64)>> {
    let mut best: Vec<Option<(i32, String, f64)>> = vec![None; outcome_labels.len()];

    for row in rows {
        let odds = [Some(row.odd1), row.odd2, row.odd3];
        for (slot, label) in outcome_labels.iter().enumerate() {
            if let Some(odd) = odds.get(slot).copied().flatten() {
                if odd <= 0.0 {
                    continue;
                }
                let better = match &best[slot] {
                    None => true,
                    Some((_, _, current)) => odd > *current,
                };
                if better {
                    best[slot] = Some((row.bookmaker_id, (*label).to_string(), odd));
                }
            }
        }
    }

    best.into_iter().collect()
}

pub struct ArbitrageDetector {
    pub config: DetectorConfig,
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one `(bet_type, margin)` group of current-odds rows
    /// (two-way or three-way depending on arity) for an arbitrage.
    pub fn evaluate_group(&self, rows: &[&CurrentOddsRow], outcomes: u8) -> Option<ArbResult> {
        let labels: &[&str] = match outcomes {
            2 => &["1", "2"],
            3 => &["1", "X", "2"],
            _ => return None,
        };

        let best = best_per_outcome(rows, labels)?;
        compute_arbitrage(&best, self.config.min_profit_pct)
    }

    /// Group current odds by `(bet_type_id, margin)` and evaluate each
    /// group, returning opportunities found for this match (not yet
    /// deduplicated or persisted).
    pub fn detect_for_match(
        &self,
        match_id: i64,
        sport_id: i32,
        current_odds: &[CurrentOddsRow],
        match_start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<ArbitrageOpportunity> {
        let mut groups: HashMap<(i32, i64), Vec<&CurrentOddsRow>> = HashMap::new();
        for row in current_odds {
            // Round margin to 3 decimals for stable grouping (matches
            // the hash's rounding rationale).
            let key = (row.bet_type_id, (row.margin * 1000.0).round() as i64);
            groups.entry(key).or_default().push(row);
        }

        let mut opportunities = Vec::new();

        for ((bet_type_id, margin_key), rows) in groups {
            if rows.len() < 2 {
                continue;
            }
            let outcomes = crate::model::BET_TYPES
                .get(&bet_type_id)
                .map(|info| info.outcomes)
                .unwrap_or(2);

            let Some(result) = self.evaluate_group(&rows, outcomes) else {
                continue;
            };

            let margin = margin_key as f64 / 1000.0;
            let arb_hash = generate_arb_hash(match_id, bet_type_id, margin, &result.best_odds, result.profit_pct);

            opportunities.push(ArbitrageOpportunity {
                id: None,
                match_id,
                sport_id,
                bet_type_id,
                margin,
                profit_pct: result.profit_pct,
                per_outcome_best: result.best_odds,
                stakes: result.stakes,
                arb_hash,
                detected_at: now,
                expires_at: match_start_time,
                is_active: true,
            });
        }

        opportunities
    }
}

impl Default for ArbitrageDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Deterministic hash identifying an arbitrage opportunity, rounding
/// odds to 3 decimals and profit to 2 so odds noise doesn't resurrect
/// "new" opportunities.
pub fn generate_arb_hash(
    match_id: i64,
    bet_type_id: i32,
    margin: f64,
    best_odds: &[ArbOutcome],
    profit_pct: f64,
) -> String {
    let mut sorted: Vec<&ArbOutcome> = best_odds.iter().collect();
    sorted.sort_by(|a, b| a.outcome.cmp(&b.outcome));

    let odds_repr: Vec<String> = sorted
        .iter()
        .map(|o| format!("{}:{}:{:.3}", o.bookmaker_id, o.outcome, o.odd))
        .collect();

    let payload = format!(
        "{match_id}|{bet_type_id}|{:.3}|{}|{:.2}",
        margin,
        odds_repr.join(","),
        profit_pct
    );

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(bookmaker_id: i32, bet_type_id: i32, odd1: f64, odd2: Option<f64>, odd3: Option<f64>) -> CurrentOddsRow {
        CurrentOddsRow {
            match_id: 1,
            bookmaker_id,
            bet_type_id,
            margin: 0.0,
            selection: String::new(),
            odd1,
            odd2,
            odd3,
        }
    }

    #[test]
    fn two_way_no_arbitrage_at_exactly_even_money() {
        let detector = ArbitrageDetector::default();
        let r1 = row(1, 1, 2.00, Some(2.00), None);
        let rows = vec![&r1];
        assert!(detector.evaluate_group(&rows, 2).is_none());
    }

    #[test]
    fn two_way_arbitrage_profit_matches_expected() {
        // 1/2.10 + 1/2.10 = 0.952381 => profit = (1/0.952381 - 1) * 100 = 5.00%
        // (see DESIGN.md for a note on a worked example elsewhere that
        // doesn't reconcile against this formula for these odds).
        let detector = ArbitrageDetector::default();
        let r1 = row(1, 1, 2.10, Some(2.10), None);
        let rows = vec![&r1];
        let result = detector.evaluate_group(&rows, 2).unwrap();
        assert!((result.profit_pct - 5.00).abs() < 0.01, "{}", result.profit_pct);
    }

    #[test]
    fn three_way_arbitrage_profit_and_stakes_match_formula() {
        // 1/3.0 + 1/3.3 + 1/3.5 = 0.922078 => profit ≈ 8.45%. Stakes are the
        // implied-probability shares normalized to 100 (sum to 100 exactly).
        let detector = ArbitrageDetector::default();
        let r1 = row(1, 2, 3.0, Some(3.3), Some(3.5));
        let rows = vec![&r1];
        let result = detector.evaluate_group(&rows, 3).unwrap();
        assert!((result.profit_pct - 8.45).abs() < 0.05, "{}", result.profit_pct);
        let sum: f64 = result.stakes.iter().sum();
        assert!((sum - 100.0).abs() < 0.01);
        assert!((result.stakes[0] - 36.15).abs() < 0.1);
    }

    #[test]
    fn best_odds_pick_across_bookmakers() {
        let detector = ArbitrageDetector::default();
        let a = row(1, 2, 2.10, Some(3.40), Some(4.20));
        let b = row(2, 2, 2.20, Some(3.60), Some(3.00));
        let rows = vec![&a, &b];
        let result = detector.evaluate_group(&rows, 3).unwrap();
        // home @ B (2.20), draw @ B (3.60), away @ A (4.20)
        assert!((result.profit_pct - 3.05).abs() < 0.05, "{}", result.profit_pct);
        assert_eq!(result.best_odds[0].bookmaker_id, 2);
        assert_eq!(result.best_odds[2].bookmaker_id, 1);
    }

    #[test]
    fn hash_stable_under_tiny_odds_noise() {
        let odds = vec![
            ArbOutcome { bookmaker_id: 1, outcome: "1".into(), odd: 2.105 },
            ArbOutcome { bookmaker_id: 2, outcome: "2".into(), odd: 2.104 },
        ];
        let h1 = generate_arb_hash(1, 1, 0.0, &odds, 1.234);
        let odds2 = vec![
            ArbOutcome { bookmaker_id: 1, outcome: "1".into(), odd: 2.1051 },
            ArbOutcome { bookmaker_id: 2, outcome: "2".into(), odd: 2.1041 },
        ];
        let h2 = generate_arb_hash(1, 1, 0.0, &odds2, 1.234);
        assert_eq!(h1, h2);
    }
}
