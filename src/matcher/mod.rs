//! Multi-signal similarity scorer deciding whether two scraped games are
//! the same event, grounded on
//! `examples/original_source/PythonScraper/core/matching.py`.

use crate::model::Sport;
use crate::normalizer::{extract_categories, normalize_team, normalize_tennis_player};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct MatchScore {
    pub is_match: bool,
    pub confidence: f64,
    pub team_score: f64,
    pub time_score: f64,
    pub league_score: f64,
    pub odds_bonus: f64,
    pub swapped: bool,
}

/// Anything the matcher needs about one side of a candidate comparison.
pub struct MatchCandidate<'a> {
    pub team1: &'a str,
    pub team2: &'a str,
    pub start_time: DateTime<Utc>,
    pub league: Option<&'a str>,
    pub odds: Option<&'a [f64]>,
}

pub struct Matcher {
    pub threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    fn normalize_side(name: &str, sport: Sport) -> String {
        if matches!(sport, Sport::Tennis) {
            normalize_tennis_player(name)
        } else {
            normalize_team(name)
        }
    }

    /// Normalized Levenshtein ratio in 0..100, matching rapidfuzz's
    /// `fuzz.ratio` semantics closely enough for this scorer's purposes.
    fn ratio(a: &str, b: &str) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 100.0;
        }
        strsim::normalized_levenshtein(a, b) * 100.0
    }

    /// Team-name similarity, both in declared order and swapped, after
    /// applying the category hard filter. Returns `(score, swapped)`.
    pub fn team_similarity(
        &self,
        team1_a: &str,
        team2_a: &str,
        team1_b: &str,
        team2_b: &str,
        sport: Sport,
    ) -> (f64, bool) {
        let cats_a = extract_categories(team1_a, team2_a);
        let cats_b = extract_categories(team1_b, team2_b);
        if cats_a != cats_b {
            return (0.0, false);
        }

        let t1a = Self::normalize_side(team1_a, sport);
        let t2a = Self::normalize_side(team2_a, sport);
        let t1b = Self::normalize_side(team1_b, sport);
        let t2b = Self::normalize_side(team2_b, sport);

        let normal = (Self::ratio(&t1a, &t1b) + Self::ratio(&t2a, &t2b)) / 2.0;
        let swapped = (Self::ratio(&t1a, &t2b) + Self::ratio(&t2a, &t1b)) / 2.0;

        if swapped > normal {
            (swapped, true)
        } else {
            (normal, false)
        }
    }

    /// Time proximity score, declining from 100 as |Δt| grows, per the
    /// sport-specific window curve.
    pub fn time_score(&self, time_a: DateTime<Utc>, time_b: DateTime<Utc>, sport: Sport) -> f64 {
        let window = sport.time_window_minutes() as f64;
        let diff_minutes = (time_a - time_b).num_seconds().unsigned_abs() as f64 / 60.0;

        if diff_minutes > window * 4.0 {
            return 0.0;
        }
        if diff_minutes <= 5.0 {
            return 100.0;
        }
        if diff_minutes <= window {
            return 100.0 - (diff_minutes - 5.0) / (window - 5.0) * 20.0;
        }
        (80.0 - (diff_minutes - window) / (window * 3.0) * 80.0).max(0.0)
    }

    /// League-name bonus: +10 if similarity >= 80, +5 if >= 60, else 0.
    pub fn league_bonus(&self, league_a: Option<&str>, league_b: Option<&str>) -> f64 {
        match (league_a, league_b) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
                let sim = Self::ratio(&normalize_team(a), &normalize_team(b));
                if sim >= 80.0 {
                    10.0
                } else if sim >= 60.0 {
                    5.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Odds-similarity bonus: +5 if every pairwise odd is within ±20%.
    pub fn odds_bonus(&self, odds_a: Option<&[f64]>, odds_b: Option<&[f64]>) -> f64 {
        match (odds_a, odds_b) {
            (Some(a), Some(b)) if !a.is_empty() && a.len() == b.len() => {
                let all_within = a.iter().zip(b.iter()).all(|(&oa, &ob)| {
                    if oa <= 0.0 || ob <= 0.0 {
                        return true;
                    }
                    let ratio = oa.min(ob) / oa.max(ob);
                    ratio >= 0.80
                });
                if all_within {
                    5.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Score a single pair and decide whether they denote the same event.
    #[allow(clippy::too_many_arguments)]
    pub fn score(
        &self,
        team1_a: &str,
        team2_a: &str,
        team1_b: &str,
        team2_b: &str,
        sport: Sport,
        time_a: DateTime<Utc>,
        time_b: DateTime<Utc>,
        league_a: Option<&str>,
        league_b: Option<&str>,
        odds_a: Option<&[f64]>,
        odds_b: Option<&[f64]>,
    ) -> MatchScore {
        let (team_score, swapped) =
            self.team_similarity(team1_a, team2_a, team1_b, team2_b, sport);
        let time_score = self.time_score(time_a, time_b, sport);
        let league_score = self.league_bonus(league_a, league_b);
        let odds_bonus = self.odds_bonus(odds_a, odds_b);

        let weighted = team_score * 0.70 + time_score * 0.20 + league_score * 0.05 + odds_bonus * 0.05;

        let is_match = team_score >= 92.0
            || (team_score >= 80.0 && time_score >= 60.0)
            || (team_score >= 70.0 && time_score >= 90.0)
            || weighted >= self.threshold;

        MatchScore {
            is_match,
            confidence: weighted,
            team_score,
            time_score,
            league_score,
            odds_bonus,
            swapped,
        }
    }

    /// Find the best-scoring candidate among a list already filtered by
    /// sport and a broad time window.
    pub fn find_best_match<'a>(
        &self,
        team1: &str,
        team2: &str,
        sport: Sport,
        start_time: DateTime<Utc>,
        league: Option<&str>,
        odds: Option<&[f64]>,
        candidates: &'a [MatchCandidate<'a>],
    ) -> Option<(usize, MatchScore)> {
        let mut best: Option<(usize, MatchScore)> = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            let score = self.score(
                team1,
                team2,
                candidate.team1,
                candidate.team2,
                sport,
                start_time,
                candidate.start_time,
                league,
                candidate.league,
                odds,
                candidate.odds,
            );

            if score.is_match {
                let replace = match &best {
                    None => true,
                    Some((_, b)) => score.confidence > b.confidence,
                };
                if replace {
                    best = Some((idx, score));
                }
            }
        }

        best
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(75.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        chrono::Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
    }
    use chrono::TimeZone;

    #[test]
    fn cyrillic_and_women_marker_differences_score_zero_across_category() {
        let matcher = Matcher::default();
        // Same spelling modulo script, but one pair is the women's side.
        let (score, _) = matcher.team_similarity(
            "Партизан", "Црвена Звезда (W)",
            "Partizan", "Crvena Zvezda",
            Sport::Football,
        );
        assert_eq!(score, 0.0);
    }

    #[test]
    fn cyrillic_latin_same_category_scores_high() {
        let matcher = Matcher::default();
        let (score, _) = matcher.team_similarity(
            "Партизан", "Црвена Звезда",
            "Partizan", "Crvena Zvezda",
            Sport::Football,
        );
        assert!(score > 80.0, "expected high similarity, got {score}");
    }

    #[test]
    fn tennis_initial_form_matches() {
        let matcher = Matcher::default();
        let (score, _) =
            matcher.team_similarity("Novak Djokovic", "Carlos Alcaraz", "N. Djokovic", "C. Alcaraz", Sport::Tennis);
        assert!(score > 90.0);
    }

    #[test]
    fn time_score_curve() {
        let matcher = Matcher::default();
        assert_eq!(matcher.time_score(t(20, 0), t(20, 4), Sport::Football), 100.0);
        assert!(matcher.time_score(t(20, 0), t(20, 30), Sport::Football) < 100.0);
        assert_eq!(matcher.time_score(t(20, 0), t(23, 0), Sport::Football), 0.0);
    }

    #[test]
    fn category_guard_blocks_fusion_despite_identical_names() {
        let matcher = Matcher::default();
        let score = matcher.score(
            "USA", "Brazil",
            "USA U19", "Brazil U19",
            Sport::Football,
            t(18, 0), t(18, 0),
            None, None, None, None,
        );
        assert!(!score.is_match);
        assert_eq!(score.team_score, 0.0);
    }
}
