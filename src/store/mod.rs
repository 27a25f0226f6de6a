//! Postgres-backed persistence: match identity resolution, current-odds
//! upsert with change detection, odds history, and arbitrage bookkeeping
//! grounded on
//! `examples/original_source/PythonScraper/core/db.py`.

use crate::error::StoreError;
use crate::matcher::{MatchCandidate, Matcher};
use crate::model::{ArbitrageOpportunity, CurrentOddsRow, Match, MatchStatus, ScrapedMatch};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

pub struct Store {
    pool: PgPool,
    matcher: Matcher,
    record_history: bool,
}

impl Store {
    pub async fn connect(
        database_url: &str,
        similarity_threshold: f64,
        record_history: bool,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(database_url)
            .await?;

        Ok(Self { pool, matcher: Matcher::new(similarity_threshold), record_history })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Load every `Upcoming` match in `sport`'s window starting from
    /// `now - window` through `now + window`, used as the candidate pool
    /// for fixture resolution, giving the matcher a broad enough time
    /// window to consider.
    async fn candidate_matches(&self, sport_id: i32, now: DateTime<Utc>, window_minutes: i64) -> Result<Vec<Match>, StoreError> {
        let from = now - Duration::minutes(window_minutes * 4);
        let to = now + Duration::minutes(window_minutes * 4);

        let rows = sqlx::query(
            r#"
            SELECT id, team1, team2, team1_norm, team2_norm, sport_id, start_time, league, status
            FROM matches
            WHERE sport_id = $1 AND status = 'upcoming' AND start_time BETWEEN $2 AND $3
            "#,
        )
        .bind(sport_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_match).collect()
    }

    /// Resolve a scraped match to an existing `Match` row, or insert a new
    /// one if no candidate scores above threshold. Mirrors
    /// `db.py::find_matching_match` + `upsert_match`.
    pub async fn resolve_or_create_match(
        &self,
        scraped: &ScrapedMatch,
        bookmaker_id: i32,
    ) -> Result<i64, StoreError> {
        let sport_id = scraped.sport.id();
        let window = scraped.sport.time_window_minutes();
        let candidates = self.candidate_matches(sport_id, scraped.start_time, window).await?;

        let odds_prices: Vec<f64> = scraped.odds.iter().map(|o| o.odd1).collect();
        let candidate_refs: Vec<MatchCandidate> = candidates
            .iter()
            .map(|m| MatchCandidate {
                team1: &m.team1,
                team2: &m.team2,
                start_time: m.start_time,
                league: m.league.as_deref(),
                odds: None,
            })
            .collect();

        let best = self.matcher.find_best_match(
            &scraped.team1,
            &scraped.team2,
            scraped.sport,
            scraped.start_time,
            scraped.league.as_deref(),
            if odds_prices.is_empty() { None } else { Some(&odds_prices) },
            &candidate_refs,
        );

        if let Some((idx, score)) = best {
            let matched = &candidates[idx];
            debug!(match_id = matched.id, confidence = score.confidence, "fixture resolved to existing match");
            if let Some(external_id) = scraped.external_id.as_deref() {
                self.link_external_id(matched.id, bookmaker_id, external_id).await?;
            }
            return Ok(matched.id);
        }

        self.insert_match(scraped, bookmaker_id).await
    }

    async fn insert_match(&self, scraped: &ScrapedMatch, bookmaker_id: i32) -> Result<i64, StoreError> {
        let team1_norm = crate::normalizer::normalize_team(&scraped.team1);
        let team2_norm = crate::normalizer::normalize_team(&scraped.team2);
        let external_ids = serde_json::json!({ (bookmaker_id.to_string()): scraped.external_id });

        let row = sqlx::query(
            r#"
            INSERT INTO matches (team1, team2, team1_norm, team2_norm, sport_id, start_time, league, external_ids, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'upcoming')
            RETURNING id
            "#,
        )
        .bind(&scraped.team1)
        .bind(&scraped.team2)
        .bind(&team1_norm)
        .bind(&team2_norm)
        .bind(scraped.sport.id())
        .bind(scraped.start_time)
        .bind(&scraped.league)
        .bind(external_ids)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        info!(match_id = id, team1 = %scraped.team1, team2 = %scraped.team2, "created new match");
        Ok(id)
    }

    async fn link_external_id(&self, match_id: i64, bookmaker_id: i32, external_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE matches
            SET external_ids = external_ids || jsonb_build_object($2::text, $3::text)
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .bind(bookmaker_id.to_string())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert one bookmaker's odds for one bet-type/selection on a match.
    /// Returns `true` if the stored row actually changed (a real move, not
    /// noise), which gates whether history gets a new row and whether the
    /// caller should treat this as a fresh signal for arbitrage detection.
    pub async fn upsert_current_odds(
        &self,
        match_id: i64,
        bookmaker_id: i32,
        bet_type_id: i32,
        margin: f64,
        selection: &str,
        odd1: f64,
        odd2: Option<f64>,
        odd3: Option<f64>,
    ) -> Result<bool, StoreError> {
        let existing = sqlx::query_as::<_, CurrentOddsRow>(
            r#"
            SELECT match_id, bookmaker_id, bet_type_id, margin, selection, odd1, odd2, odd3
            FROM current_odds
            WHERE match_id = $1 AND bookmaker_id = $2 AND bet_type_id = $3 AND margin = $4 AND selection = $5
            "#,
        )
        .bind(match_id)
        .bind(bookmaker_id)
        .bind(bet_type_id)
        .bind(margin)
        .bind(selection)
        .fetch_optional(&self.pool)
        .await?;

        let changed = match &existing {
            None => true,
            Some(row) => !odds_equal(row.odd1, odd1) || !opt_odds_equal(row.odd2, odd2) || !opt_odds_equal(row.odd3, odd3),
        };

        sqlx::query(
            r#"
            INSERT INTO current_odds (match_id, bookmaker_id, bet_type_id, margin, selection, odd1, odd2, odd3, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (match_id, bookmaker_id, bet_type_id, margin, selection)
            DO UPDATE SET odd1 = $6, odd2 = $7, odd3 = $8, updated_at = now()
            "#,
        )
        .bind(match_id)
        .bind(bookmaker_id)
        .bind(bet_type_id)
        .bind(margin)
        .bind(selection)
        .bind(odd1)
        .bind(odd2)
        .bind(odd3)
        .execute(&self.pool)
        .await?;

        if changed && self.record_history {
            self.record_odds_history(match_id, bookmaker_id, bet_type_id, margin, selection, odd1, odd2, odd3).await?;
        }

        Ok(changed)
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_odds_history(
        &self,
        match_id: i64,
        bookmaker_id: i32,
        bet_type_id: i32,
        margin: f64,
        selection: &str,
        odd1: f64,
        odd2: Option<f64>,
        odd3: Option<f64>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO odds_history (match_id, bookmaker_id, bet_type_id, margin, selection, odd1, odd2, odd3, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            "#,
        )
        .bind(match_id)
        .bind(bookmaker_id)
        .bind(bet_type_id)
        .bind(margin)
        .bind(selection)
        .bind(odd1)
        .bind(odd2)
        .bind(odd3)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Batched flush of one scraper cycle's results for one bookmaker
    /// `bulk_upsert`: resolve each scraped match's identity
    /// and upsert every odds row. Like the teacher's Pinnacle flush, this
    /// leans on each row-level write being atomic and idempotent rather
    /// than wrapping the whole batch in an explicit SQL transaction — a
    /// failure partway through still leaves every prior row correctly
    /// written, and the caller (the engine) only needs "this bookmaker's
    /// data for this cycle," not all-or-nothing.
    pub async fn bulk_upsert(
        &self,
        scraped_matches: &[ScrapedMatch],
        bookmaker_id: i32,
    ) -> Result<Vec<BulkUpsertResult>, StoreError> {
        let mut results = Vec::with_capacity(scraped_matches.len());

        for scraped in scraped_matches {
            let match_id = self.resolve_or_create_match(scraped, bookmaker_id).await?;

            let mut any_changed = false;
            let mut changed_rows = Vec::new();
            for odds in &scraped.odds {
                let changed = self
                    .upsert_current_odds(
                        match_id,
                        bookmaker_id,
                        odds.bet_type.id(),
                        odds.margin,
                        &odds.selection,
                        odds.odd1,
                        odds.odd2,
                        odds.odd3,
                    )
                    .await?;
                if changed {
                    any_changed = true;
                    changed_rows.push(odds.bet_type.id());
                }
            }

            results.push(BulkUpsertResult {
                match_id,
                sport_id: scraped.sport.id(),
                team1: scraped.team1.clone(),
                team2: scraped.team2.clone(),
                any_odds_changed: any_changed,
                changed_bet_type_ids: changed_rows,
            });
        }

        Ok(results)
    }

    pub async fn current_odds_for_match(&self, match_id: i64) -> Result<Vec<CurrentOddsRow>, StoreError> {
        let rows = sqlx::query_as::<_, CurrentOddsRow>(
            r#"
            SELECT match_id, bookmaker_id, bet_type_id, margin, selection, odd1, odd2, odd3
            FROM current_odds
            WHERE match_id = $1
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Upcoming matches within `within_hours`, ordered by `start_time`,
    /// capped at `limit` — the detector's per-cycle scan scope (a 24h
    /// horizon, bounded to a few hundred matches).
    pub async fn upcoming_matches(&self, within_hours: i64, limit: i64) -> Result<Vec<Match>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, team1, team2, team1_norm, team2_norm, sport_id, start_time, league, status
            FROM matches
            WHERE status = 'upcoming' AND start_time <= now() + ($1 || ' hours')::interval
            ORDER BY start_time ASC
            LIMIT $2
            "#,
        )
        .bind(within_hours.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_match).collect()
    }

    /// Transition every `Upcoming` match whose `start_time` is more than
    /// `grace_hours` in the past to `Finished`, and deactivate the
    /// arbitrage rows attached to them. Returns the transitioned match
    /// ids so the engine can log/stop watching them. Monotonic: a
    /// finished match is never reconsidered here.
    pub async fn mark_finished(&self, grace_hours: i64) -> Result<Vec<i64>, StoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            UPDATE matches
            SET status = 'finished'
            WHERE status = 'upcoming' AND start_time <= now() - ($1 || ' hours')::interval
            RETURNING id
            "#,
        )
        .bind(grace_hours.to_string())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.into_iter().map(|(id,)| id).collect();

        if !ids.is_empty() {
            sqlx::query("UPDATE arbitrage_opportunities SET is_active = false WHERE is_active = true AND match_id = ANY($1)")
                .bind(&ids)
                .execute(&self.pool)
                .await?;
            info!(count = ids.len(), "transitioned matches to finished");
        }

        Ok(ids)
    }

    /// Insert a freshly detected arbitrage opportunity. `arb_hash` has a
    /// partial-unique index over active rows, so concurrent writers racing
    /// on the same hash are resolved by the database, not by a
    /// check-then-insert in this method: the loser's unique violation is
    /// absorbed here as "already known", per the store-conflict policy in
    /// spec §7 ("treated as already inserted; upsert semantics absorb it").
    pub async fn insert_arbitrage(&self, opp: &ArbitrageOpportunity) -> Result<Option<i64>, StoreError> {
        let per_outcome = serde_json::to_value(&opp.per_outcome_best)?;
        let stakes = serde_json::to_value(&opp.stakes)?;

        let result = sqlx::query(
            r#"
            INSERT INTO arbitrage_opportunities
                (match_id, sport_id, bet_type_id, margin, profit_pct, per_outcome_best, stakes, arb_hash, detected_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true)
            RETURNING id
            "#,
        )
        .bind(opp.match_id)
        .bind(opp.sport_id)
        .bind(opp.bet_type_id)
        .bind(opp.margin)
        .bind(opp.profit_pct)
        .bind(per_outcome)
        .bind(stakes)
        .bind(&opp.arb_hash)
        .bind(opp.detected_at)
        .bind(opp.expires_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(Some(row.try_get("id")?)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    /// Deactivate arbitrage rows whose match has started or already
    /// finished — they're no longer actionable.
    pub async fn deactivate_expired_arbitrage(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE arbitrage_opportunities SET is_active = false WHERE is_active = true AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete odds-history rows older than `retention_days`, per spec
    /// §6/§9 (history is operational, not a long-term analytics store).
    pub async fn cleanup_old_history(&self, retention_days: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM odds_history WHERE recorded_at < now() - ($1 || ' days')::interval")
            .bind(retention_days.to_string())
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected();
        if deleted > 0 {
            warn!(deleted, retention_days, "pruned stale odds history");
        }
        Ok(deleted)
    }

    /// Scheduled maintenance, kept out of the hot cycle: prune stale
    /// history, transition
    /// matches whose grace window has elapsed, and deactivate any
    /// arbitrage rows that slipped past their `expires_at` without a
    /// matching `mark_finished` run.
    pub async fn cleanup(&self, retention_days: i64, finish_grace_hours: i64) -> Result<(), StoreError> {
        self.cleanup_old_history(retention_days).await?;
        self.mark_finished(finish_grace_hours).await?;
        self.deactivate_expired_arbitrage(Utc::now()).await?;
        Ok(())
    }
}

/// One scraped match's flush outcome, used by the engine to emit
/// `odds_update` events and tally per-cycle counts.
#[derive(Debug, Clone)]
pub struct BulkUpsertResult {
    pub match_id: i64,
    pub sport_id: i32,
    pub team1: String,
    pub team2: String,
    pub any_odds_changed: bool,
    pub changed_bet_type_ids: Vec<i32>,
}

/// The store's contract as the engine and detector see it — the async
/// analogue of the `Scraper` trait in `scrapers/mod.rs`. Exists so the
/// scheduler and detector can be exercised in tests against an in-memory
/// fake without a live Postgres instance.
#[async_trait::async_trait]
pub trait OddsRepository: Send + Sync {
    async fn resolve_or_create_match(&self, scraped: &ScrapedMatch, bookmaker_id: i32) -> Result<i64, StoreError>;

    async fn bulk_upsert(&self, scraped_matches: &[ScrapedMatch], bookmaker_id: i32) -> Result<Vec<BulkUpsertResult>, StoreError>;

    async fn current_odds_for_match(&self, match_id: i64) -> Result<Vec<CurrentOddsRow>, StoreError>;

    async fn upcoming_matches(&self, within_hours: i64, limit: i64) -> Result<Vec<Match>, StoreError>;

    async fn mark_finished(&self, grace_hours: i64) -> Result<Vec<i64>, StoreError>;

    async fn insert_arbitrage(&self, opp: &ArbitrageOpportunity) -> Result<Option<i64>, StoreError>;

    async fn cleanup(&self, retention_days: i64, finish_grace_hours: i64) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl OddsRepository for Store {
    async fn resolve_or_create_match(&self, scraped: &ScrapedMatch, bookmaker_id: i32) -> Result<i64, StoreError> {
        Store::resolve_or_create_match(self, scraped, bookmaker_id).await
    }

    async fn bulk_upsert(&self, scraped_matches: &[ScrapedMatch], bookmaker_id: i32) -> Result<Vec<BulkUpsertResult>, StoreError> {
        Store::bulk_upsert(self, scraped_matches, bookmaker_id).await
    }

    async fn current_odds_for_match(&self, match_id: i64) -> Result<Vec<CurrentOddsRow>, StoreError> {
        Store::current_odds_for_match(self, match_id).await
    }

    async fn upcoming_matches(&self, within_hours: i64, limit: i64) -> Result<Vec<Match>, StoreError> {
        Store::upcoming_matches(self, within_hours, limit).await
    }

    async fn mark_finished(&self, grace_hours: i64) -> Result<Vec<i64>, StoreError> {
        Store::mark_finished(self, grace_hours).await
    }

    async fn insert_arbitrage(&self, opp: &ArbitrageOpportunity) -> Result<Option<i64>, StoreError> {
        Store::insert_arbitrage(self, opp).await
    }

    async fn cleanup(&self, retention_days: i64, finish_grace_hours: i64) -> Result<(), StoreError> {
        Store::cleanup(self, retention_days, finish_grace_hours).await
    }
}

fn odds_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn opt_odds_equal(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => odds_equal(a, b),
        _ => false,
    }
}

/// Builds a `Match` from the common candidate/upcoming-match projection,
/// which does not include `external_ids` (not needed for matching or
/// listing — fetched separately only when linking a new bookmaker id).
fn row_to_match(row: &PgRow) -> Result<Match, StoreError> {
    let sport_id: i32 = row.try_get("sport_id")?;
    let status: String = row.try_get("status")?;

    Ok(Match {
        id: row.try_get("id")?,
        team1: row.try_get("team1")?,
        team2: row.try_get("team2")?,
        team1_norm: row.try_get("team1_norm")?,
        team2_norm: row.try_get("team2_norm")?,
        sport: crate::model::Sport::from_id(sport_id)
            .ok_or_else(|| StoreError::Unavailable(sqlx::Error::ColumnNotFound("sport_id".into())))?,
        start_time: row.try_get("start_time")?,
        league: row.try_get("league")?,
        external_ids: std::collections::HashMap::new(),
        status: if status == "finished" { MatchStatus::Finished } else { MatchStatus::Upcoming },
    })
}
