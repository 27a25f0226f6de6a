//! End-to-end exercises of `Engine::run_cycle` against an in-memory
//! `OddsRepository`, covering the scenarios named in SPEC_FULL.md §8:
//! cross-bookmaker fusion into one match, arbitrage detection once two
//! books disagree enough, dedup across repeated cycles, change-detection
//! gating of `odds_update` events, and partial-scraper-failure isolation.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use odds_core::bus::{BusEvent, UpdateBus};
use odds_core::detector::{ArbitrageDetector, DetectorConfig};
use odds_core::engine::Engine;
use odds_core::error::{ScrapeError, StoreError};
use odds_core::model::{
    ArbitrageOpportunity, BetType, CurrentOddsRow, Match, MatchStatus, ScrapedMatch, ScrapedOdds,
    Sport,
};
use odds_core::scrapers::Scraper;
use odds_core::store::{BulkUpsertResult, OddsRepository};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Minimal in-process store standing in for `Store`: fuses matches by
/// exact (case-insensitive) team-name pair, tracks current odds per
/// `(match_id, bookmaker_id, bet_type, margin, selection)`, and
/// deduplicates arbitrage by hash the same way the Postgres-backed one
/// does via its unique index.
#[derive(Default)]
struct FakeStore {
    matches: Mutex<Vec<Match>>,
    odds: Mutex<HashMap<(i64, i32, i32, i64, String), CurrentOddsRow>>,
    arb_hashes: Mutex<HashSet<String>>,
    next_id: AtomicI64,
}

impl FakeStore {
    fn new() -> Self {
        Self::default()
    }

    fn odds_key(row: &CurrentOddsRow) -> (i64, i32, i32, i64, String) {
        (
            row.match_id,
            row.bookmaker_id,
            row.bet_type_id,
            (row.margin * 1000.0).round() as i64,
            row.selection.clone(),
        )
    }
}

#[async_trait]
impl OddsRepository for FakeStore {
    async fn resolve_or_create_match(&self, scraped: &ScrapedMatch, _bookmaker_id: i32) -> Result<i64, StoreError> {
        let mut matches = self.matches.lock().await;
        if let Some(existing) = matches.iter().find(|m| {
            m.sport == scraped.sport
                && m.team1.eq_ignore_ascii_case(&scraped.team1)
                && m.team2.eq_ignore_ascii_case(&scraped.team2)
        }) {
            return Ok(existing.id);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        matches.push(Match {
            id,
            team1: scraped.team1.clone(),
            team2: scraped.team2.clone(),
            team1_norm: scraped.team1.to_lowercase(),
            team2_norm: scraped.team2.to_lowercase(),
            sport: scraped.sport,
            start_time: scraped.start_time,
            league: scraped.league.clone(),
            external_ids: HashMap::new(),
            status: MatchStatus::Upcoming,
        });
        Ok(id)
    }

    async fn bulk_upsert(&self, scraped_matches: &[ScrapedMatch], bookmaker_id: i32) -> Result<Vec<BulkUpsertResult>, StoreError> {
        let mut results = Vec::new();
        for scraped in scraped_matches {
            let match_id = self.resolve_or_create_match(scraped, bookmaker_id).await?;
            let mut any_changed = false;
            let mut changed_bet_type_ids = Vec::new();
            let mut odds = self.odds.lock().await;

            for o in &scraped.odds {
                let row = CurrentOddsRow {
                    match_id,
                    bookmaker_id,
                    bet_type_id: o.bet_type.id(),
                    margin: o.margin,
                    selection: o.selection.clone(),
                    odd1: o.odd1,
                    odd2: o.odd2,
                    odd3: o.odd3,
                };
                let key = FakeStore::odds_key(&row);
                let changed = match odds.get(&key) {
                    Some(existing) => {
                        (existing.odd1 - row.odd1).abs() > 1e-9
                            || existing.odd2 != row.odd2
                            || existing.odd3 != row.odd3
                    }
                    None => true,
                };
                if changed {
                    any_changed = true;
                    changed_bet_type_ids.push(o.bet_type.id());
                }
                odds.insert(key, row);
            }

            results.push(BulkUpsertResult {
                match_id,
                sport_id: scraped.sport.id(),
                team1: scraped.team1.clone(),
                team2: scraped.team2.clone(),
                any_odds_changed: any_changed,
                changed_bet_type_ids,
            });
        }
        Ok(results)
    }

    async fn current_odds_for_match(&self, match_id: i64) -> Result<Vec<CurrentOddsRow>, StoreError> {
        let odds = self.odds.lock().await;
        Ok(odds.values().filter(|r| r.match_id == match_id).cloned().collect())
    }

    async fn upcoming_matches(&self, _within_hours: i64, limit: i64) -> Result<Vec<Match>, StoreError> {
        let matches = self.matches.lock().await;
        Ok(matches
            .iter()
            .filter(|m| m.status == MatchStatus::Upcoming)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_finished(&self, _grace_hours: i64) -> Result<Vec<i64>, StoreError> {
        Ok(Vec::new())
    }

    async fn insert_arbitrage(&self, opp: &ArbitrageOpportunity) -> Result<Option<i64>, StoreError> {
        let mut hashes = self.arb_hashes.lock().await;
        if hashes.contains(&opp.arb_hash) {
            return Ok(None);
        }
        hashes.insert(opp.arb_hash.clone());
        Ok(Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn cleanup(&self, _retention_days: i64, _finish_grace_hours: i64) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A scraper that always returns one fixed match with one fixed set of
/// three-way odds, standing in for a real bookmaker adapter.
struct FixedScraper {
    id: i32,
    name: &'static str,
    team1: &'static str,
    team2: &'static str,
    odd1: f64,
    odd2: f64,
    odd3: f64,
    start_time: chrono::DateTime<Utc>,
}

#[async_trait]
impl Scraper for FixedScraper {
    fn bookmaker_id(&self) -> i32 {
        self.id
    }

    fn bookmaker_name(&self) -> &'static str {
        self.name
    }

    fn supported_sports(&self) -> &'static [Sport] {
        &[Sport::Football]
    }

    async fn scrape_sport(&self, _sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError> {
        Ok(vec![ScrapedMatch {
            team1: self.team1.to_string(),
            team2: self.team2.to_string(),
            sport: Sport::Football,
            start_time: self.start_time,
            league: None,
            external_id: None,
            odds: vec![ScrapedOdds {
                bet_type: BetType::ThreeWay,
                margin: 0.0,
                selection: "1x2".to_string(),
                odd1: self.odd1,
                odd2: Some(self.odd2),
                odd3: Some(self.odd3),
            }],
        }])
    }
}

/// A scraper whose `scrape_sport` always fails, to verify a single dead
/// bookmaker never blocks the others or aborts the cycle.
struct FailingScraper;

#[async_trait]
impl Scraper for FailingScraper {
    fn bookmaker_id(&self) -> i32 {
        99
    }

    fn bookmaker_name(&self) -> &'static str {
        "DeadBook"
    }

    fn supported_sports(&self) -> &'static [Sport] {
        &[Sport::Football]
    }

    async fn scrape_sport(&self, _sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError> {
        Err(ScrapeError::Timeout { url: "https://example.invalid".to_string() })
    }
}

fn engine_with(store: Arc<FakeStore>) -> Engine {
    let detector = ArbitrageDetector::new(DetectorConfig { min_profit_pct: 1.0 });
    let bus = Arc::new(UpdateBus::new());
    Engine::new(store, detector, bus, std::time::Duration::from_secs(1))
}

#[tokio::test]
async fn cross_bookmaker_odds_fuse_into_one_match_and_surface_arbitrage() {
    let store = Arc::new(FakeStore::new());
    let mut engine = engine_with(store.clone());

    let start_time = Utc::now() + ChronoDuration::hours(2);
    engine.register_scraper(Arc::new(FixedScraper {
        id: 1,
        name: "BookA",
        team1: "Partizan",
        team2: "Javor",
        odd1: 2.10,
        odd2: 3.40,
        odd3: 4.20,
        start_time,
    }));
    engine.register_scraper(Arc::new(FixedScraper {
        id: 2,
        name: "BookB",
        team1: "Partizan",
        team2: "Javor",
        odd1: 2.20,
        odd2: 3.60,
        odd3: 3.00,
        start_time,
    }));

    let stats = engine.run_cycle().await;

    assert_eq!(stats.matches_scraped, 2);
    assert_eq!(store.matches.lock().await.len(), 1, "both books' odds should fuse into one match");
    assert_eq!(stats.arbitrage_found, 1, "home@B + draw@B + away@A beats 100% implied probability");
}

#[tokio::test]
async fn repeated_cycle_does_not_redetect_the_same_arbitrage() {
    let store = Arc::new(FakeStore::new());
    let mut engine = engine_with(store.clone());

    let start_time = Utc::now() + ChronoDuration::hours(2);
    engine.register_scraper(Arc::new(FixedScraper {
        id: 1,
        name: "BookA",
        team1: "Radnicki",
        team2: "Cukaricki",
        odd1: 2.10,
        odd2: 3.40,
        odd3: 4.20,
        start_time,
    }));
    engine.register_scraper(Arc::new(FixedScraper {
        id: 2,
        name: "BookB",
        team1: "Radnicki",
        team2: "Cukaricki",
        odd1: 2.20,
        odd2: 3.60,
        odd3: 3.00,
        start_time,
    }));

    let first = engine.run_cycle().await;
    let second = engine.run_cycle().await;

    assert_eq!(first.arbitrage_found, 1);
    assert_eq!(second.arbitrage_found, 0, "same odds, same hash, already active");
}

#[tokio::test]
async fn unchanged_odds_do_not_report_a_changed_row_on_the_next_cycle() {
    let store = Arc::new(FakeStore::new());
    let mut engine = engine_with(store.clone());

    let start_time = Utc::now() + ChronoDuration::hours(2);
    engine.register_scraper(Arc::new(FixedScraper {
        id: 1,
        name: "BookA",
        team1: "Vozdovac",
        team2: "Napredak",
        odd1: 1.95,
        odd2: 3.30,
        odd3: 3.80,
        start_time,
    }));

    let first = engine.run_cycle().await;
    let second = engine.run_cycle().await;

    assert_eq!(first.odds_rows_changed, 1);
    assert_eq!(second.odds_rows_changed, 0, "identical odds on the next cycle should not register as changed");
}

#[tokio::test]
async fn one_dead_bookmaker_does_not_block_the_others() {
    let store = Arc::new(FakeStore::new());
    let mut engine = engine_with(store.clone());

    engine.register_scraper(Arc::new(FailingScraper));
    engine.register_scraper(Arc::new(FixedScraper {
        id: 1,
        name: "BookA",
        team1: "Spartak",
        team2: "Backa",
        odd1: 1.80,
        odd2: 3.50,
        odd3: 4.00,
        start_time: Utc::now() + ChronoDuration::hours(2),
    }));

    let stats = engine.run_cycle().await;

    assert_eq!(stats.matches_scraped, 1, "the failing bookmaker contributes nothing but does not abort the cycle");
    assert_eq!(store.matches.lock().await.len(), 1);
}

#[tokio::test]
async fn arbitrage_events_are_published_on_the_bus() {
    let store = Arc::new(FakeStore::new());
    let detector = ArbitrageDetector::new(DetectorConfig { min_profit_pct: 1.0 });
    let bus = Arc::new(UpdateBus::new());

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    bus.subscribe_sync(&["arbitrage"], move |envelope| {
        if let BusEvent::Arbitrage(_) = envelope.event {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let mut engine = Engine::new(store, detector, bus, std::time::Duration::from_secs(1));
    let start_time = Utc::now() + ChronoDuration::hours(2);
    engine.register_scraper(Arc::new(FixedScraper {
        id: 1,
        name: "BookA",
        team1: "Mladost",
        team2: "Radnik",
        odd1: 2.10,
        odd2: 3.40,
        odd3: 4.20,
        start_time,
    }));
    engine.register_scraper(Arc::new(FixedScraper {
        id: 2,
        name: "BookB",
        team1: "Mladost",
        team2: "Radnik",
        odd1: 2.20,
        odd2: 3.60,
        odd3: 3.00,
        start_time,
    }));

    engine.run_cycle().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
