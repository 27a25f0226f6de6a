//! The scheduler / engine: the periodic, non-overlapping driver loop that
//! fans scrapers out concurrently each cycle, flushes their results
//! through the store, runs the detector, and publishes bus events (spec
//! §4.6), grounded on
//! `examples/original_source/PythonScraper/core/scraper_engine.py`'s
//! `ScraperEngine`, with the concurrent fan-out reshaped around
//! `futures::future::join_all` the way the teacher's
//! `odds-engine/src/pinnacle/mod.rs` drives its own interval loop.

use crate::bus::{BusEvent, OddsUpdatePayload, UpdateBus};
use crate::detector::ArbitrageDetector;
use crate::scrapers::Scraper;
use crate::store::OddsRepository;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Detection scope per cycle: upcoming matches within this horizon (spec
/// §4.5).
const DETECTION_HORIZON_HOURS: i64 = 24;
/// Bound on matches evaluated per cycle.
const DETECTION_MATCH_LIMIT: i64 = 500;
/// Matches stay `Upcoming` for this long past kickoff before the engine
/// transitions them to `Finished`.
const FINISH_GRACE_HOURS: i64 = 4;

/// Aggregate counters for one scheduler cycle, the Rust analogue of
/// `ScraperEngine._stats` plus `run_cycle`'s return value.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub matches_scraped: u64,
    pub odds_rows_changed: u64,
    pub arbitrage_found: u64,
    pub scraper_errors: u64,
    pub duration: Duration,
}

/// Lifetime counters surfaced for observability, separate from the
/// per-cycle `CycleStats` returned by `run_cycle`.
#[derive(Default)]
struct EngineCounters {
    cycles: AtomicU64,
    matches_processed: AtomicU64,
    odds_updated: AtomicU64,
    arbitrage_found: AtomicU64,
    errors: AtomicU64,
}

pub struct Engine {
    store: Arc<dyn OddsRepository>,
    detector: ArbitrageDetector,
    bus: Arc<UpdateBus>,
    scrapers: Vec<Arc<dyn Scraper>>,
    scrape_interval: Duration,
    counters: EngineCounters,
}

impl Engine {
    pub fn new(
        store: Arc<dyn OddsRepository>,
        detector: ArbitrageDetector,
        bus: Arc<UpdateBus>,
        scrape_interval: Duration,
    ) -> Self {
        Self {
            store,
            detector,
            bus,
            scrapers: Vec::new(),
            scrape_interval,
            counters: EngineCounters::default(),
        }
    }

    pub fn register_scraper(&mut self, scraper: Arc<dyn Scraper>) {
        info!(bookmaker = scraper.bookmaker_name(), "registered scraper");
        self.scrapers.push(scraper);
    }

    /// Scrape one bookmaker and flush its results through the store,
    /// publishing an `odds_update` event for every match whose odds
    /// actually moved. A scraper that returns nothing (total failure)
    /// never aborts the cycle, it just contributes zero matches.
    async fn scrape_bookmaker(&self, scraper: &Arc<dyn Scraper>) -> (u64, u64) {
        let start = Instant::now();
        let matches = scraper.scrape_all().await;
        let scraped_count = matches.len() as u64;

        if matches.is_empty() {
            debug!(bookmaker = scraper.bookmaker_name(), elapsed = ?start.elapsed(), "no matches scraped this cycle");
            return (0, 0);
        }

        let flushed = match self.store.bulk_upsert(&matches, scraper.bookmaker_id()).await {
            Ok(results) => results,
            Err(err) => {
                // Spec §7: a store conflict/outage during one bookmaker's
                // flush must not poison the cycle for the others.
                error!(bookmaker = scraper.bookmaker_name(), error = %err, "store flush failed for this bookmaker");
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                return (scraped_count, 0);
            }
        };

        let mut changed_rows = 0u64;
        for result in &flushed {
            if result.any_odds_changed {
                changed_rows += result.changed_bet_type_ids.len() as u64;
                self.bus.publish(BusEvent::OddsUpdate(OddsUpdatePayload {
                    match_id: result.match_id,
                    sport_id: result.sport_id,
                    bookmaker_id: scraper.bookmaker_id(),
                    team1: result.team1.clone(),
                    team2: result.team2.clone(),
                }));
            }
        }

        info!(
            bookmaker = scraper.bookmaker_name(),
            scraped = scraped_count,
            changed = changed_rows,
            elapsed = ?start.elapsed(),
            "bookmaker flush complete"
        );

        (scraped_count, changed_rows)
    }

    /// Query upcoming matches and run the detector over each, persisting
    /// and publishing newly detected (non-duplicate) opportunities (spec
    /// §4.5/§4.6).
    async fn detect_arbitrage(&self) -> Result<u64, crate::error::StoreError> {
        let upcoming = self
            .store
            .upcoming_matches(DETECTION_HORIZON_HOURS, DETECTION_MATCH_LIMIT)
            .await?;

        let mut found = 0u64;
        let now = Utc::now();

        for m in upcoming {
            let current_odds = self.store.current_odds_for_match(m.id).await?;
            if current_odds.is_empty() {
                continue;
            }

            let opportunities =
                self.detector.detect_for_match(m.id, m.sport.id(), &current_odds, m.start_time, now);

            for opp in opportunities {
                match self.store.insert_arbitrage(&opp).await {
                    Ok(Some(_id)) => {
                        found += 1;
                        self.bus.publish(BusEvent::Arbitrage(opp));
                    }
                    Ok(None) => {
                        // Already active under this hash within the dedup
                        // window; not a new signal.
                    }
                    Err(err) => {
                        warn!(match_id = m.id, error = %err, "failed to persist arbitrage opportunity");
                    }
                }
            }
        }

        Ok(found)
    }

    /// Run a single cycle: fan scrapers out concurrently, flush results,
    /// detect arbitrage, transition finished matches. Never panics or
    /// propagates a hard error — a bad cycle is logged and the loop
    /// continues.
    pub async fn run_cycle(&self) -> CycleStats {
        let cycle_start = Instant::now();
        let cycle_number = self.counters.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        let scrape_futures = self.scrapers.iter().map(|s| self.scrape_bookmaker(s));
        let results = futures::future::join_all(scrape_futures).await;

        let mut matches_scraped = 0u64;
        let mut odds_rows_changed = 0u64;
        let mut cycle_errors = 0u64;
        for (scraped, changed) in &results {
            matches_scraped += scraped;
            odds_rows_changed += changed;
            if *scraped == 0 {
                cycle_errors += 1;
            }
        }

        let arbitrage_found = match self.detect_arbitrage().await {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "arbitrage detection pass failed this cycle");
                cycle_errors += 1;
                0
            }
        };

        if let Err(err) = self.store.mark_finished(FINISH_GRACE_HOURS).await {
            warn!(error = %err, "mark_finished failed this cycle");
            cycle_errors += 1;
        }

        self.counters.matches_processed.fetch_add(matches_scraped, Ordering::Relaxed);
        self.counters.odds_updated.fetch_add(odds_rows_changed, Ordering::Relaxed);
        self.counters.arbitrage_found.fetch_add(arbitrage_found, Ordering::Relaxed);
        self.counters.errors.fetch_add(cycle_errors, Ordering::Relaxed);

        let stats = CycleStats {
            matches_scraped,
            odds_rows_changed,
            arbitrage_found,
            scraper_errors: cycle_errors,
            duration: cycle_start.elapsed(),
        };

        info!(
            cycle = cycle_number,
            matches = stats.matches_scraped,
            odds_changed = stats.odds_rows_changed,
            arbitrage = stats.arbitrage_found,
            duration = ?stats.duration,
            "cycle complete"
        );

        stats
    }

    /// Run the continuous, non-overlapping scheduler loop until
    /// `shutdown` is signalled. A cycle always runs to completion before
    /// the next is scheduled: cycle N+1 does not start until cycle N's
    /// store flush, detection, and bus emission complete.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(scrapers = self.scrapers.len(), interval = ?self.scrape_interval, "starting scheduler loop");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.scrape_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler loop stopped, closing adapters");
        for scraper in &self.scrapers {
            scraper.close().await;
        }
    }
}
