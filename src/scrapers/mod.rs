//! Bookmaker capability contract and adapters. Every adapter turns one
//! bookmaker's wire format into `ScrapedMatch`es, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/base.py`. Only
//! this contract matters to the rest of the engine — the per-bookmaker
//! payload shapes are intentionally not exposed past each adapter.

mod admiral;
mod common;
mod maxbet;
mod merkur;
mod meridian;
mod mozzart;
mod soccerbet;
mod superbet;
mod topbet;

pub use common::ScraperStats;

use crate::error::ScrapeError;
use crate::model::{Sport, ScrapedMatch};

pub use admiral::AdmiralScraper;
pub use maxbet::MaxbetScraper;
pub use merkur::MerkurScraper;
pub use meridian::MeridianScraper;
pub use mozzart::MozzartScraper;
pub use soccerbet::SoccerbetScraper;
pub use superbet::SuperbetScraper;
pub use topbet::TopbetScraper;

/// The one capability the engine depends on: fetch and normalize one
/// sport's current matches/odds from a single bookmaker. Everything
/// about how that happens — auth, headless rendering, market-code
/// translation tables — lives inside the implementation.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    fn bookmaker_id(&self) -> i32;
    fn bookmaker_name(&self) -> &'static str;
    fn supported_sports(&self) -> &'static [Sport];

    async fn scrape_sport(&self, sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError>;

    /// Release any pooled HTTP / browser resources. Plain JSON adapters
    /// have nothing to release (reqwest's client is cheaply dropped);
    /// the browser-gated adapter overrides this to close its persistent
    /// context.
    async fn close(&self) {}

    /// Scrape every sport this adapter supports, concurrently, collapsing
    /// individual sport failures into an empty result for that sport
    /// rather than failing the whole adapter — a bookmaker being fully
    /// down never blocks other bookmakers or other sports.
    async fn scrape_all(&self) -> Vec<ScrapedMatch> {
        let sports = self.supported_sports();
        let futures = sports.iter().map(|&sport| self.scrape_sport(sport));
        let results = futures::future::join_all(futures).await;

        let mut all = Vec::new();
        for (sport, result) in sports.iter().zip(results) {
            match result {
                Ok(matches) => {
                    tracing::debug!(bookmaker = self.bookmaker_name(), sport = ?sport, count = matches.len(), "scraped sport");
                    all.extend(matches);
                }
                Err(err) => {
                    tracing::warn!(bookmaker = self.bookmaker_name(), sport = ?sport, error = %err, "sport scrape failed");
                }
            }
        }
        all
    }
}
