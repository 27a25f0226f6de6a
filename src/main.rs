//! Process entry point: loads configuration, wires the store, matcher,
//! detector, bus and scrapers together, and drives the engine loop until
//! a shutdown signal arrives, grounded on the teacher's `odds-engine/src/
//! main.rs` / `odds-processor/src/main.rs` startup sequence (tracing
//! init, config load, signal-driven shutdown channel).

use odds_core::bus::UpdateBus;
use odds_core::config::Config;
use odds_core::detector::{ArbitrageDetector, DetectorConfig};
use odds_core::engine::Engine;
use odds_core::scrapers::{
    AdmiralScraper, MaxbetScraper, MerkurScraper, MeridianScraper, MozzartScraper,
    SoccerbetScraper, SuperbetScraper, TopbetScraper,
};
use odds_core::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(interval = config.scrape_interval_seconds, "starting odds engine");

    let store = Store::connect(
        &config.database_url,
        config.match_similarity_threshold,
        config.enable_odds_history,
    )
    .await?;
    store.migrate().await?;

    let detector = ArbitrageDetector::new(DetectorConfig { min_profit_pct: config.min_profit_percentage });
    let bus = Arc::new(UpdateBus::new());
    let interval = Duration::from_secs_f64(config.scrape_interval_seconds);

    let mut engine = Engine::new(Arc::new(store), detector, bus, interval);

    engine.register_scraper(Arc::new(MozzartScraper::new()));
    engine.register_scraper(Arc::new(MeridianScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
        config.meridian_landing_url.clone(),
    )));
    engine.register_scraper(Arc::new(MaxbetScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));
    engine.register_scraper(Arc::new(AdmiralScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));
    engine.register_scraper(Arc::new(SoccerbetScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));
    engine.register_scraper(Arc::new(SuperbetScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));
    engine.register_scraper(Arc::new(MerkurScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));
    engine.register_scraper(Arc::new(TopbetScraper::new(
        config.request_timeout_seconds,
        config.max_concurrent_requests,
    )));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    engine.run(shutdown_rx).await;

    tracing::info!("odds engine stopped");
    Ok(())
}
