//! TopBet adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/topbet.py`.
//! TopBet runs on the NSoft platform, which exposes a compressed
//! "overview" shape for event listings — abbreviated keys
//! (`b`=marketId, `d`=variant, `n`=margin, `h`=outcomes, `e`=outcome
//! code, `g`=price) instead of the full single-match payload NSoft also
//! serves per-event. The overview alone carries enough markets (1X2,
//! totals, BTTS) for the bet types this catalog models, so this adapter
//! stays single-phase rather than following up with per-match detail
//! calls.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::{parse_teams, HttpClient};
use crate::scrapers::Scraper;
use serde_json::Value;

const BASE_URL: &str = "https://www.topbet.rs/restapi/offer/sr";

fn sport_id(sport: Sport) -> i32 {
    match sport {
        Sport::Football => 3,
        Sport::Basketball => 1,
        Sport::Tennis => 4,
        Sport::Hockey => 5,
        Sport::TableTennis => 27,
        _ => 3,
    }
}

/// NSoft's own `b` (marketId) values for the markets the catalog models.
const MARKET_1X2: i64 = 1;
const MARKET_OU: i64 = 4;
const MARKET_BTTS: i64 = 8;

pub struct TopbetScraper {
    http: HttpClient,
}

impl TopbetScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let url = format!(
            "{BASE_URL}/sport/{}/overview?shortProps=1&locale=sr",
            sport_id(sport)
        );
        let body = self.http.get_json(&url).await?;
        Ok(body.get("events").and_then(|v| v.as_array()).cloned().unwrap_or_default())
    }

    /// Parse one compressed market entry `{b, n, h: [{e, g}, ...]}` into
    /// a `ScrapedOdds`, dispatching on outcome arity + the market's own
    /// `b` (market id).
    fn parse_market(&self, market: &Value) -> Option<ScrapedOdds> {
        let market_id = market.get("b")?.as_i64()?;
        let outcomes = market.get("h")?.as_array()?;
        let margin = market.get("n").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);

        let outcome_price = |code: &str| -> Option<f64> {
            outcomes
                .iter()
                .find(|o| o.get("e").and_then(|v| v.as_str()) == Some(code))
                .and_then(|o| o.get("g"))
                .and_then(|v| v.as_f64())
        };

        match market_id {
            MARKET_1X2 if outcomes.len() >= 3 => Some(ScrapedOdds {
                bet_type: BetType::ThreeWay,
                margin: 0.0,
                selection: "1x2".to_string(),
                odd1: outcome_price("1")?,
                odd2: outcome_price("X"),
                odd3: outcome_price("2"),
            }),
            MARKET_OU if outcomes.len() >= 2 => Some(ScrapedOdds {
                bet_type: BetType::TotalOverUnder,
                margin,
                selection: "over_under".to_string(),
                odd1: outcome_price("under").or_else(|| outcome_price("U"))?,
                odd2: outcome_price("over").or_else(|| outcome_price("O")),
                odd3: None,
            }),
            MARKET_BTTS if outcomes.len() >= 2 => Some(ScrapedOdds {
                bet_type: BetType::Btts,
                margin: 0.0,
                selection: "yes_no".to_string(),
                odd1: outcome_price("yes").or_else(|| outcome_price("1"))?,
                odd2: outcome_price("no").or_else(|| outcome_price("2")),
                odd3: None,
            }),
            _ => None,
        }
    }

    fn parse_event(&self, event: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let name = event.get("matchName")?.as_str()?;
        let (team1, team2) = parse_teams(name, " - ");
        if team1.is_empty() || team2.is_empty() {
            return None;
        }

        let start_time = event.get("startTime").and_then(|v| v.as_f64()).and_then(parse_epoch)?;
        let league = event.get("leagueName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = event.get("id").map(|v| v.to_string());

        let markets = event.get("markets").and_then(|v| v.as_array())?;
        let odds: Vec<ScrapedOdds> = markets.iter().filter_map(|m| self.parse_market(m)).collect();
        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for TopbetScraper {
    fn bookmaker_id(&self) -> i32 {
        10
    }

    fn bookmaker_name(&self) -> &'static str {
        "TopBet"
    }

    fn supported_sports(&self) -> &'static [Sport] {
        &[Sport::Football, Sport::Basketball, Sport::Tennis, Sport::Hockey, Sport::TableTennis]
    }

    async fn scrape_sport(&self, sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError> {
        let events = self.fetch_events(sport).await?;
        Ok(events.iter().filter_map(|e| self.parse_event(e, sport)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_1x2_from_compressed_outcomes() {
        let scraper = TopbetScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "Vozdovac - Napredak",
            "startTime": 1_740_000_000.0,
            "id": 808,
            "markets": [
                {"b": 1, "h": [{"e": "1", "g": 2.3}, {"e": "X", "g": 3.1}, {"e": "2", "g": 3.4}]},
                {"b": 4, "n": "2.5", "h": [{"e": "under", "g": 1.95}, {"e": "over", "g": 1.85}]},
            ]
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.odds.len(), 2);
        assert_eq!(parsed.odds[0].bet_type, BetType::ThreeWay);
        assert_eq!(parsed.odds[1].margin, 2.5);
    }

    #[test]
    fn skips_market_with_unknown_id() {
        let scraper = TopbetScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "A - B",
            "startTime": 1_740_000_000.0,
            "id": 1,
            "markets": [{"b": 999, "h": [{"e": "1", "g": 1.5}]}]
        });
        assert!(scraper.parse_event(&event, Sport::Football).is_none());
    }
}
