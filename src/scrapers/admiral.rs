//! Admiral Bet adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/admiral.py`. The
//! Admiral feed carries a structured `bets[]` array per event, each entry
//! a `betTypeId`/`betOutcomes[]` pair where every outcome already has its
//! own `sBV` (the market's special bet value — the margin/line for
//! handicap and totals markets).

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::{parse_teams, HttpClient};
use crate::scrapers::Scraper;
use serde_json::Value;

const BASE_URL: &str = "https://agp-srb-mapi.admiralbet.rs/api";

fn sport_id(sport: Sport) -> i32 {
    match sport {
        Sport::Football => 1,
        Sport::Basketball => 2,
        Sport::Tennis => 3,
        Sport::Hockey => 4,
        Sport::TableTennis => 5,
        _ => 1,
    }
}

/// Admiral's own `betTypeId` values for the markets the catalog models.
const BET_TYPE_1X2: i64 = 1;
const BET_TYPE_OU: i64 = 3;
const BET_TYPE_BTTS: i64 = 8;

pub struct AdmiralScraper {
    http: HttpClient,
}

impl AdmiralScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let url = format!("{BASE_URL}/offer/sr/Cafe/sport/{}/events", sport_id(sport));
        let body = self.http.get_json(&url).await?;
        Ok(body.get("events").and_then(|v| v.as_array()).cloned().unwrap_or_default())
    }

    fn parse_bet(&self, bet: &Value) -> Option<ScrapedOdds> {
        let bet_type_id = bet.get("betTypeId")?.as_i64()?;
        let outcomes = bet.get("betOutcomes")?.as_array()?;

        let price = |idx: usize| -> Option<f64> { outcomes.get(idx)?.get("odd")?.as_f64() };
        let margin = outcomes.first().and_then(|o| o.get("sBV")).and_then(|v| v.as_f64()).unwrap_or(0.0);

        match bet_type_id {
            BET_TYPE_1X2 if outcomes.len() >= 3 => Some(ScrapedOdds {
                bet_type: BetType::ThreeWay,
                margin: 0.0,
                selection: "1x2".to_string(),
                odd1: price(0)?,
                odd2: price(1),
                odd3: price(2),
            }),
            BET_TYPE_OU if outcomes.len() >= 2 => Some(ScrapedOdds {
                bet_type: BetType::TotalOverUnder,
                margin,
                selection: "over_under".to_string(),
                odd1: price(0)?,
                odd2: price(1),
                odd3: None,
            }),
            BET_TYPE_BTTS if outcomes.len() >= 2 => Some(ScrapedOdds {
                bet_type: BetType::Btts,
                margin: 0.0,
                selection: "yes_no".to_string(),
                odd1: price(0)?,
                odd2: price(1),
                odd3: None,
            }),
            _ => None,
        }
    }

    fn parse_event(&self, event: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let home = event.get("homeCompetitorName")?.as_str()?;
        let away = event.get("awayCompetitorName")?.as_str()?;
        let (team1, team2) = parse_teams(&format!("{home} - {away}"), " - ");

        let start_time = event.get("startTime").and_then(|v| v.as_f64()).and_then(parse_epoch)?;
        let league = event.get("leagueName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = event.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string());

        let bets = event.get("bets").and_then(|v| v.as_array())?;
        let odds: Vec<ScrapedOdds> = bets.iter().filter_map(|b| self.parse_bet(b)).collect();
        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for AdmiralScraper {
    fn bookmaker_id(&self) -> i32 {
        4
    }

    fn bookmaker_name(&self) -> &'static str {
        "Admiral"
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
    fn reads_margin_off_the_outcome_not_the_bet() {
        let scraper = AdmiralScraper::new(5.0, 2);
        let event = serde_json::json!({
            "homeCompetitorName": "Cukaricki",
            "awayCompetitorName": "Radnicki Nis",
            "startTime": 1_740_000_000.0,
            "id": 9001,
            "bets": [
                {"betTypeId": 3, "betOutcomes": [{"odd": 1.9, "sBV": 2.5}, {"odd": 1.85, "sBV": 2.5}]},
            ]
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.odds[0].margin, 2.5);
        assert_eq!(parsed.odds[0].bet_type, BetType::TotalOverUnder);
    }
}
