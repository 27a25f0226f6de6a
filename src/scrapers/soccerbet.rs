//! Soccerbet adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/soccerbet.py`.
//! Same restapi/offer platform family as MaxBet/Merkur, but odds arrive as
//! a `betMap` keyed by code with a nested `{"NULL": {"ov": price}}` shape
//! rather than a flat code->price map — Soccerbet has no param-based
//! (variable-margin) markets.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::{parse_teams, HttpClient};
use crate::scrapers::Scraper;
use serde_json::Value;

const BASE_URL: &str = "https://www.soccerbet.rs/restapi/offer/sr";

fn sport_code(sport: Sport) -> &'static str {
    match sport {
        Sport::Football => "S",
        Sport::Basketball => "B",
        Sport::Tennis => "T",
        Sport::Hockey => "H",
        Sport::TableTennis => "TT",
        _ => "S",
    }
}

const CODE_1X2: (&str, &str, &str) = ("1", "2", "3");
const CODE_BTTS: (&str, &str) = ("272", "273");

fn bet_map_price(bet_map: &serde_json::Map<String, Value>, code: &str) -> Option<f64> {
    bet_map.get(code)?.get("NULL")?.get("ov")?.as_f64()
}

pub struct SoccerbetScraper {
    http: HttpClient,
}

impl SoccerbetScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let url = format!("{BASE_URL}/sport/{}/mob?annex=0&locale=sr", sport_code(sport));
        let body = self.http.get_json(&url).await?;
        Ok(body.get("esMatches").and_then(|v| v.as_array()).cloned().unwrap_or_default())
    }

    fn parse_event(&self, event: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let name = event.get("matchName")?.as_str()?;
        let (team1, team2) = parse_teams(name, " - ");
        if team1.is_empty() || team2.is_empty() {
            return None;
        }

        let start_time = event.get("kickOffTime").and_then(|v| v.as_f64()).and_then(parse_epoch)?;
        let league = event.get("leagueName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = event.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string());
        let bet_map = event.get("betMap").and_then(|v| v.as_object())?;

        let mut odds = Vec::new();
        if let (Some(o1), Some(ox), Some(o2)) = (
            bet_map_price(bet_map, CODE_1X2.0),
            bet_map_price(bet_map, CODE_1X2.1),
            bet_map_price(bet_map, CODE_1X2.2),
        ) {
            odds.push(ScrapedOdds {
                bet_type: BetType::ThreeWay,
                margin: 0.0,
                selection: "1x2".to_string(),
                odd1: o1,
                odd2: Some(ox),
                odd3: Some(o2),
            });
        }

        if matches!(sport, Sport::Football) {
            if let (Some(yes), Some(no)) =
                (bet_map_price(bet_map, CODE_BTTS.0), bet_map_price(bet_map, CODE_BTTS.1))
            {
                odds.push(ScrapedOdds {
                    bet_type: BetType::Btts,
                    margin: 0.0,
                    selection: "yes_no".to_string(),
                    odd1: yes,
                    odd2: Some(no),
                    odd3: None,
                });
            }
        }

        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for SoccerbetScraper {
    fn bookmaker_id(&self) -> i32 {
        5
    }

    fn bookmaker_name(&self) -> &'static str {
        "Soccerbet"
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
    fn reads_price_out_of_nested_bet_map() {
        let scraper = SoccerbetScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "Radnicki - Spartak",
            "kickOffTime": 1_740_000_000.0,
            "id": 77,
            "betMap": {
                "1": {"NULL": {"ov": 2.05}},
                "2": {"NULL": {"ov": 3.1}},
                "3": {"NULL": {"ov": 3.9}},
            }
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.odds.len(), 1);
        assert_eq!(parsed.odds[0].odd1, 2.05);
    }
}
