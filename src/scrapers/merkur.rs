//! Merkur adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/merkur.py`.
//! Merkur runs the same restapi/offer platform as MaxBet, just under its
//! own domain and `desktopVersion`.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::{parse_teams, HttpClient};
use crate::scrapers::Scraper;
use serde_json::Value;

const BASE_URL: &str = "https://www.merkurxtip.rs/restapi/offer/sr";

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

pub struct MerkurScraper {
    http: HttpClient,
}

impl MerkurScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let url = format!(
            "{BASE_URL}/sport/{}/mob?annex=0&desktopVersion=1.3.2.6&locale=sr",
            sport_code(sport)
        );
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
        let map = event.get("odds").and_then(|v| v.as_object())?;

        let mut odds = Vec::new();
        if let (Some(o1), Some(ox), Some(o2)) = (
            map.get(CODE_1X2.0).and_then(|v| v.as_f64()),
            map.get(CODE_1X2.1).and_then(|v| v.as_f64()),
            map.get(CODE_1X2.2).and_then(|v| v.as_f64()),
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
            if let (Some(yes), Some(no)) = (
                map.get(CODE_BTTS.0).and_then(|v| v.as_f64()),
                map.get(CODE_BTTS.1).and_then(|v| v.as_f64()),
            ) {
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
impl Scraper for MerkurScraper {
    fn bookmaker_id(&self) -> i32 {
        7
    }

    fn bookmaker_name(&self) -> &'static str {
        "Merkur"
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
    fn parses_football_1x2_and_btts() {
        let scraper = MerkurScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "Vojvodina - TSC",
            "kickOffTime": 1_740_000_000.0,
            "id": 10,
            "odds": {"1": 1.8, "2": 3.6, "3": 4.2, "272": 1.7, "273": 2.0}
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.odds.len(), 2);
    }
}
