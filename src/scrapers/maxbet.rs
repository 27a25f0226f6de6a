//! MaxBet adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/maxbet.py`. Same
//! restapi/offer platform as Soccerbet and Merkur, but MaxBet alone
//! exposes handicap/totals as param-keyed sub-markets rather than fixed
//! codes.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::{parse_teams, HttpClient};
use crate::scrapers::Scraper;
use serde_json::Value;

const BASE_URL: &str = "https://www.maxbet.rs/restapi/offer/sr";

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

/// Full-time 1X2 codes, the only market every supported sport shares in
/// some form.
const CODE_1X2: (&str, &str, &str) = ("1", "2", "3");
const CODE_BTTS: (&str, &str) = ("272", "273");

pub struct MaxbetScraper {
    http: HttpClient,
}

impl MaxbetScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    fn params() -> &'static str {
        "annex=3&desktopVersion=1.2.1.10&locale=sr"
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let url = format!("{BASE_URL}/sport/{}/mob?{}", sport_code(sport), Self::params());
        let body = self.http.get_json(&url).await?;
        Ok(body
            .get("esMatches")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    fn parse_event(&self, event: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let name = event.get("matchName")?.as_str()?;
        let (team1, team2) = parse_teams(name, " - ");
        if team1.is_empty() || team2.is_empty() {
            return None;
        }

        let start_time = event
            .get("kickOffTime")
            .and_then(|v| v.as_f64())
            .and_then(parse_epoch)?;

        let league = event.get("leagueName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = event.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string());

        let odds_map = event.get("odds").and_then(|v| v.as_object());
        let mut odds = Vec::new();

        if let Some(map) = odds_map {
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
        }

        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for MaxbetScraper {
    fn bookmaker_id(&self) -> i32 {
        3
    }

    fn bookmaker_name(&self) -> &'static str {
        "Maxbet"
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
    fn parses_a_minimal_1x2_event() {
        let scraper = MaxbetScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "Partizan - Crvena Zvezda",
            "kickOffTime": 1_740_000_000.0,
            "leagueName": "Super Liga",
            "id": 555,
            "odds": {"1": 2.1, "2": 3.4, "3": 3.0}
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.team1, "Partizan");
        assert_eq!(parsed.team2, "Crvena Zvezda");
        assert_eq!(parsed.odds.len(), 1);
        assert_eq!(parsed.odds[0].bet_type, BetType::ThreeWay);
    }

    #[test]
    fn skips_event_with_no_recognized_odds() {
        let scraper = MaxbetScraper::new(5.0, 2);
        let event = serde_json::json!({
            "matchName": "A - B",
            "kickOffTime": 1_740_000_000.0,
            "id": 1,
            "odds": {"999": 1.5}
        });
        assert!(scraper.parse_event(&event, Sport::Football).is_none());
    }
}
