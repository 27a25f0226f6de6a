//! Meridian adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/meridian.py`.
//! Meridian's API sits behind a bearer token scraped out of a `<script>`
//! tag on the public landing page rather than a login flow — the token
//! is fetched lazily and refreshed whenever a request comes back
//! unauthorized.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::common::HttpClient;
use crate::scrapers::Scraper;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;

const API_BASE: &str = "https://online.meridianbet.com/betshop/api";

fn sport_id(sport: Sport) -> i32 {
    match sport {
        Sport::Football => 58,
        Sport::Basketball => 67,
        Sport::Tennis => 69,
        Sport::Hockey => 64,
        Sport::TableTennis => 92,
        _ => 58,
    }
}

pub struct MeridianScraper {
    http: HttpClient,
    landing_url: String,
    token: Mutex<Option<String>>,
}

impl MeridianScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize, landing_url: String) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent), landing_url, token: Mutex::new(None) }
    }

    /// Scrape the `NEW_TOKEN` assignment out of the landing page's inline
    /// script and pull `access_token` from its nested JSON payload.
    async fn fetch_auth_token(&self) -> Result<String, ScrapeError> {
        let html = self.http.get_text(&self.landing_url).await?;

        let pattern = Regex::new(r#"NEW_TOKEN[^\{]*(\{[^;]*\})"#).expect("static regex is valid");
        let captured = pattern
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ScrapeError::Auth("NEW_TOKEN script tag not found on landing page".to_string()))?;

        let payload: Value = serde_json::from_str(&captured)
            .map_err(|e| ScrapeError::Auth(format!("malformed token payload: {e}")))?;

        payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ScrapeError::Auth("access_token missing from token payload".to_string()))
    }

    async fn ensure_token(&self) -> Result<String, ScrapeError> {
        {
            let guard = self.token.lock().await;
            if let Some(tok) = guard.as_ref() {
                return Ok(tok.clone());
            }
        }
        let fresh = self.fetch_auth_token().await?;
        *self.token.lock().await = Some(fresh.clone());
        Ok(fresh)
    }

    async fn fetch_events(&self, sport: Sport) -> Result<Vec<Value>, ScrapeError> {
        let _token = self.ensure_token().await?;
        let url = format!("{API_BASE}/offer/sr/sport/{}/events", sport_id(sport));

        match self.http.get_json(&url).await {
            Err(ScrapeError::Http { status: 401, .. }) | Err(ScrapeError::Auth(_)) => {
                *self.token.lock().await = None;
                self.ensure_token().await?;
                let body = self.http.get_json(&url).await?;
                Ok(body.get("payload").and_then(|v| v.as_array()).cloned().unwrap_or_default())
            }
            Ok(body) => Ok(body.get("payload").and_then(|v| v.as_array()).cloned().unwrap_or_default()),
            Err(e) => Err(e),
        }
    }

    fn parse_football_markets(&self, markets: &[Value]) -> Vec<ScrapedOdds> {
        let mut out = Vec::new();
        let price = |selections: &[Value], idx: usize| -> Option<f64> {
            selections.get(idx)?.get("price")?.as_str()?.parse().ok()
        };

        for group in markets {
            let name = group.get("marketName").and_then(|v| v.as_str()).unwrap_or("");
            for market in group.get("markets").and_then(|v| v.as_array()).into_iter().flatten() {
                let selections = market.get("selections").and_then(|v| v.as_array()).cloned().unwrap_or_default();

                match name {
                    "Konačan Ishod" if selections.len() >= 3 => {
                        if let (Some(o1), Some(ox), Some(o2)) =
                            (price(&selections, 0), price(&selections, 1), price(&selections, 2))
                        {
                            out.push(ScrapedOdds {
                                bet_type: BetType::ThreeWay,
                                margin: 0.0,
                                selection: "1x2".to_string(),
                                odd1: o1,
                                odd2: Some(ox),
                                odd3: Some(o2),
                            });
                        }
                    }
                    "Oba Tima Daju Gol" => {
                        let gg = selections.iter().find(|s| s.get("name").and_then(|n| n.as_str()) == Some("GG"));
                        let ng = selections.iter().find(|s| s.get("name").and_then(|n| n.as_str()) == Some("NG"));
                        if let (Some(gg), Some(ng)) = (gg, ng) {
                            if let (Some(yes), Some(no)) = (
                                gg.get("price").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok()),
                                ng.get("price").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok()),
                            ) {
                                out.push(ScrapedOdds {
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
                    "Ukupno Golova" => {
                        let over_under = market.get("overUnder").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
                        if let (Some(margin), Some(o), Some(u)) = (over_under, price(&selections, 0), price(&selections, 1)) {
                            out.push(ScrapedOdds {
                                bet_type: BetType::TotalOverUnder,
                                margin,
                                selection: "over_under".to_string(),
                                odd1: o,
                                odd2: Some(u),
                                odd3: None,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }

    fn parse_event(&self, event: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let team1 = event.get("homeTeam")?.get("name")?.as_str()?.to_string();
        let team2 = event.get("awayTeam")?.get("name")?.as_str()?.to_string();
        let start_time = event.get("startTime").and_then(|v| v.as_f64()).and_then(parse_epoch)?;
        let league = event.get("leagueName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = event.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string());

        let markets = event.get("markets").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let odds = if matches!(sport, Sport::Football) {
            self.parse_football_markets(&markets)
        } else {
            Vec::new()
        };

        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for MeridianScraper {
    fn bookmaker_id(&self) -> i32 {
        2
    }

    fn bookmaker_name(&self) -> &'static str {
        "Meridian"
    }

    fn supported_sports(&self) -> &'static [Sport] {
        // parse_football_markets is the only market parser this adapter
        // has; the other sport ids above exist only for URL construction
        // until a parser for their markets is written.
        &[Sport::Football]
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
    fn parses_1x2_and_totals_from_nested_markets() {
        let scraper = MeridianScraper::new(5.0, 1, "https://example.invalid".to_string());
        let event = serde_json::json!({
            "homeTeam": {"name": "Napredak"},
            "awayTeam": {"name": "Javor"},
            "startTime": 1_740_000_000.0,
            "id": 42,
            "markets": [
                {
                    "marketName": "Konačan Ishod",
                    "markets": [{"selections": [
                        {"price": "1.95"}, {"price": "3.3"}, {"price": "3.8"}
                    ]}]
                },
                {
                    "marketName": "Ukupno Golova",
                    "markets": [{"overUnder": "2.5", "selections": [
                        {"price": "1.9"}, {"price": "1.9"}
                    ]}]
                }
            ]
        });

        let parsed = scraper.parse_event(&event, Sport::Football).unwrap();
        assert_eq!(parsed.odds.len(), 2);
        assert_eq!(parsed.odds[1].margin, 2.5);
    }
}
