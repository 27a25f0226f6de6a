//! Superbet adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/superbet.py`.
//! Superbet's API is two-phase: a `/events/by-date` listing returns bare
//! event ids, and every event's markets are fetched individually as a
//! flat `odds[]` array tagged by `marketName` rather than pre-grouped —
//! this adapter groups by market name itself before dispatching parsers,
//! mirroring `parse_odds`'s `by_market` step.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::{parse_timestamp, RawTimestamp};
use crate::scrapers::common::HttpClient;
use crate::scrapers::Scraper;
use serde_json::Value;
use std::collections::HashMap;

const BASE_URL: &str = "https://production-superbet-offer-rs.freetls.fastly.net/sb-rs/api/v2/sr-Latn-RS";

fn sport_id(sport: Sport) -> i32 {
    match sport {
        Sport::Football => 5,
        Sport::Basketball => 4,
        Sport::Tennis => 2,
        Sport::Hockey => 3,
        Sport::TableTennis => 24,
        _ => 5,
    }
}

pub struct SuperbetScraper {
    http: HttpClient,
}

impl SuperbetScraper {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        Self { http: HttpClient::new(timeout_seconds, max_concurrent) }
    }

    async fn fetch_event_ids(&self, sport: Sport) -> Result<Vec<i64>, ScrapeError> {
        let url = format!(
            "{BASE_URL}/events/by-date?currentStatus=active&offerState=prematch&sportId={}",
            sport_id(sport)
        );
        let body = self.http.get_json(&url).await?;
        let ids = body
            .get("data")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter(|m| m.get("sportId").and_then(|v| v.as_i64()) == Some(sport_id(sport) as i64))
            .filter_map(|m| m.get("eventId").and_then(|v| v.as_i64()))
            .collect();
        Ok(ids)
    }

    async fn fetch_event_details(&self, event_id: i64) -> Result<Option<Value>, ScrapeError> {
        let url = format!("{BASE_URL}/events/{event_id}");
        let body = self.http.get_json(&url).await?;
        Ok(body.get("data").and_then(|v| v.as_array()).and_then(|a| a.first()).cloned())
    }

    /// Parse the three fixed markets the catalog models, grouping the
    /// flat `odds[]` array by `marketName` first so each group reduces to
    /// a single price pair.
    fn parse_markets(&self, data: &Value) -> Vec<ScrapedOdds> {
        let mut by_market: HashMap<&str, Vec<&Value>> = HashMap::new();
        for entry in data.get("odds").and_then(|v| v.as_array()).into_iter().flatten() {
            let market_name = entry.get("marketName").and_then(|v| v.as_str()).unwrap_or("");
            by_market.entry(market_name).or_default().push(entry);
        }

        let mut out = Vec::new();

        if let Some(entries) = by_market.get("Konačan ishod") {
            if let Some(three_way) = parse_three_way(entries) {
                out.push(three_way);
            }
        }

        if let Some(entries) = by_market.get("Ukupno golova") {
            out.extend(parse_over_under(entries, BetType::TotalOverUnder));
        }

        if let Some(entries) = by_market.get("Oba tima daju gol (GG)") {
            if let Some(yn) = parse_yes_no(entries, BetType::Btts) {
                out.push(yn);
            }
        }

        if let Some(entries) = by_market.get("Hendikep") {
            out.extend(parse_handicap(entries));
        }

        out
    }

    fn parse_event(&self, data: &Value, sport: Sport) -> Option<ScrapedMatch> {
        let match_name = data.get("matchName")?.as_str()?;
        let mut parts = match_name.splitn(2, '·');
        let team1 = parts.next()?.trim().to_string();
        let team2 = parts.next()?.trim().to_string();
        if team1.is_empty() || team2.is_empty() {
            return None;
        }

        let match_date = data.get("matchDate").and_then(|v| v.as_str())?;
        let start_time = parse_timestamp(RawTimestamp::Text(match_date))?;
        let external_id = data.get("eventId").map(|v| v.to_string());

        let odds = self.parse_markets(data);
        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport, start_time, league: None, external_id, odds })
    }
}

fn price(entry: &Value) -> Option<f64> {
    entry.get("price").and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok()))
}

fn code(entry: &Value) -> String {
    entry.get("code").map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_default()
}

fn margin_of(entry: &Value) -> Option<f64> {
    let raw = entry.get("specialBetValue")?;
    let text = raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string());
    // Tennis set markets prefix the margin with "<set>-", e.g. "1-2.5".
    if let Some((_, tail)) = text.rsplit_once('-') {
        if !text.starts_with('-') {
            return tail.parse().ok();
        }
    }
    text.parse().ok()
}

fn parse_three_way(entries: &[&Value]) -> Option<ScrapedOdds> {
    let mut home = None;
    let mut draw = None;
    let mut away = None;
    for e in entries {
        match code(e).as_str() {
            "1" => home = price(e),
            "0" | "X" => draw = price(e),
            "2" => away = price(e),
            _ => {}
        }
    }
    Some(ScrapedOdds {
        bet_type: BetType::ThreeWay,
        margin: 0.0,
        selection: "1x2".to_string(),
        odd1: home?,
        odd2: draw,
        odd3: away,
    })
}

fn parse_yes_no(entries: &[&Value], bet_type: BetType) -> Option<ScrapedOdds> {
    let mut yes = None;
    let mut no = None;
    for e in entries {
        match code(e).as_str() {
            "1" => yes = price(e),
            "2" => no = price(e),
            _ => {}
        }
    }
    Some(ScrapedOdds { bet_type, margin: 0.0, selection: "yes_no".to_string(), odd1: yes?, odd2: no, odd3: None })
}

fn parse_over_under(entries: &[&Value], bet_type: BetType) -> Vec<ScrapedOdds> {
    let mut by_margin: HashMap<i64, (Option<f64>, Option<f64>)> = HashMap::new();
    for e in entries {
        let Some(margin) = margin_of(e) else { continue };
        let name = e.get("name").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
        let key = (margin * 1000.0).round() as i64;
        let slot = by_margin.entry(key).or_insert((None, None));
        if name.contains("manje") {
            slot.0 = price(e);
        } else if name.contains("vi") && name.contains("e") {
            slot.1 = price(e);
        }
    }
    by_margin
        .into_iter()
        .filter_map(|(key, (under, over))| {
            Some(ScrapedOdds {
                bet_type,
                margin: key as f64 / 1000.0,
                selection: "over_under".to_string(),
                odd1: under?,
                odd2: over,
                odd3: None,
            })
        })
        .collect()
}

fn parse_handicap(entries: &[&Value]) -> Vec<ScrapedOdds> {
    let mut by_margin: HashMap<i64, (Option<f64>, Option<f64>)> = HashMap::new();
    for e in entries {
        let Some(margin) = margin_of(e) else { continue };
        let key = (margin * 1000.0).round() as i64;
        let slot = by_margin.entry(key).or_insert((None, None));
        match code(e).as_str() {
            "1" => slot.0 = price(e),
            "2" => slot.1 = price(e),
            _ => {}
        }
    }
    by_margin
        .into_iter()
        .filter_map(|(key, (o1, o2))| {
            Some(ScrapedOdds {
                bet_type: BetType::Handicap,
                margin: key as f64 / 1000.0,
                selection: "handicap".to_string(),
                odd1: o1?,
                odd2: o2,
                odd3: None,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Scraper for SuperbetScraper {
    fn bookmaker_id(&self) -> i32 {
        6
    }

    fn bookmaker_name(&self) -> &'static str {
        "Superbet"
    }

    fn supported_sports(&self) -> &'static [Sport] {
        &[Sport::Football, Sport::Basketball, Sport::Tennis, Sport::Hockey, Sport::TableTennis]
    }

    async fn scrape_sport(&self, sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError> {
        let ids = self.fetch_event_ids(sport).await?;
        let futures = ids.iter().map(|&id| self.fetch_event_details(id));
        let results = futures::future::join_all(futures).await;

        let mut out = Vec::new();
        for result in results {
            match result {
                Ok(Some(data)) => {
                    if let Some(parsed) = self.parse_event(&data, sport) {
                        out.push(parsed);
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "superbet event detail fetch failed"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_and_grouped_over_under() {
        let scraper = SuperbetScraper::new(5.0, 2);
        let data = serde_json::json!({
            "matchName": "Radnicki 1923 · Cukaricki",
            "matchDate": "2025-03-01T18:00:00Z",
            "eventId": 4242,
            "odds": [
                {"marketName": "Konačan ishod", "code": "1", "price": "2.05"},
                {"marketName": "Konačan ishod", "code": "X", "price": "3.3"},
                {"marketName": "Konačan ishod", "code": "2", "price": "3.8"},
                {"marketName": "Ukupno golova", "name": "Manje", "specialBetValue": "2.5", "price": "1.9"},
                {"marketName": "Ukupno golova", "name": "Više", "specialBetValue": "2.5", "price": "1.9"},
            ]
        });

        let parsed = scraper.parse_event(&data, Sport::Football).unwrap();
        assert_eq!(parsed.team1, "Radnicki 1923");
        assert_eq!(parsed.team2, "Cukaricki");
        assert_eq!(parsed.odds.len(), 2);
        assert!(parsed.odds.iter().any(|o| o.bet_type == BetType::TotalOverUnder && o.margin == 2.5));
    }

    #[test]
    fn extracts_set_prefixed_margin() {
        assert_eq!(margin_of(&serde_json::json!({"specialBetValue": "1-2.5"})), Some(2.5));
        assert_eq!(margin_of(&serde_json::json!({"specialBetValue": "-1.5"})), Some(-1.5));
    }
}
