//! Mozzart adapter, grounded on
//! `examples/original_source/PythonScraper/core/scrapers/mozzart.py`.
//! Mozzart is the one bookmaker gated behind Cloudflare's JS challenge:
//! rather than a plain `reqwest` client, this adapter owns a persistent
//! headless-browser context and issues every request as a JS `fetch()`
//! evaluated inside the page, so the browser's own
//! cookie jar and challenge solution ride along. Initialization is
//! double-checked under a lock so concurrent `scrape_sport` calls (one
//! per supported sport, per `scrape_all`) never race to launch two
//! browsers.

use crate::error::ScrapeError;
use crate::model::{BetType, ScrapedMatch, ScrapedOdds, Sport};
use crate::normalizer::parse_epoch;
use crate::scrapers::Scraper;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;

const BASE_URL: &str = "https://www.mozzartbet.com";

fn mozzart_sport_id(sport: Sport) -> i32 {
    match sport {
        Sport::Football => 1,
        Sport::Basketball => 2,
        Sport::Tennis => 5,
        Sport::Hockey => 4,
        Sport::TableTennis => 9,
        _ => 1,
    }
}

/// The browser resources an initialized session owns. Torn down together
/// on `close()`.
struct BrowserSession {
    browser: Browser,
    page: Page,
    /// Keeps the background event-pump task alive for as long as the
    /// session lives; never polled directly.
    _handler: tokio::task::JoinHandle<()>,
}

pub struct MozzartScraper {
    session: Mutex<Option<BrowserSession>>,
    /// Guards session creation so two concurrent `scrape_sport` calls
    /// don't both see `None` and launch a second browser.
    init_lock: Mutex<()>,
}

impl Default for MozzartScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl MozzartScraper {
    pub fn new() -> Self {
        Self { session: Mutex::new(None), init_lock: Mutex::new(()) }
    }

    async fn ensure_initialized(&self) -> Result<(), ScrapeError> {
        if self.session.lock().await.is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        // Double-check: another task may have initialized while we
        // waited for the lock.
        if self.session.lock().await.is_some() {
            return Ok(());
        }

        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| ScrapeError::Auth(format!("chromium launch config invalid: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Auth(format!("failed to launch headless browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Auth(format!("failed to open page: {e}")))?;

        // Warm up the session against the real betting page so Cloudflare's
        // challenge clears before the first API call.
        if let Err(e) = page.goto(format!("{BASE_URL}/sr/kladjenje/sport/1?date=today")).await {
            tracing::warn!(error = %e, "mozzart warmup navigation failed, continuing anyway");
        }

        *self.session.lock().await =
            Some(BrowserSession { browser, page, _handler: handler_task });

        Ok(())
    }

    /// POST `payload` to `url` via `fetch()` evaluated inside the page,
    /// so the request carries the browser's cookies and passes Cloudflare.
    async fn post_via_page(&self, url: &str, payload: &Value) -> Result<Value, ScrapeError> {
        self.ensure_initialized().await?;

        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| ScrapeError::Auth("browser session missing after init".into()))?;

        let script = format!(
            r#"(async () => {{
                try {{
                    const response = await fetch({url:?}, {{
                        method: 'POST',
                        headers: {{'Accept': 'application/json, text/plain, */*', 'Content-Type': 'application/json', 'medium': 'PREMATCH_WEB'}},
                        body: JSON.stringify({payload})
                    }});
                    if (response.ok) {{ return {{success: true, data: await response.json()}}; }}
                    return {{success: false, status: response.status}};
                }} catch (e) {{ return {{success: false, error: String(e)}}; }}
            }})()"#,
            url = url,
            payload = payload,
        );

        let result: Value = session
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScrapeError::Parse(format!("page.evaluate failed: {e}")))?
            .into_value()
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;

        if result.get("success").and_then(|v| v.as_bool()) == Some(true) {
            Ok(result.get("data").cloned().unwrap_or(Value::Null))
        } else {
            Err(ScrapeError::Parse(format!("mozzart fetch failed: {result}")))
        }
    }

    async fn fetch_leagues(&self, sport: Sport) -> Result<Vec<(i64, String)>, ScrapeError> {
        let url = format!("{BASE_URL}/betting/get-competitions");
        let payload = serde_json::json!({ "date": "all_days", "sportId": mozzart_sport_id(sport) });
        let body = self.post_via_page(&url, &payload).await?;

        Ok(body
            .get("competitions")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| {
                let id = c.get("id")?.as_i64()?;
                let name = c.get("name")?.as_str()?.to_string();
                Some((id, name))
            })
            .collect())
    }

    async fn fetch_match_ids(&self, sport: Sport, league_id: i64) -> Result<Vec<i64>, ScrapeError> {
        let url = format!("{BASE_URL}/betting/matches");
        let payload = serde_json::json!({
            "date": "all_days",
            "sort": "bycompetition",
            "currentPage": 0,
            "pageSize": 100,
            "sportId": mozzart_sport_id(sport),
            "competitionIds": [league_id],
            "search": "",
            "matchTypeId": 0
        });
        let body = self.post_via_page(&url, &payload).await?;
        Ok(body
            .get("items")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|m| m.get("id").and_then(|v| v.as_i64()))
            .collect())
    }

    async fn fetch_match_details(&self, match_id: i64) -> Result<Option<Value>, ScrapeError> {
        let url = format!("{BASE_URL}/betting/match/{match_id}");
        let body = self.post_via_page(&url, &Value::Object(Default::default())).await?;
        if body.get("error").is_some() {
            return Ok(None);
        }
        Ok(Some(body))
    }

    /// Parse the subset of Mozzart's group-based market model the
    /// catalog covers: 1X2, margin-keyed totals, and BTTS. Mirrors the
    /// structure of `_parse_1x2` / `_parse_ou_markets` / `_parse_btts_group`
    /// in the source, collapsed onto the simplified `BetType` set.
    fn parse_odds(&self, match_data: &Value) -> Vec<ScrapedOdds> {
        let mut out = Vec::new();
        let groups = match_data
            .get("match")
            .and_then(|m| m.get("oddsGroup"))
            .and_then(|v| v.as_array());
        let Some(groups) = groups else { return out };

        for group in groups {
            let name = group.get("groupName").and_then(|v| v.as_str()).unwrap_or("");
            let odds = group.get("odds").and_then(|v| v.as_array()).cloned().unwrap_or_default();

            match name {
                "Konačan ishod" => {
                    let mut collected = std::collections::HashMap::new();
                    for odd in &odds {
                        let subgame = odd.get("subgame").and_then(|s| s.get("name")).and_then(|v| v.as_str()).unwrap_or("");
                        if let Some(value) = odd.get("value").and_then(|v| v.as_f64()) {
                            if value > 0.0 {
                                collected.insert(subgame.to_string(), value);
                            }
                        }
                    }
                    if let (Some(&o1), Some(&ox), Some(&o2)) =
                        (collected.get("1"), collected.get("X"), collected.get("2"))
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
                "Ukupno golova" => {
                    let mut by_margin: std::collections::HashMap<i64, (Option<f64>, Option<f64>)> = std::collections::HashMap::new();
                    for odd in &odds {
                        let margin = odd.get("specialOddValue").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
                        let Some(margin) = margin else { continue };
                        let subgame = odd.get("subgame").and_then(|s| s.get("name")).and_then(|v| v.as_str()).unwrap_or("");
                        let Some(value) = odd.get("value").and_then(|v| v.as_f64()) else { continue };
                        if value <= 0.0 {
                            continue;
                        }
                        let key = (margin * 1000.0).round() as i64;
                        let slot = by_margin.entry(key).or_insert((None, None));
                        if subgame == "manje" {
                            slot.0 = Some(value);
                        } else if subgame == "više" {
                            slot.1 = Some(value);
                        }
                    }
                    for (key, (under, over)) in by_margin {
                        if let (Some(u), Some(o)) = (under, over) {
                            out.push(ScrapedOdds {
                                bet_type: BetType::TotalOverUnder,
                                margin: key as f64 / 1000.0,
                                selection: "over_under".to_string(),
                                odd1: u,
                                odd2: Some(o),
                                odd3: None,
                            });
                        }
                    }
                }
                "Oba tima daju gol" => {
                    let mut gg = None;
                    let mut ng = None;
                    for odd in &odds {
                        let subgame = odd.get("subgame").and_then(|s| s.get("name")).and_then(|v| v.as_str()).unwrap_or("");
                        let Some(value) = odd.get("value").and_then(|v| v.as_f64()) else { continue };
                        if value <= 0.0 {
                            continue;
                        }
                        match subgame.to_lowercase().as_str() {
                            "da" => gg = Some(value),
                            "ne" => ng = Some(value),
                            _ => {}
                        }
                    }
                    if let (Some(yes), Some(no)) = (gg, ng) {
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
                _ => {}
            }
        }

        out
    }

    fn parse_match(&self, match_data: &Value) -> Option<ScrapedMatch> {
        let m = match_data.get("match")?;
        if m.get("specialMatchGroupId").is_some() {
            return None;
        }

        let team1 = m.get("home")?.get("name")?.as_str()?.to_string();
        let team2 = m.get("visitor")?.get("name")?.as_str()?.to_string();
        let start_time = m.get("startTime").and_then(|v| v.as_f64()).and_then(parse_epoch)?;
        let external_id = m.get("id").map(|v| v.to_string());

        let odds = self.parse_odds(match_data);
        if odds.is_empty() {
            return None;
        }

        Some(ScrapedMatch { team1, team2, sport: Sport::Football, start_time, league: None, external_id, odds })
    }
}

#[async_trait::async_trait]
impl Scraper for MozzartScraper {
    fn bookmaker_id(&self) -> i32 {
        1
    }

    fn bookmaker_name(&self) -> &'static str {
        "Mozzart"
    }

    fn supported_sports(&self) -> &'static [Sport] {
        &[Sport::Football, Sport::Basketball, Sport::Tennis, Sport::Hockey, Sport::TableTennis]
    }

    async fn scrape_sport(&self, sport: Sport) -> Result<Vec<ScrapedMatch>, ScrapeError> {
        let leagues = self.fetch_leagues(sport).await?;
        if leagues.is_empty() {
            return Ok(Vec::new());
        }

        let mut match_ids = Vec::new();
        for (league_id, _) in &leagues {
            match self.fetch_match_ids(sport, *league_id).await {
                Ok(ids) => match_ids.extend(ids),
                Err(err) => tracing::warn!(league_id, error = %err, "mozzart league match-id fetch failed"),
            }
        }

        let mut matches = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for match_id in match_ids {
            let details = match self.fetch_match_details(match_id).await {
                Ok(Some(d)) => d,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(match_id, error = %err, "mozzart match detail fetch failed");
                    continue;
                }
            };

            if let Some(parsed) = self.parse_match(&details) {
                let key = format!("{}_{}", parsed.team1, parsed.team2);
                if seen.insert(key) {
                    matches.push(ScrapedMatch { sport, ..parsed });
                }
            }
        }

        Ok(matches)
    }

    /// Release the persistent browser context. Unlike the plain-JSON
    /// adapters, Mozzart's cost to reinitialize (a fresh Cloudflare
    /// warmup) is high enough that the engine only calls this on
    /// shutdown, not per-cycle.
    async fn close(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            let _ = session.page.close().await;
            let _ = session.browser.close().await;
            session._handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_1x2_and_totals_from_grouped_odds() {
        let scraper = MozzartScraper::new();
        let data = serde_json::json!({
            "match": {
                "id": 5001,
                "home": {"name": "Radnicki"},
                "visitor": {"name": "Javor"},
                "startTime": 1_740_000_000.0,
                "oddsGroup": [
                    {
                        "groupName": "Konačan ishod",
                        "odds": [
                            {"subgame": {"name": "1"}, "value": 2.1},
                            {"subgame": {"name": "X"}, "value": 3.2},
                            {"subgame": {"name": "2"}, "value": 3.6},
                        ]
                    },
                    {
                        "groupName": "Ukupno golova",
                        "odds": [
                            {"subgame": {"name": "manje"}, "value": 1.9, "specialOddValue": "2.5"},
                            {"subgame": {"name": "više"}, "value": 1.9, "specialOddValue": "2.5"},
                        ]
                    }
                ]
            }
        });

        let parsed = scraper.parse_match(&data).unwrap();
        assert_eq!(parsed.team1, "Radnicki");
        assert_eq!(parsed.odds.len(), 2);
        assert!(parsed.odds.iter().any(|o| o.bet_type == BetType::TotalOverUnder && o.margin == 2.5));
    }

    #[test]
    fn special_match_group_is_skipped() {
        let scraper = MozzartScraper::new();
        let data = serde_json::json!({
            "match": {"specialMatchGroupId": 7, "home": {"name": "A"}, "visitor": {"name": "B"}}
        });
        assert!(scraper.parse_match(&data).is_none());
    }
}
