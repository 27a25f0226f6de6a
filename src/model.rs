//! Shared domain types: the uniform scrape model, store entities, and the
//! process-wide catalogs (sports, bookmakers, bet types).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sport tag. Each variant carries the cross-book matching time window
/// (minutes) used by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    Football,
    Basketball,
    Tennis,
    Hockey,
    TableTennis,
    Volleyball,
    Handball,
}

impl Sport {
    pub fn time_window_minutes(self) -> i64 {
        match self {
            Sport::Football => 30,
            Sport::Basketball => 20,
            Sport::Tennis => 10,
            Sport::Hockey => 20,
            Sport::TableTennis => 5,
            Sport::Volleyball => 15,
            Sport::Handball => 20,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Sport::Football => 1,
            Sport::Basketball => 2,
            Sport::Tennis => 3,
            Sport::Hockey => 4,
            Sport::TableTennis => 5,
            Sport::Volleyball => 6,
            Sport::Handball => 7,
        }
    }

    pub fn from_id(id: i32) -> Option<Sport> {
        Some(match id {
            1 => Sport::Football,
            2 => Sport::Basketball,
            3 => Sport::Tennis,
            4 => Sport::Hockey,
            5 => Sport::TableTennis,
            6 => Sport::Volleyball,
            7 => Sport::Handball,
            _ => return None,
        })
    }
}

/// A single bookmaker catalog entry. `enabled = false` entries are kept
/// for parity with the source system's "often blocked" annotations but
/// have no registered scraper adapter (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmakerInfo {
    pub id: i32,
    pub name: &'static str,
    pub display_name: &'static str,
    pub enabled: bool,
}

pub static BOOKMAKERS: Lazy<Vec<BookmakerInfo>> = Lazy::new(|| {
    vec![
        BookmakerInfo { id: 1, name: "mozzart", display_name: "Mozzart Bet", enabled: true },
        BookmakerInfo { id: 2, name: "meridian", display_name: "Meridian Bet", enabled: true },
        BookmakerInfo { id: 3, name: "maxbet", display_name: "MaxBet", enabled: true },
        BookmakerInfo { id: 4, name: "admiral", display_name: "Admiral Bet", enabled: true },
        BookmakerInfo { id: 5, name: "soccerbet", display_name: "Soccer Bet", enabled: true },
        BookmakerInfo { id: 6, name: "superbet", display_name: "SuperBet", enabled: true },
        BookmakerInfo { id: 7, name: "merkur", display_name: "Merkur", enabled: true },
        BookmakerInfo { id: 8, name: "1xbet", display_name: "1xBet", enabled: false },
        BookmakerInfo { id: 9, name: "lvbet", display_name: "LVBet", enabled: false },
        BookmakerInfo { id: 10, name: "topbet", display_name: "TopBet", enabled: true },
        BookmakerInfo { id: 11, name: "pinnacle", display_name: "Pinnacle", enabled: false },
    ]
});

pub fn bookmaker_name(id: i32) -> &'static str {
    BOOKMAKERS
        .iter()
        .find(|b| b.id == id)
        .map(|b| b.display_name)
        .unwrap_or("Unknown")
}

/// Bet type catalog entry: outcome arity (2 or 3) and whether the market
/// carries a numeric margin/line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetTypeInfo {
    pub id: i32,
    pub name: &'static str,
    pub outcomes: u8,
    pub has_margin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetType {
    TwoWay,
    ThreeWay,
    FirstHalf1x2,
    SecondHalf1x2,
    TotalOverUnder,
    FirstHalfTotal,
    SecondHalfTotal,
    Btts,
    Handicap,
    TotalPoints,
    Spread,
    Moneyline,
}

impl BetType {
    pub fn id(self) -> i32 {
        match self {
            BetType::TwoWay => 1,
            BetType::ThreeWay => 2,
            BetType::FirstHalf1x2 => 3,
            BetType::SecondHalf1x2 => 4,
            BetType::TotalOverUnder => 5,
            BetType::FirstHalfTotal => 6,
            BetType::SecondHalfTotal => 7,
            BetType::Btts => 8,
            BetType::Handicap => 9,
            BetType::TotalPoints => 10,
            BetType::Spread => 11,
            BetType::Moneyline => 12,
        }
    }

    pub fn from_id(id: i32) -> Option<BetType> {
        Some(match id {
            1 => BetType::TwoWay,
            2 => BetType::ThreeWay,
            3 => BetType::FirstHalf1x2,
            4 => BetType::SecondHalf1x2,
            5 => BetType::TotalOverUnder,
            6 => BetType::FirstHalfTotal,
            7 => BetType::SecondHalfTotal,
            8 => BetType::Btts,
            9 => BetType::Handicap,
            10 => BetType::TotalPoints,
            11 => BetType::Spread,
            12 => BetType::Moneyline,
            _ => return None,
        })
    }

    pub fn outcomes(self) -> u8 {
        match self {
            BetType::ThreeWay | BetType::FirstHalf1x2 | BetType::SecondHalf1x2 => 3,
            _ => 2,
        }
    }
}

pub static BET_TYPES: Lazy<HashMap<i32, BetTypeInfo>> = Lazy::new(|| {
    let entries = [
        (BetType::TwoWay, "12", false),
        (BetType::ThreeWay, "1X2", false),
        (BetType::FirstHalf1x2, "1X2_H1", false),
        (BetType::SecondHalf1x2, "1X2_H2", false),
        (BetType::TotalOverUnder, "total_over_under", true),
        (BetType::FirstHalfTotal, "total_h1", true),
        (BetType::SecondHalfTotal, "total_h2", true),
        (BetType::Btts, "btts", false),
        (BetType::Handicap, "handicap", true),
        (BetType::TotalPoints, "total_points", true),
        (BetType::Spread, "spread", true),
        (BetType::Moneyline, "moneyline", false),
    ];
    entries
        .into_iter()
        .map(|(bt, name, has_margin)| {
            (
                bt.id(),
                BetTypeInfo { id: bt.id(), name, outcomes: bt.outcomes(), has_margin },
            )
        })
        .collect()
});

/// Status of a `Match`. Monotonic: `Upcoming -> Finished`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Finished,
}

/// Identity of a sporting event as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub team1: String,
    pub team2: String,
    pub team1_norm: String,
    pub team2_norm: String,
    pub sport: Sport,
    pub start_time: DateTime<Utc>,
    pub league: Option<String>,
    pub external_ids: HashMap<i32, String>,
    pub status: MatchStatus,
}

/// One odds row as scraped from a bookmaker, before it is resolved
/// against the store's match identity.
#[derive(Debug, Clone)]
pub struct ScrapedOdds {
    pub bet_type: BetType,
    pub margin: f64,
    pub selection: String,
    pub odd1: f64,
    pub odd2: Option<f64>,
    pub odd3: Option<f64>,
}

/// A match as produced by a `Scraper`, not yet fused into the store.
#[derive(Debug, Clone)]
pub struct ScrapedMatch {
    pub team1: String,
    pub team2: String,
    pub sport: Sport,
    pub start_time: DateTime<Utc>,
    pub league: Option<String>,
    pub external_id: Option<String>,
    pub odds: Vec<ScrapedOdds>,
}

/// Current best odds row `(match, bookmaker, bet_type, margin, selection)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CurrentOddsRow {
    pub match_id: i64,
    pub bookmaker_id: i32,
    pub bet_type_id: i32,
    pub margin: f64,
    pub selection: String,
    pub odd1: f64,
    pub odd2: Option<f64>,
    pub odd3: Option<f64>,
}

/// One outcome of an arbitrage opportunity: the best bookmaker/odd pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbOutcome {
    pub bookmaker_id: i32,
    pub outcome: String,
    pub odd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: Option<i64>,
    pub match_id: i64,
    pub sport_id: i32,
    pub bet_type_id: i32,
    pub margin: f64,
    pub profit_pct: f64,
    pub per_outcome_best: Vec<ArbOutcome>,
    pub stakes: Vec<f64>,
    pub arb_hash: String,
    pub detected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}
