//! Pure, deterministic normalization: team names, categories, tennis
//! player names, and timestamps. No I/O, no shared state.

mod team_name;
mod tennis;
mod timestamp;

pub use team_name::{extract_categories, normalize_team, Categories};
pub use tennis::normalize_tennis_player;
pub use timestamp::{parse_epoch, parse_timestamp, RawTimestamp};
