use crate::constants::{clamp_board_side, clamp_color_count, clamp_shuffle_attempts};
use crate::types::BoardConfig;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerSettings {
    pub port: u16,
    pub board: BoardConfig,
    /// Fixed seed for the first board; `None` seeds from the clock.
    pub seed: Option<u64>,
}

/// Reads server settings through `lookup`, normally `std::env::var`.
/// Unparseable values fall back to defaults; numeric values are clamped.
pub fn settings_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerSettings {
    let int = |key: &str| lookup(key).and_then(|raw| raw.trim().parse::<i64>().ok());

    let defaults = BoardConfig::default();
    let mut board = defaults;
    if let Some(rows) = int("PUZZLE_ROWS") {
        board.rows = clamp_board_side(rows);
    }
    if let Some(columns) = int("PUZZLE_COLUMNS") {
        board.columns = clamp_board_side(columns);
    }
    if let Some(colors) = int("PUZZLE_COLORS") {
        board.color_count = clamp_color_count(colors);
    }
    if let Some(a) = int("PUZZLE_TIER_A") {
        board.tiers.a = normalize_threshold(a);
    }
    if let Some(b) = int("PUZZLE_TIER_B") {
        board.tiers.b = normalize_threshold(b);
    }
    if let Some(c) = int("PUZZLE_TIER_C") {
        board.tiers.c = normalize_threshold(c);
    }
    if let Some(attempts) = int("PUZZLE_MAX_SHUFFLE_ATTEMPTS") {
        board.max_shuffle_attempts = clamp_shuffle_attempts(attempts);
    }

    ServerSettings {
        port: parse_port(lookup("PORT").as_deref()),
        board,
        seed: lookup("PUZZLE_SEED").and_then(|raw| raw.trim().parse::<u64>().ok()),
    }
}

pub fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(DEFAULT_PORT)
}

fn normalize_threshold(value: i64) -> usize {
    value.max(0) as usize
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}
