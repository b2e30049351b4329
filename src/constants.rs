pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_COLUMNS: usize = 10;
pub const DEFAULT_COLOR_COUNT: u8 = 6;

pub const DEFAULT_TIER_A: usize = 4;
pub const DEFAULT_TIER_B: usize = 7;
pub const DEFAULT_TIER_C: usize = 10;

pub const DEFAULT_MAX_SHUFFLE_ATTEMPTS: u32 = 100;

/// Smallest group a select is allowed to collapse.
pub const MIN_GROUP_SIZE: usize = 2;

pub const MAX_BOARD_SIDE: usize = 64;
/// `Board::from_rows` encodes colors as single hex digits.
pub const MAX_COLOR_COUNT: u8 = 16;

pub const MAX_TIER: u8 = 3;

pub fn clamp_board_side(value: i64) -> usize {
    value.clamp(1, MAX_BOARD_SIDE as i64) as usize
}

pub fn clamp_color_count(value: i64) -> u8 {
    value.clamp(1, MAX_COLOR_COUNT as i64) as u8
}

pub fn clamp_shuffle_attempts(value: i64) -> u32 {
    value.clamp(1, 10_000) as u32
}
