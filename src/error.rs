use thiserror::Error;

use crate::constants::MAX_BOARD_SIDE;
use crate::types::Color;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("coordinate ({row}, {col}) is outside the {rows}x{columns} board")]
    OutOfBounds {
        row: i64,
        col: i64,
        rows: usize,
        columns: usize,
    },
    #[error(
        "board sides must be between 1 and {max}, got {rows}x{columns}",
        max = MAX_BOARD_SIDE
    )]
    InvalidDimensions { rows: usize, columns: usize },
    #[error("color count must be between 1 and {max}, got {got}")]
    InvalidColorCount { got: u8, max: u8 },
    #[error("color {color} is outside [0, {color_count})")]
    ColorOutOfRange { color: Color, color_count: u8 },
    #[error("tier thresholds must satisfy a < b < c, got {a}, {b}, {c}")]
    InvalidThresholds { a: usize, b: usize, c: usize },
    #[error("max shuffle attempts must be at least 1")]
    InvalidShuffleAttempts,
    #[error("malformed board: {0}")]
    MalformedBoard(String),
}
