use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COLOR_COUNT, DEFAULT_COLUMNS, DEFAULT_MAX_SHUFFLE_ATTEMPTS, DEFAULT_ROWS,
    DEFAULT_TIER_A, DEFAULT_TIER_B, DEFAULT_TIER_C, MAX_BOARD_SIDE, MAX_COLOR_COUNT,
};
use crate::error::GridError;

pub type Color = u8;
pub type Tier = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "color", rename_all = "snake_case")]
pub enum Cell {
    Empty,
    Occupied(Color),
}

impl Cell {
    pub fn color(self) -> Option<Color> {
        match self {
            Self::Empty => None,
            Self::Occupied(color) => Some(color),
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Board position; row 0 is the top edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl TierThresholds {
    pub fn new(a: usize, b: usize, c: usize) -> Result<Self, GridError> {
        if a < b && b < c {
            Ok(Self { a, b, c })
        } else {
            Err(GridError::InvalidThresholds { a, b, c })
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            a: DEFAULT_TIER_A,
            b: DEFAULT_TIER_B,
            c: DEFAULT_TIER_C,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub rows: usize,
    pub columns: usize,
    #[serde(rename = "colorCount")]
    pub color_count: u8,
    pub tiers: TierThresholds,
    #[serde(rename = "maxShuffleAttempts")]
    pub max_shuffle_attempts: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            color_count: DEFAULT_COLOR_COUNT,
            tiers: TierThresholds::default(),
            max_shuffle_attempts: DEFAULT_MAX_SHUFFLE_ATTEMPTS,
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.rows == 0
            || self.columns == 0
            || self.rows > MAX_BOARD_SIDE
            || self.columns > MAX_BOARD_SIDE
        {
            return Err(GridError::InvalidDimensions {
                rows: self.rows,
                columns: self.columns,
            });
        }
        if self.color_count == 0 || self.color_count > MAX_COLOR_COUNT {
            return Err(GridError::InvalidColorCount {
                got: self.color_count,
                max: MAX_COLOR_COUNT,
            });
        }
        TierThresholds::new(self.tiers.a, self.tiers.b, self.tiers.c)?;
        if self.max_shuffle_attempts == 0 {
            return Err(GridError::InvalidShuffleAttempts);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Resolving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShuffleOutcome {
    Resolved { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl ShuffleOutcome {
    pub fn attempts(self) -> u32 {
        match self {
            Self::Resolved { attempts } | Self::Exhausted { attempts } => attempts,
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridEvent {
    CellRemoved {
        row: usize,
        col: usize,
    },
    CellMoved {
        #[serde(rename = "fromRow")]
        from_row: usize,
        #[serde(rename = "toRow")]
        to_row: usize,
        col: usize,
    },
    CellSpawned {
        row: usize,
        col: usize,
        color: Color,
    },
    CellRecolored {
        row: usize,
        col: usize,
        color: Color,
    },
    TierChanged {
        row: usize,
        col: usize,
        tier: Tier,
    },
    DeadlockResolved {
        attempts: u32,
    },
    DeadlockExhausted {
        attempts: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct MoveReport {
    #[serde(rename = "groupSize")]
    pub group_size: usize,
    pub color: Color,
    pub shuffle: Option<ShuffleOutcome>,
    pub events: Vec<GridEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BoardSnapshot {
    pub rows: usize,
    pub columns: usize,
    #[serde(rename = "colorCount")]
    pub color_count: u8,
    pub phase: Phase,
    pub tiles: Vec<String>,
    pub tiers: Vec<Vec<Tier>>,
    #[serde(rename = "moveCount")]
    pub move_count: u64,
    pub deadlocked: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub moves: u64,
    #[serde(rename = "cellsRemoved")]
    pub cells_removed: u64,
    #[serde(rename = "cellsSpawned")]
    pub cells_spawned: u64,
    #[serde(rename = "largestGroup")]
    pub largest_group: usize,
    pub shuffles: u64,
    #[serde(rename = "shuffleAttempts")]
    pub shuffle_attempts: u64,
    #[serde(rename = "exhaustedShuffles")]
    pub exhausted_shuffles: u64,
    #[serde(rename = "ignoredSelects")]
    pub ignored_selects: u64,
}
