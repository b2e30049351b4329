use crate::board::Board;
use crate::constants::MAX_TIER;
use crate::groups::partition_groups;
use crate::types::{Coord, Tier, TierThresholds};

pub fn tier(group_size: usize, thresholds: &TierThresholds) -> Tier {
    if group_size > thresholds.c {
        MAX_TIER
    } else if group_size > thresholds.b {
        2
    } else if group_size > thresholds.a {
        1
    } else {
        0
    }
}

/// Display tier per board position. Empty positions hold tier 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierMap {
    columns: usize,
    tiers: Vec<Tier>,
}

impl TierMap {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            tiers: vec![0; rows * columns],
        }
    }

    pub fn get(&self, coord: Coord) -> Tier {
        self.tiers[coord.row * self.columns + coord.col]
    }

    pub fn set(&mut self, coord: Coord, tier: Tier) {
        self.tiers[coord.row * self.columns + coord.col] = tier;
    }

    /// Carries a cell's tier along with a gravity move.
    pub fn move_cell(&mut self, col: usize, from_row: usize, to_row: usize) {
        let from = from_row * self.columns + col;
        self.tiers[to_row * self.columns + col] = self.tiers[from];
        self.tiers[from] = 0;
    }

    /// Positions whose tier differs in `next`, row-major.
    pub fn changes(&self, next: &TierMap) -> Vec<(Coord, Tier)> {
        self.tiers
            .iter()
            .zip(next.tiers.iter())
            .enumerate()
            .filter(|(_, (before, after))| before != after)
            .map(|(idx, (_, after))| (Coord::new(idx / self.columns, idx % self.columns), *after))
            .collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<Tier>> {
        self.tiers
            .chunks(self.columns)
            .map(<[Tier]>::to_vec)
            .collect()
    }
}

/// Recomputes every cell's tier from the current group partition.
pub fn compute_tiers(board: &Board, thresholds: &TierThresholds) -> TierMap {
    let mut map = TierMap::new(board.rows(), board.columns());
    for group in partition_groups(board) {
        let group_tier = tier(group.len(), thresholds);
        for member in &group.cells {
            map.set(*member, group_tier);
        }
    }
    map
}
