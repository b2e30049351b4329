use std::collections::{BTreeSet, VecDeque};

use crate::board::Board;
use crate::types::{Color, Coord};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub cells: BTreeSet<Coord>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Distinct columns touched by the group, ascending.
    pub fn columns(&self) -> BTreeSet<usize> {
        self.cells.iter().map(|coord| coord.col).collect()
    }
}

pub(crate) fn neighbors(board: &Board, coord: Coord) -> impl Iterator<Item = Coord> {
    let Coord { row, col } = coord;
    let (rows, columns) = (board.rows(), board.columns());
    [
        row.checked_sub(1).map(|r| Coord::new(r, col)),
        (row + 1 < rows).then(|| Coord::new(row + 1, col)),
        col.checked_sub(1).map(|c| Coord::new(row, c)),
        (col + 1 < columns).then(|| Coord::new(row, col + 1)),
    ]
    .into_iter()
    .flatten()
}

/// Maximal same-color region containing `seed`, via breadth-first search.
/// An empty or out-of-bounds seed yields an empty group.
pub fn find_group(board: &Board, seed: Coord) -> Group {
    let Some(color) = board.color_at(seed.row, seed.col) else {
        return Group {
            color: 0,
            cells: BTreeSet::new(),
        };
    };

    let mut cells = BTreeSet::new();
    let mut queue = VecDeque::new();
    cells.insert(seed);
    queue.push_back(seed);

    while let Some(current) = queue.pop_front() {
        for next in neighbors(board, current) {
            if board.color_at(next.row, next.col) != Some(color) {
                continue;
            }
            if cells.insert(next) {
                queue.push_back(next);
            }
        }
    }

    Group { color, cells }
}

/// Splits every occupied cell into disjoint maximal groups, ordered by the
/// row-major position of each group's first cell.
pub fn partition_groups(board: &Board) -> Vec<Group> {
    let mut assigned = vec![false; board.rows() * board.columns()];
    let mut groups = Vec::new();
    for (coord, _) in board.occupied() {
        if assigned[coord.row * board.columns() + coord.col] {
            continue;
        }
        let group = find_group(board, coord);
        for member in &group.cells {
            assigned[member.row * board.columns() + member.col] = true;
        }
        groups.push(group);
    }
    groups
}

/// First cell (row-major) with an equal-color right or down neighbor.
pub fn find_move(board: &Board) -> Option<Coord> {
    board.occupied().find_map(|(coord, color)| {
        let right = board.color_at(coord.row, coord.col + 1) == Some(color);
        let down = board.color_at(coord.row + 1, coord.col) == Some(color);
        (right || down).then_some(coord)
    })
}
