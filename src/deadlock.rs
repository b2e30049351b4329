use crate::board::Board;
use crate::error::GridError;
use crate::rng::Rng;
use crate::types::{Cell, Color, Coord, ShuffleOutcome};

/// True iff no two orthogonally adjacent occupied cells share a color.
/// Only right and down neighbors are checked; that covers every pair once.
pub fn is_deadlock(board: &Board) -> bool {
    !board.occupied().any(|(coord, color)| {
        board.color_at(coord.row, coord.col + 1) == Some(color)
            || board.color_at(coord.row + 1, coord.col) == Some(color)
    })
}

/// Permutes the colors of occupied cells over the same positions until a
/// move exists or `max_attempts` permutations have been tried. An exhausted
/// shuffle leaves the last permutation on the board.
pub fn shuffle(
    board: &mut Board,
    rng: &mut Rng,
    max_attempts: u32,
) -> Result<ShuffleOutcome, GridError> {
    let (positions, mut colors): (Vec<Coord>, Vec<Color>) = board.occupied().unzip();

    for attempt in 1..=max_attempts {
        rng.shuffle(&mut colors);
        for (coord, color) in positions.iter().zip(colors.iter()) {
            board.set(coord.row, coord.col, Cell::Occupied(*color))?;
        }
        if !is_deadlock(board) {
            return Ok(ShuffleOutcome::Resolved { attempts: attempt });
        }
    }

    Ok(ShuffleOutcome::Exhausted {
        attempts: max_attempts,
    })
}
