use crate::constants::{MAX_BOARD_SIDE, MAX_COLOR_COUNT};
use crate::error::GridError;
use crate::rng::Rng;
use crate::types::{Cell, Color, Coord};

/// Fixed-size grid of cells, stored row-major with row 0 at the top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    columns: usize,
    color_count: u8,
    cells: Vec<Cell>,
}

impl Board {
    /// Builds a fully occupied board with uniformly random colors.
    pub fn create(
        rows: usize,
        columns: usize,
        color_count: u8,
        rng: &mut Rng,
    ) -> Result<Self, GridError> {
        let size = check_shape(rows, columns, color_count)?;
        let cells = (0..size)
            .map(|_| Cell::Occupied(rng.color(color_count)))
            .collect();
        Ok(Self {
            rows,
            columns,
            color_count,
            cells,
        })
    }

    /// Parses one string per row: `0-9`/`a-f` are colors, `.` is empty.
    pub fn from_rows(rows: &[&str], color_count: u8) -> Result<Self, GridError> {
        let columns = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        let size = check_shape(rows.len(), columns, color_count)?;

        let mut cells = Vec::with_capacity(size);
        for (row_idx, line) in rows.iter().enumerate() {
            if line.chars().count() != columns {
                return Err(GridError::MalformedBoard(format!(
                    "row {row_idx} has {} cells, expected {columns}",
                    line.chars().count()
                )));
            }
            for ch in line.chars() {
                if ch == '.' {
                    cells.push(Cell::Empty);
                    continue;
                }
                let Some(color) = ch.to_digit(16) else {
                    return Err(GridError::MalformedBoard(format!(
                        "unexpected character {ch:?} in row {row_idx}"
                    )));
                };
                let color = color as Color;
                if color >= color_count {
                    return Err(GridError::ColorOutOfRange { color, color_count });
                }
                cells.push(Cell::Occupied(color));
            }
        }

        Ok(Self {
            rows: rows.len(),
            columns,
            color_count,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn color_count(&self) -> u8 {
        self.color_count
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.columns
    }

    /// Validates signed input coordinates (e.g. from the wire).
    pub fn locate(&self, row: i64, col: i64) -> Result<Coord, GridError> {
        match (usize::try_from(row), usize::try_from(col)) {
            (Ok(r), Ok(c)) if self.in_bounds(r, c) => Ok(Coord::new(r, c)),
            _ => Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                columns: self.columns,
            }),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Cell, GridError> {
        let idx = self.index(row, col)?;
        Ok(self.cells[idx])
    }

    /// Color at a position, or `None` for empty and out-of-bounds cells.
    pub fn color_at(&self, row: usize, col: usize) -> Option<Color> {
        if !self.in_bounds(row, col) {
            return None;
        }
        self.cells[row * self.columns + col].color()
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> Result<(), GridError> {
        let idx = self.index(row, col)?;
        if let Cell::Occupied(color) = cell {
            if color >= self.color_count {
                return Err(GridError::ColorOutOfRange {
                    color,
                    color_count: self.color_count,
                });
            }
        }
        self.cells[idx] = cell;
        Ok(())
    }

    pub fn clear(&mut self, row: usize, col: usize) -> Result<(), GridError> {
        let idx = self.index(row, col)?;
        self.cells[idx] = Cell::Empty;
        Ok(())
    }

    /// Drops every occupied cell in the column as far as it can fall,
    /// keeping their order. Returns `(from_row, to_row)` for the cells that
    /// moved, bottom-most first.
    pub fn compact_column(&mut self, col: usize) -> Result<Vec<(usize, usize)>, GridError> {
        self.check_column(col)?;
        let mut moves = Vec::new();
        let mut write = self.rows;
        for row in (0..self.rows).rev() {
            let from = row * self.columns + col;
            if let Cell::Occupied(color) = self.cells[from] {
                write -= 1;
                if write != row {
                    self.cells[write * self.columns + col] = Cell::Occupied(color);
                    self.cells[from] = Cell::Empty;
                    moves.push((row, write));
                }
            }
        }
        Ok(moves)
    }

    /// Gives every empty cell in the column a random color, top-down.
    /// Expects `compact_column` to have run so the empties sit on top.
    pub fn fill_column(
        &mut self,
        col: usize,
        rng: &mut Rng,
    ) -> Result<Vec<(usize, Color)>, GridError> {
        self.check_column(col)?;
        let mut spawned = Vec::new();
        for row in 0..self.rows {
            let idx = row * self.columns + col;
            if self.cells[idx].is_empty() {
                let color = rng.color(self.color_count);
                self.cells[idx] = Cell::Occupied(color);
                spawned.push((row, color));
            }
        }
        Ok(spawned)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// True when no empty cell sits below an occupied one in any column.
    pub fn is_settled(&self) -> bool {
        (0..self.columns).all(|col| {
            let mut seen_occupied = false;
            for row in 0..self.rows {
                let occupied = !self.cells[row * self.columns + col].is_empty();
                if seen_occupied && !occupied {
                    return false;
                }
                seen_occupied |= occupied;
            }
            true
        })
    }

    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |col| Coord::new(row, col)))
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Coord, Color)> + '_ {
        self.coords().filter_map(move |coord| {
            self.cells[coord.row * self.columns + coord.col]
                .color()
                .map(|color| (coord, color))
        })
    }

    pub fn render_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.columns)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Cell::Empty => '.',
                        Cell::Occupied(color) => {
                            std::char::from_digit(u32::from(*color), 16).unwrap_or('?')
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, GridError> {
        if !self.in_bounds(row, col) {
            return Err(GridError::OutOfBounds {
                row: to_signed(row),
                col: to_signed(col),
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok(row * self.columns + col)
    }

    fn check_column(&self, col: usize) -> Result<(), GridError> {
        if col >= self.columns {
            return Err(GridError::OutOfBounds {
                row: 0,
                col: to_signed(col),
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok(())
    }
}

fn check_shape(rows: usize, columns: usize, color_count: u8) -> Result<usize, GridError> {
    if rows == 0 || columns == 0 || rows > MAX_BOARD_SIDE || columns > MAX_BOARD_SIDE {
        return Err(GridError::InvalidDimensions { rows, columns });
    }
    if color_count == 0 || color_count > MAX_COLOR_COUNT {
        return Err(GridError::InvalidColorCount {
            got: color_count,
            max: MAX_COLOR_COUNT,
        });
    }
    rows.checked_mul(columns)
        .ok_or(GridError::InvalidDimensions { rows, columns })
}

fn to_signed(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
