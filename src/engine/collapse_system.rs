use super::*;
use crate::groups::Group;
use crate::types::Cell;

impl CollapseEngine {
    /// Removal, gravity and refill for one group, followed by tier refresh
    /// and deadlock repair. Events accumulate in `self.events`.
    pub(super) fn resolve(&mut self, group: &Group) -> Result<Option<ShuffleOutcome>, GridError> {
        self.remove_group(group)?;
        self.settle_columns(group)?;
        self.refresh_tiers();
        self.repair_deadlock()
    }

    fn remove_group(&mut self, group: &Group) -> Result<(), GridError> {
        for coord in &group.cells {
            self.board.clear(coord.row, coord.col)?;
            self.tiers.set(*coord, 0);
            self.events.push(GridEvent::CellRemoved {
                row: coord.row,
                col: coord.col,
            });
        }
        Ok(())
    }

    fn settle_columns(&mut self, group: &Group) -> Result<(), GridError> {
        for col in group.columns() {
            for (from_row, to_row) in self.board.compact_column(col)? {
                self.tiers.move_cell(col, from_row, to_row);
                self.events.push(GridEvent::CellMoved {
                    from_row,
                    to_row,
                    col,
                });
            }

            for (row, color) in self.board.fill_column(col, &mut self.rng)? {
                self.tiers.set(Coord::new(row, col), 0);
                self.stats.cells_spawned += 1;
                self.events.push(GridEvent::CellSpawned { row, col, color });
            }
        }
        Ok(())
    }

    pub(super) fn refresh_tiers(&mut self) {
        let next = compute_tiers(&self.board, &self.config.tiers);
        for (coord, tier) in self.tiers.changes(&next) {
            self.events.push(GridEvent::TierChanged {
                row: coord.row,
                col: coord.col,
                tier,
            });
        }
        self.tiers = next;
    }

    pub(super) fn recolor_events(&mut self, before: &Board) {
        for (coord, color) in self.board.occupied() {
            if before.get(coord.row, coord.col) != Ok(Cell::Occupied(color)) {
                self.events.push(GridEvent::CellRecolored {
                    row: coord.row,
                    col: coord.col,
                    color,
                });
            }
        }
    }
}
