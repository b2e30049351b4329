use crate::board::Board;
use crate::constants::MIN_GROUP_SIZE;
use crate::deadlock::is_deadlock;
use crate::error::GridError;
use crate::groups::{find_group, find_move};
use crate::rng::Rng;
use crate::tiers::{compute_tiers, TierMap};
use crate::types::{
    BoardConfig, BoardSnapshot, Coord, GridEvent, MoveReport, Phase, SessionSummary,
    ShuffleOutcome,
};

mod collapse_system;
mod deadlock_system;

#[derive(Clone, Debug)]
pub enum SelectOutcome {
    /// A previous collapse has not finished; the select was dropped.
    Busy,
    /// Empty cell or a group below the minimum size.
    Ignored,
    Collapsed(MoveReport),
}

/// Owns one puzzle session: the board, its tiers and the shared random source.
#[derive(Clone, Debug)]
pub struct CollapseEngine {
    pub config: BoardConfig,

    board: Board,
    tiers: TierMap,
    rng: Rng,
    phase: Phase,
    events: Vec<GridEvent>,
    stats: SessionSummary,
    initial_shuffle: Option<ShuffleOutcome>,
}

impl CollapseEngine {
    pub fn new(config: BoardConfig, seed: u64) -> Result<Self, GridError> {
        config.validate()?;
        let mut rng = Rng::new(seed);
        let board = Board::create(config.rows, config.columns, config.color_count, &mut rng)?;
        Self::from_parts(config, board, rng)
    }

    /// Starts a session from a prepared board, e.g. a fixture.
    pub fn with_board(config: BoardConfig, board: Board, seed: u64) -> Result<Self, GridError> {
        config.validate()?;
        if board.rows() != config.rows
            || board.columns() != config.columns
            || board.color_count() != config.color_count
        {
            return Err(GridError::MalformedBoard(format!(
                "board is {}x{} with {} colors, config expects {}x{} with {}",
                board.rows(),
                board.columns(),
                board.color_count(),
                config.rows,
                config.columns,
                config.color_count
            )));
        }
        if board.occupied_count() != config.rows * config.columns {
            return Err(GridError::MalformedBoard(
                "starting board must be fully occupied".to_string(),
            ));
        }
        Self::from_parts(config, board, Rng::new(seed))
    }

    fn from_parts(config: BoardConfig, board: Board, rng: Rng) -> Result<Self, GridError> {
        let tiers = compute_tiers(&board, &config.tiers);
        let mut engine = Self {
            config,
            board,
            tiers,
            rng,
            phase: Phase::Idle,
            events: Vec::new(),
            stats: SessionSummary::default(),
            initial_shuffle: None,
        };
        engine.initial_shuffle = engine.repair_deadlock()?;
        engine.events.clear();
        Ok(engine)
    }

    /// Replaces the board with a fresh one of the same configuration.
    pub fn reset(&mut self, seed: u64) -> Result<(), GridError> {
        *self = Self::new(self.config, seed)?;
        Ok(())
    }

    /// Runs one player move against the cell at `(row, col)`.
    pub fn handle_select(&mut self, row: usize, col: usize) -> Result<SelectOutcome, GridError> {
        self.board.get(row, col)?;
        if self.phase != Phase::Idle {
            return Ok(SelectOutcome::Busy);
        }

        let group = find_group(&self.board, Coord::new(row, col));
        if group.len() < MIN_GROUP_SIZE {
            self.stats.ignored_selects += 1;
            return Ok(SelectOutcome::Ignored);
        }

        self.phase = Phase::Resolving;
        let resolved = self.resolve(&group);
        self.phase = Phase::Idle;
        let shuffle = resolved?;

        self.stats.moves += 1;
        self.stats.cells_removed += group.len() as u64;
        self.stats.largest_group = self.stats.largest_group.max(group.len());

        Ok(SelectOutcome::Collapsed(MoveReport {
            group_size: group.len(),
            color: group.color,
            shuffle,
            events: std::mem::take(&mut self.events),
        }))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn tiers(&self) -> &TierMap {
        &self.tiers
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn initial_shuffle(&self) -> Option<ShuffleOutcome> {
        self.initial_shuffle
    }

    pub fn is_deadlocked(&self) -> bool {
        is_deadlock(&self.board)
    }

    pub fn hint(&self) -> Option<Coord> {
        find_move(&self.board)
    }

    pub fn summary(&self) -> SessionSummary {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            rows: self.board.rows(),
            columns: self.board.columns(),
            color_count: self.board.color_count(),
            phase: self.phase,
            tiles: self.board.render_rows(),
            tiers: self.tiers.to_rows(),
            move_count: self.stats.moves,
            deadlocked: self.is_deadlocked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::board::Board;
    use crate::deadlock::is_deadlock;
    use crate::engine::{CollapseEngine, SelectOutcome};
    use crate::error::GridError;
    use crate::tiers::compute_tiers;
    use crate::types::{
        BoardConfig, Cell, GridEvent, MoveReport, Phase, ShuffleOutcome, TierThresholds,
    };

    fn config(rows: usize, columns: usize, color_count: u8) -> BoardConfig {
        BoardConfig {
            rows,
            columns,
            color_count,
            tiers: TierThresholds { a: 1, b: 2, c: 3 },
            max_shuffle_attempts: 100,
        }
    }

    fn fixture(rows: &[&str], color_count: u8, seed: u64) -> CollapseEngine {
        let board = Board::from_rows(rows, color_count).expect("valid fixture");
        let cfg = config(board.rows(), board.columns(), color_count);
        CollapseEngine::with_board(cfg, board, seed).expect("engine from fixture")
    }

    fn expect_collapsed(outcome: SelectOutcome) -> MoveReport {
        match outcome {
            SelectOutcome::Collapsed(report) => report,
            other => panic!("expected collapse, got {other:?}"),
        }
    }

    fn count(events: &[GridEvent], pred: fn(&GridEvent) -> bool) -> usize {
        events.iter().filter(|event| pred(event)).count()
    }

    /// Applies the structural events of one move to a copy of the pre-move board.
    fn replay(before: &Board, events: &[GridEvent]) -> Board {
        let mut board = before.clone();
        for event in events {
            match *event {
                GridEvent::CellRemoved { row, col } => {
                    board.clear(row, col).expect("in bounds");
                }
                GridEvent::CellMoved {
                    from_row,
                    to_row,
                    col,
                } => {
                    let cell = board.get(from_row, col).expect("in bounds");
                    board.set(to_row, col, cell).expect("in bounds");
                    board.clear(from_row, col).expect("in bounds");
                }
                GridEvent::CellSpawned { row, col, color }
                | GridEvent::CellRecolored { row, col, color } => {
                    board.set(row, col, Cell::Occupied(color)).expect("in bounds");
                }
                _ => {}
            }
        }
        board
    }

    #[test]
    fn scenario_collapse_keeps_board_full() {
        let mut engine = fixture(&["001", "011", "110"], 2, 11);
        let report = expect_collapsed(engine.handle_select(0, 0).expect("in bounds"));

        assert_eq!(report.group_size, 3);
        assert_eq!(report.color, 0);
        assert_eq!(
            &report.events[..3],
            &[
                GridEvent::CellRemoved { row: 0, col: 0 },
                GridEvent::CellRemoved { row: 0, col: 1 },
                GridEvent::CellRemoved { row: 1, col: 0 },
            ]
        );
        let spawned = count(&report.events, |e| matches!(e, GridEvent::CellSpawned { .. }));
        assert_eq!(spawned, 3);
        assert_eq!(engine.board().occupied_count(), 9);
        assert!(engine.board().is_settled());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn collapse_emits_moves_then_spawns_per_column() {
        let mut engine = fixture(&["01", "21", "00"], 3, 5);
        let report = expect_collapsed(engine.handle_select(2, 1).expect("in bounds"));

        assert_eq!(
            &report.events[..4],
            &[
                GridEvent::CellRemoved { row: 2, col: 0 },
                GridEvent::CellRemoved { row: 2, col: 1 },
                GridEvent::CellMoved {
                    from_row: 1,
                    to_row: 2,
                    col: 0
                },
                GridEvent::CellMoved {
                    from_row: 0,
                    to_row: 1,
                    col: 0
                },
            ]
        );
        assert!(matches!(
            report.events[4],
            GridEvent::CellSpawned { row: 0, col: 0, .. }
        ));
        assert_eq!(
            &report.events[5..7],
            &[
                GridEvent::CellMoved {
                    from_row: 1,
                    to_row: 2,
                    col: 1
                },
                GridEvent::CellMoved {
                    from_row: 0,
                    to_row: 1,
                    col: 1
                },
            ]
        );
        assert!(matches!(
            report.events[7],
            GridEvent::CellSpawned { row: 0, col: 1, .. }
        ));
        assert_eq!(engine.board().get(2, 0), Ok(Cell::Occupied(2)));
        assert_eq!(engine.board().get(1, 0), Ok(Cell::Occupied(0)));
        assert_eq!(engine.board().get(2, 1), Ok(Cell::Occupied(1)));
        assert_eq!(engine.board().get(1, 1), Ok(Cell::Occupied(1)));
    }

    #[test]
    fn tiers_match_fresh_partition_after_move() {
        let mut engine = fixture(&["001", "011", "110"], 2, 3);
        let before = engine.tiers().clone();
        let report = expect_collapsed(engine.handle_select(1, 1).expect("in bounds"));

        let fresh = compute_tiers(engine.board(), &engine.config.tiers);
        assert_eq!(engine.tiers(), &fresh);

        let tier_events = count(&report.events, |e| matches!(e, GridEvent::TierChanged { .. }));
        assert!(tier_events > 0);
        assert_ne!(before, fresh);
    }

    #[test]
    fn singleton_select_is_a_no_op() {
        let mut engine = fixture(&["001", "011", "110"], 2, 3);
        let board_before = engine.board().clone();
        let tiers_before = engine.tiers().clone();

        let outcome = engine.handle_select(2, 2).expect("in bounds");
        assert!(matches!(outcome, SelectOutcome::Ignored));
        assert_eq!(engine.board(), &board_before);
        assert_eq!(engine.tiers(), &tiers_before);
        assert_eq!(engine.summary().ignored_selects, 1);
        assert_eq!(engine.summary().moves, 0);
    }

    #[test]
    fn out_of_bounds_select_is_an_error() {
        let mut engine = fixture(&["001", "011", "110"], 2, 3);
        assert_eq!(
            engine.handle_select(3, 0).unwrap_err(),
            GridError::OutOfBounds {
                row: 3,
                col: 0,
                rows: 3,
                columns: 3
            }
        );
        assert!(engine.handle_select(0, 7).is_err());
    }

    #[test]
    fn select_while_resolving_is_dropped() {
        let mut engine = fixture(&["001", "011", "110"], 2, 3);
        let board_before = engine.board().clone();
        engine.phase = Phase::Resolving;

        assert!(matches!(
            engine.handle_select(0, 0).expect("in bounds"),
            SelectOutcome::Busy
        ));
        assert_eq!(engine.board(), &board_before);

        engine.phase = Phase::Idle;
        assert!(matches!(
            engine.handle_select(0, 0).expect("in bounds"),
            SelectOutcome::Collapsed(_)
        ));
    }

    #[test]
    fn deadlocked_fixture_is_shuffled_on_start() {
        let engine = fixture(&["0101", "1010", "0101", "1010"], 2, 21);
        assert!(matches!(
            engine.initial_shuffle(),
            Some(ShuffleOutcome::Resolved { .. })
        ));
        assert!(!engine.is_deadlocked());
        assert_eq!(engine.tiers(), &compute_tiers(engine.board(), &engine.config.tiers));
    }

    #[test]
    fn single_cell_board_reports_exhausted_shuffle() {
        let board = Board::from_rows(&["0"], 1).expect("valid fixture");
        let cfg = BoardConfig {
            max_shuffle_attempts: 7,
            ..config(1, 1, 1)
        };
        let mut engine = CollapseEngine::with_board(cfg, board, 0).expect("engine");
        assert_eq!(
            engine.initial_shuffle(),
            Some(ShuffleOutcome::Exhausted { attempts: 7 })
        );
        assert!(matches!(
            engine.handle_select(0, 0).expect("in bounds"),
            SelectOutcome::Ignored
        ));
    }

    #[test]
    fn post_move_deadlock_runs_shuffle_and_reports_it() {
        let mut saw_shuffle = false;
        let mut saw_clean = false;
        for seed in 0..64u64 {
            let board = Board::from_rows(&["00"], 2).expect("valid fixture");
            let cfg = BoardConfig {
                max_shuffle_attempts: 5,
                ..config(1, 2, 2)
            };
            let mut engine = CollapseEngine::with_board(cfg, board, seed).expect("engine");
            let report = expect_collapsed(engine.handle_select(0, 1).expect("in bounds"));

            match report.shuffle {
                Some(outcome) => {
                    saw_shuffle = true;
                    // two different colors side by side can never be repaired
                    assert_eq!(outcome, ShuffleOutcome::Exhausted { attempts: 5 });
                    let exhausted_at = report
                        .events
                        .iter()
                        .position(|e| *e == GridEvent::DeadlockExhausted { attempts: 5 })
                        .expect("exhausted event present");
                    let last_spawn = report
                        .events
                        .iter()
                        .rposition(|e| matches!(e, GridEvent::CellSpawned { .. }))
                        .expect("spawn events present");
                    assert!(last_spawn < exhausted_at);
                    assert!(engine.is_deadlocked());
                    assert_eq!(engine.summary().exhausted_shuffles, 1);
                }
                None => {
                    saw_clean = true;
                    assert!(!engine.is_deadlocked());
                }
            }
        }
        assert!(saw_shuffle);
        assert!(saw_clean);
    }

    #[test]
    fn same_seed_produces_same_session() {
        let mut a = CollapseEngine::new(BoardConfig::default(), 424_242).expect("engine");
        let mut b = CollapseEngine::new(BoardConfig::default(), 424_242).expect("engine");
        assert_eq!(a.board(), b.board());

        for _ in 0..200 {
            let Some(target) = a.hint() else {
                break;
            };
            assert_eq!(Some(target), b.hint());
            let ra = expect_collapsed(a.handle_select(target.row, target.col).expect("in bounds"));
            let rb = expect_collapsed(b.handle_select(target.row, target.col).expect("in bounds"));
            assert_eq!(ra.events, rb.events);
        }
        assert_eq!(a.board(), b.board());
        assert_eq!(a.summary(), b.summary());
    }

    #[test]
    fn random_play_preserves_board_invariants() {
        for seed in 0..30u64 {
            let mut engine = CollapseEngine::new(config(8, 8, 4), seed).expect("engine");
            for _ in 0..80 {
                let Some(target) = engine.hint() else {
                    break;
                };
                let before = engine.board().clone();
                let report =
                    expect_collapsed(engine.handle_select(target.row, target.col).expect("in bounds"));

                let removed = count(&report.events, |e| matches!(e, GridEvent::CellRemoved { .. }));
                let spawned = count(&report.events, |e| matches!(e, GridEvent::CellSpawned { .. }));
                assert_eq!(removed, report.group_size);
                assert_eq!(removed, spawned, "seed={seed}");
                assert_eq!(engine.board().occupied_count(), 64);
                assert!(engine.board().is_settled());
                assert!(engine.board().occupied().all(|(_, color)| color < 4));
                assert_eq!(engine.tiers(), &compute_tiers(engine.board(), &engine.config.tiers));
                assert_eq!(&replay(&before, &report.events), engine.board());
                if let Some(ShuffleOutcome::Resolved { .. }) = report.shuffle {
                    assert!(!is_deadlock(engine.board()));
                }
            }
        }
    }

    #[test]
    fn with_board_rejects_mismatched_or_partial_boards() {
        let board = Board::from_rows(&["01", "10"], 2).expect("valid fixture");
        assert!(matches!(
            CollapseEngine::with_board(config(3, 2, 2), board, 0),
            Err(GridError::MalformedBoard(_))
        ));

        let partial = Board::from_rows(&[".1", "10"], 2).expect("valid fixture");
        assert!(matches!(
            CollapseEngine::with_board(config(2, 2, 2), partial, 0),
            Err(GridError::MalformedBoard(_))
        ));
    }

    #[test]
    fn new_rejects_invalid_config() {
        assert!(matches!(
            CollapseEngine::new(config(0, 4, 3), 1),
            Err(GridError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            CollapseEngine::new(config(4, 4, 0), 1),
            Err(GridError::InvalidColorCount { .. })
        ));
        assert!(matches!(
            CollapseEngine::new(config(usize::MAX / 2 + 1, 4, 3), 1),
            Err(GridError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn reset_replaces_board_and_clears_stats() {
        let mut engine = CollapseEngine::new(config(6, 6, 3), 1).expect("engine");
        if let Some(target) = engine.hint() {
            engine.handle_select(target.row, target.col).expect("in bounds");
        }
        engine.reset(2).expect("reset");
        assert_eq!(engine.summary().moves, 0);
        assert_eq!(engine.board().occupied_count(), 36);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn snapshot_reflects_board_state() {
        let engine = fixture(&["001", "011", "110"], 2, 3);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.tiles, vec!["001", "011", "110"]);
        assert_eq!(snapshot.tiers[0], vec![2, 2, 3]);
        assert!(!snapshot.deadlocked);
        assert_eq!(snapshot.phase, Phase::Idle);

        let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(json["colorCount"], 2);
        assert_eq!(json["phase"], "idle");
    }
}
