use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tilefall::board::Board;
use tilefall::constants::{
    clamp_board_side, clamp_color_count, clamp_shuffle_attempts, MIN_GROUP_SIZE,
};
use tilefall::deadlock::is_deadlock;
use tilefall::engine::{CollapseEngine, SelectOutcome};
use tilefall::groups::{partition_groups, Group};
use tilefall::logging::{emit_log, now_ms, LogContext, LogLevel};
use tilefall::rng::Rng;
use tilefall::tiers::{compute_tiers, TierMap};
use tilefall::types::{BoardConfig, Coord, GridEvent, MoveReport, ShuffleOutcome, TierThresholds};

const MAX_MOVES: i64 = 100_000;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    rows: Option<i64>,
    #[arg(long)]
    columns: Option<i64>,
    #[arg(long)]
    colors: Option<i64>,
    #[arg(long)]
    tier_a: Option<i64>,
    #[arg(long)]
    tier_b: Option<i64>,
    #[arg(long)]
    tier_c: Option<i64>,
    #[arg(long)]
    max_shuffle_attempts: Option<i64>,
    #[arg(long)]
    moves: Option<i64>,
    #[arg(long)]
    seed: Option<u64>,
    /// largest | first | random
    #[arg(long)]
    strategy: Option<String>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Strategy {
    Largest,
    First,
    Random,
}

impl Strategy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "largest" => Some(Self::Largest),
            "first" => Some(Self::First),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum StopReason {
    MoveLimit,
    /// No legal move left after an exhausted shuffle.
    Stuck,
    EngineError,
}

impl StopReason {
    fn key(self) -> &'static str {
        match self {
            StopReason::MoveLimit => "move_limit",
            StopReason::Stuck => "stuck",
            StopReason::EngineError => "engine_error",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    config: BoardConfig,
    moves: u64,
    strategy: Strategy,
    seed: u64,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    rows: usize,
    columns: usize,
    #[serde(rename = "colorCount")]
    color_count: u8,
    strategy: Strategy,
    #[serde(rename = "movesRequested")]
    moves_requested: u64,
    #[serde(rename = "movesPlayed")]
    moves_played: u64,
    #[serde(rename = "stopReason")]
    stop_reason: StopReason,
    #[serde(rename = "cellsRemoved")]
    cells_removed: u64,
    #[serde(rename = "cellsSpawned")]
    cells_spawned: u64,
    #[serde(rename = "largestGroup")]
    largest_group: usize,
    shuffles: u64,
    #[serde(rename = "shuffleAttempts")]
    shuffle_attempts: u64,
    #[serde(rename = "exhaustedShuffles")]
    exhausted_shuffles: u64,
    #[serde(rename = "tierUps")]
    tier_ups: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    #[serde(rename = "move")]
    move_index: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct ShuffleRecord {
    move_index: u64,
    outcome: ShuffleOutcome,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    shuffle_records: Vec<ShuffleRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "totalMoves")]
    total_moves: u64,
    #[serde(rename = "averageMoves")]
    average_moves: u64,
    #[serde(rename = "stopReasonCounts")]
    stop_reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Default)]
struct AnomalyLog {
    messages: Vec<String>,
    records: Vec<AnomalyRecord>,
    seen: HashSet<String>,
}

impl AnomalyLog {
    fn push(&mut self, move_index: u64, message: String) {
        self.records.push(AnomalyRecord {
            move_index,
            message: message.clone(),
        });
        if self.seen.insert(message.clone()) {
            self.messages.push(message);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let session_id = cli
        .session_id
        .clone()
        .unwrap_or_else(|| default_session_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut stop_reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_moves = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        let scenario_context = LogContext {
            scenario: Some(scenario.name.as_str()),
            seed: Some(scenario.seed),
            move_index: None,
        };
        emit_log(
            LogLevel::Info,
            "scenario_started",
            &session_id,
            scenario_context,
            json!({
                "config": scenario.config,
                "moves": scenario.moves,
                "strategy": scenario.strategy,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for record in &scenario_run.shuffle_records {
            let (level, event) = match record.outcome {
                ShuffleOutcome::Resolved { .. } => (LogLevel::Info, "deadlock_resolved"),
                ShuffleOutcome::Exhausted { .. } => (LogLevel::Warn, "deadlock_exhausted"),
            };
            emit_log(
                level,
                event,
                &session_id,
                LogContext {
                    move_index: Some(record.move_index),
                    ..scenario_context
                },
                json!({ "attempts": record.outcome.attempts() }),
            );
        }

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                LogLevel::Warn,
                "anomaly_detected",
                &session_id,
                LogContext {
                    move_index: Some(anomaly.move_index),
                    ..scenario_context
                },
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_moves += scenario_run.result.moves_played;
        *stop_reason_counts
            .entry(scenario_run.result.stop_reason.key().to_string())
            .or_insert(0) += 1;

        emit_log(
            LogLevel::Info,
            "scenario_finished",
            &session_id,
            LogContext {
                move_index: Some(scenario_run.result.moves_played),
                ..scenario_context
            },
            json!({
                "stopReason": scenario_run.result.stop_reason,
                "movesPlayed": scenario_run.result.moves_played,
                "shuffles": scenario_run.result.shuffles,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("[simulate] failed to serialize result: {error}"),
        }
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        session_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        stop_reason_counts,
        total_anomalies,
        total_moves,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                LogLevel::Error,
                "summary_write_failed",
                &session_id,
                LogContext::default(),
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        LogLevel::Info,
        "run_finished",
        &session_id,
        LogContext::default(),
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "totalMoves": summary.total_moves,
            "stopReasonCounts": summary.stop_reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut anomalies = AnomalyLog::default();
    let mut shuffle_records = Vec::new();
    let mut result = ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        rows: scenario.config.rows,
        columns: scenario.config.columns,
        color_count: scenario.config.color_count,
        strategy: scenario.strategy,
        moves_requested: scenario.moves,
        moves_played: 0,
        stop_reason: StopReason::MoveLimit,
        cells_removed: 0,
        cells_spawned: 0,
        largest_group: 0,
        shuffles: 0,
        shuffle_attempts: 0,
        exhausted_shuffles: 0,
        tier_ups: 0,
        anomalies: Vec::new(),
    };

    let mut engine = match CollapseEngine::new(scenario.config, scenario.seed) {
        Ok(engine) => engine,
        Err(error) => {
            anomalies.push(0, format!("engine setup failed: {error}"));
            result.stop_reason = StopReason::EngineError;
            result.anomalies = anomalies.messages;
            return ScenarioRunResult {
                result,
                anomaly_records: anomalies.records,
                shuffle_records,
            };
        }
    };
    if let Some(outcome) = engine.initial_shuffle() {
        shuffle_records.push(ShuffleRecord {
            move_index: 0,
            outcome,
        });
    }

    let mut picker = Rng::new(scenario.seed ^ 0x5EED_CAFE);
    while result.moves_played < scenario.moves {
        let move_index = result.moves_played + 1;
        let Some(target) = pick_target(engine.board(), scenario.strategy, &mut picker) else {
            result.stop_reason = StopReason::Stuck;
            break;
        };

        let report = match engine.handle_select(target.row, target.col) {
            Ok(SelectOutcome::Collapsed(report)) => report,
            Ok(other) => {
                anomalies.push(
                    move_index,
                    format!("select on a legal group was not collapsed: {other:?}"),
                );
                result.stop_reason = StopReason::EngineError;
                break;
            }
            Err(error) => {
                anomalies.push(move_index, format!("select failed: {error}"));
                result.stop_reason = StopReason::EngineError;
                break;
            }
        };
        result.moves_played = move_index;

        for message in
            collect_move_anomalies(engine.board(), engine.tiers(), &scenario.config, &report)
        {
            anomalies.push(move_index, message);
        }
        result.tier_ups += count_tier_ups(&report);
        if let Some(outcome) = report.shuffle {
            shuffle_records.push(ShuffleRecord {
                move_index,
                outcome,
            });
        }
    }

    let summary = engine.summary();
    result.cells_removed = summary.cells_removed;
    result.cells_spawned = summary.cells_spawned;
    result.largest_group = summary.largest_group;
    result.shuffles = summary.shuffles;
    result.shuffle_attempts = summary.shuffle_attempts;
    result.exhausted_shuffles = summary.exhausted_shuffles;
    result.anomalies = anomalies.messages;

    ScenarioRunResult {
        result,
        anomaly_records: anomalies.records,
        shuffle_records,
    }
}

fn pick_target(board: &Board, strategy: Strategy, rng: &mut Rng) -> Option<Coord> {
    let mut legal = partition_groups(board)
        .into_iter()
        .filter(|group| group.len() >= MIN_GROUP_SIZE);

    match strategy {
        Strategy::First => legal.next()?.cells.first().copied(),
        Strategy::Largest => {
            let mut best: Option<Group> = None;
            for group in legal {
                let better = match &best {
                    Some(current) => group.len() > current.len(),
                    None => true,
                };
                if better {
                    best = Some(group);
                }
            }
            best?.cells.first().copied()
        }
        Strategy::Random => {
            let groups: Vec<_> = legal.collect();
            if groups.is_empty() {
                return None;
            }
            let picked = &groups[rng.pick_index(groups.len())];
            let cells: Vec<Coord> = picked.cells.iter().copied().collect();
            Some(cells[rng.pick_index(cells.len())])
        }
    }
}

fn collect_move_anomalies(
    board: &Board,
    tiers: &TierMap,
    config: &BoardConfig,
    report: &MoveReport,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    let expected = config.rows * config.columns;

    if !board.is_settled() {
        anomalies.push("occupied cell above an empty cell".to_string());
    }
    let occupied = board.occupied_count();
    if occupied != expected {
        anomalies.push(format!("board not full: {occupied}/{expected}"));
    }
    for (coord, color) in board.occupied() {
        if color >= config.color_count {
            anomalies.push(format!(
                "color out of range at ({}, {}): {color}",
                coord.row, coord.col
            ));
        }
    }
    if tiers != &compute_tiers(board, &config.tiers) {
        anomalies.push("tier map differs from group partition".to_string());
    }
    if matches!(report.shuffle, Some(ShuffleOutcome::Resolved { .. })) && is_deadlock(board) {
        anomalies.push("resolved shuffle left the board deadlocked".to_string());
    }

    let removed = report
        .events
        .iter()
        .filter(|event| matches!(event, GridEvent::CellRemoved { .. }))
        .count();
    let spawned = report
        .events
        .iter()
        .filter(|event| matches!(event, GridEvent::CellSpawned { .. }))
        .count();
    if removed != spawned {
        anomalies.push(format!("removed {removed} cells but spawned {spawned}"));
    }
    if removed != report.group_size {
        anomalies.push(format!(
            "group of {} reported {removed} removals",
            report.group_size
        ));
    }
    anomalies
}

fn count_tier_ups(report: &MoveReport) -> u64 {
    report
        .events
        .iter()
        .filter(|event| matches!(event, GridEvent::TierChanged { tier, .. } if *tier > 0))
        .count() as u64
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli.seed.unwrap_or_else(now_ms);
    let strategy = cli.strategy.as_deref().and_then(Strategy::parse);
    let custom = cli.single
        || cli.rows.is_some()
        || cli.columns.is_some()
        || cli.colors.is_some()
        || cli.tier_a.is_some()
        || cli.tier_b.is_some()
        || cli.tier_c.is_some()
        || cli.max_shuffle_attempts.is_some();

    if custom {
        let defaults = BoardConfig::default();
        let config = BoardConfig {
            rows: cli.rows.map(clamp_board_side).unwrap_or(defaults.rows),
            columns: cli.columns.map(clamp_board_side).unwrap_or(defaults.columns),
            color_count: cli
                .colors
                .map(clamp_color_count)
                .unwrap_or(defaults.color_count),
            tiers: TierThresholds {
                a: cli.tier_a.map(clamp_threshold).unwrap_or(defaults.tiers.a),
                b: cli.tier_b.map(clamp_threshold).unwrap_or(defaults.tiers.b),
                c: cli.tier_c.map(clamp_threshold).unwrap_or(defaults.tiers.c),
            },
            max_shuffle_attempts: cli
                .max_shuffle_attempts
                .map(clamp_shuffle_attempts)
                .unwrap_or(defaults.max_shuffle_attempts),
        };
        return vec![Scenario {
            name: format!(
                "custom-{}x{}-c{}",
                config.rows, config.columns, config.color_count
            ),
            config,
            moves: clamp_moves(cli.moves.unwrap_or(200)),
            strategy: strategy.unwrap_or(Strategy::Largest),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check-6x6".to_string(),
            config: BoardConfig {
                rows: 6,
                columns: 6,
                color_count: 4,
                ..BoardConfig::default()
            },
            moves: clamp_moves(cli.moves.unwrap_or(100)),
            strategy: strategy.unwrap_or(Strategy::First),
            seed,
        },
        Scenario {
            name: "standard-10x10".to_string(),
            config: BoardConfig::default(),
            moves: clamp_moves(cli.moves.unwrap_or(300)),
            strategy: strategy.unwrap_or(Strategy::Largest),
            seed: seed.wrapping_add(1),
        },
    ]
}

fn clamp_moves(value: i64) -> u64 {
    value.clamp(1, MAX_MOVES) as u64
}

fn clamp_threshold(value: i64) -> usize {
    value.max(0) as usize
}

fn default_session_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    session_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    stop_reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_moves: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_moves = if scenario_count == 0 {
        0
    } else {
        total_moves / scenario_count as u64
    };
    RunSummary {
        session_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        total_moves,
        average_moves,
        stop_reason_counts,
        scenarios,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
