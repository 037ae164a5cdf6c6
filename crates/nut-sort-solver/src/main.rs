//! CLI entry point for the nut sort solver.
//!
//! Usage:
//!   nut-sort-solver solve <puzzle> [options]
//!   nut-sort-solver solve --stdin [options]
//!
//! Options:
//!   --capacity <n>       Units per stack for raw text input (default: 4)
//!   --empty-stacks <n>   Empty buffer stacks for raw text input (default: 2)
//!   --json-input         Treat the input as a JSON puzzle definition
//!   --workers <n>        Worker threads (default: available parallelism)
//!   --timeout <seconds>  Maximum search time
//!   --max-states <n>     Maximum distinct states to admit
//!   --first-hit          Stop at the first solution instead of draining its level
//!   --show-states        Print every intermediate state
//!   --progress           Print per-level progress to stderr
//!   --json               Print the result as JSON
//!
//! Exit code is 0 when solved, 1 when unsolvable or a limit was hit, and 2 on
//! error. Set `RUST_LOG=debug` for search logs.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use nut_sort_solver::{
    load_definition, read_definition, ExplorationScheduler, InputFormat, LevelProgress, Move,
    PuzzleState, SearchObserver, SearchOutcome, SolverConfig, SolverError, SolverResult,
    StopPolicy, TextLayout,
};

#[derive(Parser)]
#[command(name = "nut-sort-solver")]
#[command(about = "Find the shortest solution to a colored stack sorting puzzle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a puzzle and print a minimum-length move list
    Solve {
        /// Path to the puzzle (use --stdin to read from stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Read puzzle from stdin instead of file
        #[arg(long)]
        stdin: bool,

        /// Treat the input as a JSON puzzle definition
        #[arg(long)]
        json_input: bool,

        /// Units per stack for raw text input
        #[arg(long, default_value = "4")]
        capacity: usize,

        /// Empty buffer stacks appended to raw text input
        #[arg(long, default_value = "2")]
        empty_stacks: usize,

        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Maximum search time in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum distinct states to admit
        #[arg(long)]
        max_states: Option<usize>,

        /// Stop at the first solution found
        #[arg(long)]
        first_hit: bool,

        /// Print every intermediate state
        #[arg(long)]
        show_states: bool,

        /// Print per-level progress to stderr
        #[arg(long)]
        progress: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Output format for a solver run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveOutput {
    outcome: SearchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    move_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moves: Option<Vec<Move>>,
    states_expanded: u64,
    states_admitted: usize,
    depth_reached: u32,
    time_elapsed_ms: u64,
}

struct ProgressPrinter;

impl SearchObserver for ProgressPrinter {
    fn on_level(&self, progress: &LevelProgress) {
        eprintln!(
            "depth {:>3}: frontier {:>9}, admitted {:>10}, expanded {:>10}",
            progress.depth, progress.frontier, progress.admitted, progress.expanded
        );
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, SolverError> {
    match cli.command {
        Commands::Solve {
            file,
            stdin,
            json_input,
            capacity,
            empty_stacks,
            workers,
            timeout,
            max_states,
            first_hit,
            show_states,
            progress,
            json,
        } => {
            let layout = TextLayout {
                capacity,
                empty_stacks,
            };

            // Read puzzle
            let definition = if stdin {
                let format = if json_input {
                    InputFormat::Json
                } else {
                    InputFormat::Text
                };
                read_definition(io::stdin().lock(), format, layout)?
            } else if let Some(path) = file {
                load_definition(&path, json_input.then_some(InputFormat::Json), layout)?
            } else {
                eprintln!("Error: Must provide either a file path or --stdin");
                return Ok(2);
            };
            let root = definition.build()?;

            // Build solver config
            let mut config = SolverConfig::default();
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if let Some(seconds) = timeout {
                config = config.with_timeout(Duration::from_secs(seconds));
            }
            if let Some(max_states) = max_states {
                config = config.with_max_states(max_states);
            }
            if first_hit {
                config = config.with_stop_policy(StopPolicy::FirstHit);
            }

            // Run solver
            let scheduler = ExplorationScheduler::new(config);
            let result = if progress {
                scheduler.run(&root, &ProgressPrinter)?
            } else {
                scheduler.run(&root, &())?
            };

            if json {
                let output = format_result(&result);
                let text = serde_json::to_string_pretty(&output)
                    .map_err(|e| SolverError::Internal(format!("failed to encode output: {}", e)))?;
                println!("{}", text);
            } else {
                print_result(&root, &result, show_states)?;
            }

            Ok(if result.is_solved() { 0 } else { 1 })
        }
    }
}

fn format_result(result: &SolverResult) -> SolveOutput {
    SolveOutput {
        outcome: result.outcome,
        move_count: result.solution.as_ref().map(|s| s.len()),
        moves: result.solution.as_ref().map(|s| s.moves.clone()),
        states_expanded: result.states_expanded,
        states_admitted: result.states_admitted,
        depth_reached: result.depth_reached,
        time_elapsed_ms: result.time_elapsed_ms,
    }
}

fn print_result(
    root: &PuzzleState,
    result: &SolverResult,
    show_states: bool,
) -> Result<(), SolverError> {
    let Some(solution) = &result.solution else {
        let reason = match result.outcome {
            SearchOutcome::Unsolvable => "no solution exists",
            SearchOutcome::TimedOut => "search timed out",
            SearchOutcome::StateLimitReached => "state limit reached",
            SearchOutcome::Solved => "solved",
        };
        println!(
            "{} ({} states explored in {} ms)",
            reason, result.states_admitted, result.time_elapsed_ms
        );
        return Ok(());
    };

    println!(
        "Solved in {} moves ({} states explored in {} ms)",
        solution.len(),
        result.states_admitted,
        result.time_elapsed_ms
    );
    if show_states {
        let states = solution.replay(root)?;
        print!("{}", states[0]);
        for (mv, state) in solution.moves.iter().zip(&states[1..]) {
            println!();
            println!("{}", mv);
            print!("{}", state);
        }
    } else {
        for (step, mv) in solution.moves.iter().enumerate() {
            println!("{:>3}. {}", step + 1, mv);
        }
    }
    Ok(())
}
