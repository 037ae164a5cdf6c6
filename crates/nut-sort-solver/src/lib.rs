//! Shortest-path solver for colored stack sorting puzzles.
//!
//! A puzzle is a set of fixed-capacity stacks of colored units. A move takes
//! the top run of one stack onto an empty stack or a stack with the same top
//! color; the puzzle is solved when every non-empty stack holds one color.
//! The solver explores the state space breadth-first with a pool of worker
//! threads and reports a minimum-length move sequence.

pub mod canonical;
pub mod error;
pub mod input;
pub mod moves;
pub mod puzzle;
pub mod registry;
pub mod reporter;
pub mod scheduler;

// Re-export main types
pub use canonical::{canonicalize, CanonicalKey};
pub use error::{InputError, SolverError};
pub use input::{load_definition, parse_definition, read_definition, InputFormat, TextLayout};
pub use moves::{apply, check_move, legal_moves, Move};
pub use puzzle::{Color, PuzzleDefinition, PuzzleState, Stack, TopRun};
pub use registry::{AdmitResult, SearchNode, VisitedRegistry};
pub use reporter::{Solution, SolutionReporter};
pub use scheduler::{
    solve, solve_definition, ExplorationScheduler, LevelProgress, SchedulerPhase, SearchObserver,
    SearchOutcome, SolverConfig, SolverResult, StopPolicy,
};
