//! Parallel level-synchronous exploration of the puzzle state space.
//!
//! A coordinator on the calling thread hands out one depth level at a time
//! to a fixed pool of workers over a shared job channel. Workers expand
//! states, admit successors into the [`VisitedRegistry`] and send the
//! admitted ones back. The next level is only dispatched once every reply
//! for the current level has arrived, so the first solved state found is at
//! minimum depth.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::canonical::{canonicalize, CanonicalKey};
use crate::error::{Result, SolverError};
use crate::moves::{apply, legal_moves};
use crate::puzzle::{PuzzleDefinition, PuzzleState};
use crate::registry::{AdmitResult, VisitedRegistry};
use crate::reporter::{Solution, SolutionReporter};

/// When to stop once a solved state shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Finish the level, then return the solution with the smallest key.
    #[default]
    DrainLevel,
    /// Return the first solution any worker reports.
    FirstHit,
}

/// Configuration for the solver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Number of worker threads
    pub workers: usize,
    pub stop_policy: StopPolicy,
    /// Maximum time to search
    pub timeout: Option<Duration>,
    /// Maximum number of distinct states to admit
    pub max_states: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            stop_policy: StopPolicy::default(),
            timeout: None,
            max_states: None,
        }
    }
}

impl SolverConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_stop_policy(mut self, stop_policy: StopPolicy) -> Self {
        self.stop_policy = stop_policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = Some(max_states);
        self
    }
}

/// Terminal outcome of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchOutcome {
    Solved,
    /// Frontier exhausted without reaching a solved state
    Unsolvable,
    TimedOut,
    StateLimitReached,
}

/// Result of the solver search
#[derive(Debug, Clone)]
pub struct SolverResult {
    pub outcome: SearchOutcome,
    /// Minimum-length solution, when one was found
    pub solution: Option<Solution>,
    /// States taken off the frontier and expanded
    pub states_expanded: u64,
    /// Distinct states admitted into the registry, root included
    pub states_admitted: usize,
    /// Depth of the last level reached
    pub depth_reached: u32,
    pub time_elapsed_ms: u64,
}

impl SolverResult {
    pub fn is_solved(&self) -> bool {
        self.outcome == SearchOutcome::Solved
    }
}

/// Snapshot handed to a [`SearchObserver`] before each level is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub depth: u32,
    pub frontier: usize,
    pub admitted: usize,
    pub expanded: u64,
}

/// Optional progress and solution sink. Called from the coordinator thread;
/// implementations must return quickly.
pub trait SearchObserver: Sync {
    fn on_level(&self, _progress: &LevelProgress) {}
    fn on_solution(&self, _solution: &Solution) {}
}

impl SearchObserver for () {}

/// Lifecycle of an [`ExplorationScheduler`]. Readable from other threads
/// (and from a [`SearchObserver`]) while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerPhase {
    Idle = 0,
    /// Workers are expanding levels
    Running = 1,
    /// Search stopped; workers joined, solution being reported
    Draining = 2,
    Done = 3,
}

impl SchedulerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SchedulerPhase::Idle,
            1 => SchedulerPhase::Running,
            2 => SchedulerPhase::Draining,
            _ => SchedulerPhase::Done,
        }
    }
}

/// A frontier entry: a concrete state plus its canonical key.
#[derive(Debug)]
struct Job {
    state: PuzzleState,
    key: CanonicalKey,
}

#[derive(Debug)]
enum WorkerMessage {
    Expanded {
        successors: Vec<Job>,
        solved: Vec<CanonicalKey>,
    },
    /// Job dropped because the search is stopping
    Discarded,
    Failed {
        worker_id: usize,
        error: SolverError,
    },
}

/// How the coordinator loop ended.
struct Finish {
    outcome: SearchOutcome,
    solved: Option<CanonicalKey>,
    depth: u32,
}

pub struct ExplorationScheduler {
    config: SolverConfig,
    registry: VisitedRegistry,
    phase: AtomicU8,
    stop: AtomicBool,
    expanded: AtomicU64,
}

impl ExplorationScheduler {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            registry: VisitedRegistry::new(),
            phase: AtomicU8::new(SchedulerPhase::Idle as u8),
            stop: AtomicBool::new(false),
            expanded: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        SchedulerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn registry(&self) -> &VisitedRegistry {
        &self.registry
    }

    /// Search from `root`. A scheduler runs at most once.
    pub fn run(&self, root: &PuzzleState, observer: &dyn SearchObserver) -> Result<SolverResult> {
        let claimed = self.phase.compare_exchange(
            SchedulerPhase::Idle as u8,
            SchedulerPhase::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if claimed.is_err() {
            return Err(SolverError::internal("scheduler has already run"));
        }

        let result = self.search(root, observer);
        self.set_phase(SchedulerPhase::Done);
        result
    }

    fn search(&self, root: &PuzzleState, observer: &dyn SearchObserver) -> Result<SolverResult> {
        let start_time = Instant::now();

        let root_key = canonicalize(root);
        self.registry.seed(root_key.clone())?;

        if root.is_solved() {
            info!("Start configuration is already solved");
            self.set_phase(SchedulerPhase::Draining);
            let solution = Solution::default();
            observer.on_solution(&solution);
            return Ok(self.result(SearchOutcome::Solved, Some(solution), 0, start_time));
        }

        let workers = self.config.workers.max(1);
        info!(
            "Searching {} stacks of capacity {} with {} workers",
            root.stacks().len(),
            root.capacity(),
            workers
        );

        let registry = &self.registry;
        let stop = &self.stop;
        let expanded = &self.expanded;
        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<WorkerMessage>();

        let finish = thread::scope(|scope| {
            for worker_id in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || run_worker(worker_id, registry, stop, expanded, jobs, results));
            }
            drop(result_tx);

            let coordinator = Coordinator {
                config: &self.config,
                registry,
                expanded,
                observer,
                start_time,
            };
            let root_job = Job {
                state: root.clone(),
                key: root_key,
            };
            let finish = coordinator.run(job_tx, &result_rx, root_job);

            // Job sender is gone; workers discard what is left and exit.
            stop.store(true, Ordering::Release);
            finish
        });
        self.set_phase(SchedulerPhase::Draining);
        let finish = finish?;
        self.registry.check_admissions()?;

        let solution = match &finish.solved {
            Some(key) => {
                let solution = SolutionReporter::new(&self.registry).report(key)?;
                observer.on_solution(&solution);
                Some(solution)
            }
            None => None,
        };

        let result = self.result(finish.outcome, solution, finish.depth, start_time);
        info!(
            "Search finished: {:?} at depth {} ({} expanded, {} admitted, {} ms)",
            result.outcome,
            result.depth_reached,
            result.states_expanded,
            result.states_admitted,
            result.time_elapsed_ms
        );
        Ok(result)
    }

    fn result(
        &self,
        outcome: SearchOutcome,
        solution: Option<Solution>,
        depth_reached: u32,
        start_time: Instant,
    ) -> SolverResult {
        SolverResult {
            outcome,
            solution,
            states_expanded: self.expanded.load(Ordering::Relaxed),
            states_admitted: self.registry.len(),
            depth_reached,
            time_elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

struct Coordinator<'a> {
    config: &'a SolverConfig,
    registry: &'a VisitedRegistry,
    expanded: &'a AtomicU64,
    observer: &'a dyn SearchObserver,
    start_time: Instant,
}

impl Coordinator<'_> {
    /// Dispatch levels until a solution, exhaustion, a limit or an error.
    /// Consumes the job sender so the queue closes when this returns.
    fn run(&self, jobs: Sender<Job>, results: &Receiver<WorkerMessage>, root: Job) -> Result<Finish> {
        let mut level = vec![root];
        let mut depth: u32 = 0;

        loop {
            if level.is_empty() {
                info!("Frontier exhausted at depth {}", depth);
                return Ok(self.finish(SearchOutcome::Unsolvable, None, depth));
            }
            if let Some(outcome) = self.limit_reached() {
                return Ok(self.finish(outcome, None, depth));
            }

            let progress = LevelProgress {
                depth,
                frontier: level.len(),
                admitted: self.registry.len(),
                expanded: self.expanded.load(Ordering::Relaxed),
            };
            debug!(
                "Depth {}: {} states in frontier, {} admitted",
                progress.depth, progress.frontier, progress.admitted
            );
            self.observer.on_level(&progress);

            let pending = level.len();
            for job in level.drain(..) {
                jobs.send(job)
                    .map_err(|_| SolverError::internal("job queue closed during search"))?;
            }

            let mut next = Vec::new();
            let mut solved: Vec<CanonicalKey> = Vec::new();
            for _ in 0..pending {
                let message = results
                    .recv()
                    .map_err(|_| SolverError::internal("all workers exited mid-level"))?;
                match message {
                    WorkerMessage::Expanded {
                        successors,
                        solved: found,
                    } => {
                        next.extend(successors);
                        solved.extend(found);
                    }
                    WorkerMessage::Discarded => {}
                    WorkerMessage::Failed { worker_id, error } => {
                        error!("Worker {} failed: {}", worker_id, error);
                        return Err(error);
                    }
                }

                if self.config.stop_policy == StopPolicy::FirstHit && !solved.is_empty() {
                    break;
                }
                if let Some(outcome) = self.limit_reached() {
                    return Ok(self.finish(outcome, None, depth));
                }
            }

            // Any solved key here is exactly one move deeper than this level.
            if let Some(key) = solved.into_iter().min() {
                return Ok(self.finish(SearchOutcome::Solved, Some(key), depth + 1));
            }

            level = next;
            depth += 1;
        }
    }

    fn limit_reached(&self) -> Option<SearchOutcome> {
        if let Some(timeout) = self.config.timeout {
            if self.start_time.elapsed() >= timeout {
                warn!("Search timed out after {:?}", timeout);
                return Some(SearchOutcome::TimedOut);
            }
        }
        if let Some(max_states) = self.config.max_states {
            if self.registry.len() >= max_states {
                warn!("State limit of {} reached", max_states);
                return Some(SearchOutcome::StateLimitReached);
            }
        }
        None
    }

    fn finish(&self, outcome: SearchOutcome, solved: Option<CanonicalKey>, depth: u32) -> Finish {
        Finish {
            outcome,
            solved,
            depth,
        }
    }
}

fn run_worker(
    worker_id: usize,
    registry: &VisitedRegistry,
    stop: &AtomicBool,
    expanded: &AtomicU64,
    jobs: Receiver<Job>,
    results: Sender<WorkerMessage>,
) {
    // Blocks on an empty queue; ends once the coordinator drops the sender.
    for job in jobs.iter() {
        let message = if stop.load(Ordering::Acquire) {
            WorkerMessage::Discarded
        } else {
            match expand(registry, &job) {
                Ok((successors, solved)) => {
                    expanded.fetch_add(1, Ordering::Relaxed);
                    WorkerMessage::Expanded { successors, solved }
                }
                Err(error) => WorkerMessage::Failed { worker_id, error },
            }
        };
        if results.send(message).is_err() {
            break;
        }
    }
    debug!("Worker {} exiting", worker_id);
}

/// Expand one state, returning the admitted successors and the keys of
/// those that are solved.
fn expand(registry: &VisitedRegistry, job: &Job) -> Result<(Vec<Job>, Vec<CanonicalKey>)> {
    let mut successors = Vec::new();
    let mut solved = Vec::new();

    for mv in legal_moves(&job.state) {
        let next = apply(&job.state, &mv)?;
        let key = canonicalize(&next);
        match registry.admit(key.clone(), next.path_length(), job.key.clone(), mv) {
            AdmitResult::Rejected => {}
            AdmitResult::Accepted | AdmitResult::Improved => {
                if next.is_solved() {
                    solved.push(key.clone());
                }
                successors.push(Job { state: next, key });
            }
        }
    }

    Ok((successors, solved))
}

/// Solve from a root state with a fresh scheduler.
pub fn solve(root: &PuzzleState, config: &SolverConfig) -> Result<SolverResult> {
    ExplorationScheduler::new(config.clone()).run(root, &())
}

/// Validate a definition, then solve it. Input errors surface before any
/// search work starts.
pub fn solve_definition(definition: &PuzzleDefinition, config: &SolverConfig) -> Result<SolverResult> {
    let root = definition.build()?;
    solve(&root, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    fn state(rows: &[&str]) -> PuzzleState {
        PuzzleState::from_rows(rows).unwrap()
    }

    fn config() -> SolverConfig {
        SolverConfig::default().with_workers(4)
    }

    /// Sequential BFS distances over the whole reachable space.
    fn bfs_distances(root: &PuzzleState) -> HashMap<CanonicalKey, u32> {
        let mut distances = HashMap::new();
        let mut queue = VecDeque::new();
        distances.insert(canonicalize(root), 0);
        queue.push_back(root.clone());
        while let Some(current) = queue.pop_front() {
            for mv in legal_moves(&current) {
                let next = apply(&current, &mv).unwrap();
                let key = canonicalize(&next);
                if !distances.contains_key(&key) {
                    distances.insert(key, next.path_length());
                    queue.push_back(next);
                }
            }
        }
        distances
    }

    #[test]
    fn test_two_color_scenario() {
        let root = state(&["AABB", "BBAA", "....", "...."]);
        let result = solve(&root, &config()).unwrap();

        assert!(result.is_solved());
        let solution = result.solution.unwrap();
        assert_eq!(solution.len(), 3);

        let states = solution.replay(&root).unwrap();
        let last = states.last().unwrap();
        assert!(last.is_solved());
        assert_eq!(last.stacks().iter().filter(|s| s.is_full_run()).count(), 2);
        assert_eq!(last.stacks().iter().filter(|s| s.is_empty()).count(), 2);
        assert_eq!(last.color_counts(), root.color_counts());
    }

    #[test]
    fn test_definition_scenario() {
        let definition = PuzzleDefinition {
            capacity: 4,
            empty_stacks: 2,
            units: "AABB BBAA".to_string(),
            stack_count: None,
        };
        let root = definition.build().unwrap();
        let result = solve_definition(&definition, &config()).unwrap();
        assert_eq!(result.depth_reached, 3);

        let states = result.solution.unwrap().replay(&root).unwrap();
        assert_eq!(states.len(), 4);
        let last = states.last().unwrap();
        assert_eq!(last.stacks().iter().filter(|s| s.is_full_run()).count(), 2);
        assert_eq!(last.stacks().iter().filter(|s| s.is_empty()).count(), 2);
    }

    #[test]
    fn test_already_solved_does_no_work() {
        let root = state(&["AAAA", "BBBB", "C...", "...."]);
        let scheduler = ExplorationScheduler::new(config());
        let result = scheduler.run(&root, &()).unwrap();

        assert!(result.is_solved());
        assert!(result.solution.unwrap().is_empty());
        assert_eq!(result.states_expanded, 0);
        assert_eq!(result.states_admitted, 1);
        assert_eq!(scheduler.phase(), SchedulerPhase::Done);
    }

    #[test]
    fn test_single_full_stack_is_solved() {
        let root = state(&["AAAA", "....", "...."]);
        let result = solve(&root, &config()).unwrap();
        assert_eq!(result.outcome, SearchOutcome::Solved);
        assert!(result.solution.unwrap().is_empty());
    }

    #[test]
    fn test_bad_length_fails_before_search() {
        let definition = PuzzleDefinition {
            capacity: 4,
            empty_stacks: 2,
            units: "AABBBBA".to_string(),
            stack_count: None,
        };
        assert!(matches!(
            solve_definition(&definition, &config()),
            Err(SolverError::Input(InputError::NotMultipleOfCapacity { .. }))
        ));
    }

    #[test]
    fn test_unsolvable() {
        // Both stacks are full and no move is legal
        let root = state(&["AB", "BA"]);
        let result = solve(&root, &config()).unwrap();
        assert_eq!(result.outcome, SearchOutcome::Unsolvable);
        assert!(result.solution.is_none());
        assert_eq!(result.states_expanded, 1);
    }

    #[test]
    fn test_path_lengths_are_minimal() {
        let root = state(&["ABCA", "BCAB", "CABC", "...."]);
        let distances = bfs_distances(&root);

        for policy in [StopPolicy::DrainLevel, StopPolicy::FirstHit] {
            let scheduler = ExplorationScheduler::new(config().with_stop_policy(policy));
            let result = scheduler.run(&root, &()).unwrap();

            for (key, node) in scheduler.registry().snapshot() {
                assert_eq!(Some(&node.path_length), distances.get(&key), "{:?}", key);
            }

            let shortest = distances
                .iter()
                .filter(|(key, _)| {
                    // Solved: no chunk mixes colors and no color spans two chunks
                    let mut gathered = HashSet::new();
                    key.as_bytes().chunks(root.capacity()).all(|stack| match stack[0] {
                        0 => true,
                        color => {
                            stack.iter().all(|&b| b == 0 || b == color) && gathered.insert(color)
                        }
                    })
                })
                .map(|(_, &distance)| distance)
                .min();
            match shortest {
                Some(distance) => {
                    assert!(result.is_solved());
                    assert_eq!(result.solution.unwrap().len() as u32, distance);
                }
                None => assert_eq!(result.outcome, SearchOutcome::Unsolvable),
            }
        }
    }

    #[test]
    fn test_single_worker_matches_pool() {
        let root = state(&["ABAB", "BABA", "....", "...."]);
        let single = solve(&root, &config().with_workers(1)).unwrap();
        let pool = solve(&root, &config().with_workers(8)).unwrap();
        assert!(single.is_solved());

        // DrainLevel picks the smallest solved key, so both runs end in the
        // same state even if the paths to it differ.
        let end = |result: SolverResult| {
            let states = result.solution.unwrap().replay(&root).unwrap();
            canonicalize(states.last().unwrap())
        };
        assert_eq!(single.depth_reached, pool.depth_reached);
        assert_eq!(end(single), end(pool));
    }

    #[test]
    fn test_state_limit() {
        let root = state(&["ABCD", "BCDA", "CDAB", "DABC", "....", "...."]);
        let result = solve(&root, &config().with_max_states(5)).unwrap();
        assert_eq!(result.outcome, SearchOutcome::StateLimitReached);
        assert!(result.solution.is_none());
    }

    #[test]
    fn test_scheduler_runs_once() {
        let root = state(&["AABB", "BBAA", "....", "...."]);
        let scheduler = ExplorationScheduler::new(config());
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        scheduler.run(&root, &()).unwrap();
        assert!(matches!(scheduler.run(&root, &()), Err(SolverError::Internal(_))));
    }

    #[test]
    fn test_unsolvable_run_passes_admission_check() {
        let scheduler = ExplorationScheduler::new(config());
        let root = state(&["AB", "BA"]);
        scheduler.run(&root, &()).unwrap();
        assert_eq!(scheduler.phase(), SchedulerPhase::Done);
        assert!(scheduler.registry().check_admissions().is_ok());
    }

    /// Records the scheduler phase each time the observer is called.
    struct PhaseWatcher<'a> {
        scheduler: &'a ExplorationScheduler,
        seen: Mutex<Vec<SchedulerPhase>>,
    }

    impl SearchObserver for PhaseWatcher<'_> {
        fn on_level(&self, _progress: &LevelProgress) {
            self.seen.lock().unwrap().push(self.scheduler.phase());
        }

        fn on_solution(&self, _solution: &Solution) {
            self.seen.lock().unwrap().push(self.scheduler.phase());
        }
    }

    #[test]
    fn test_phase_visible_to_observer() {
        let root = state(&["AABB", "BBAA", "....", "...."]);
        let scheduler = ExplorationScheduler::new(config());
        let watcher = PhaseWatcher {
            scheduler: &scheduler,
            seen: Mutex::new(Vec::new()),
        };
        let result = scheduler.run(&root, &watcher).unwrap();
        assert!(result.is_solved());

        let seen = watcher.seen.lock().unwrap();
        let (last, levels) = seen.split_last().unwrap();
        assert_eq!(levels.len() as u32, result.depth_reached);
        assert!(levels.iter().all(|&phase| phase == SchedulerPhase::Running));
        assert_eq!(*last, SchedulerPhase::Draining);
        assert_eq!(scheduler.phase(), SchedulerPhase::Done);
    }

    #[derive(Default)]
    struct Recorder {
        levels: Mutex<Vec<LevelProgress>>,
        solutions: Mutex<Vec<Solution>>,
    }

    impl SearchObserver for Recorder {
        fn on_level(&self, progress: &LevelProgress) {
            self.levels.lock().unwrap().push(*progress);
        }

        fn on_solution(&self, solution: &Solution) {
            self.solutions.lock().unwrap().push(solution.clone());
        }
    }

    #[test]
    fn test_observer_sees_levels_and_solution() {
        let root = state(&["AABB", "BBAA", "....", "...."]);
        let recorder = Recorder::default();
        let result = ExplorationScheduler::new(config()).run(&root, &recorder).unwrap();

        let levels = recorder.levels.lock().unwrap();
        assert_eq!(levels[0].depth, 0);
        assert_eq!(levels[0].frontier, 1);
        assert_eq!(levels.len() as u32, result.depth_reached);

        let solutions = recorder.solutions.lock().unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(Some(&solutions[0]), result.solution.as_ref());
    }
}
