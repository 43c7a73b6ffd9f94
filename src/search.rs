//! Multi-threaded best-improvement local search.
//!
//! Each iteration scores the current solution, splits neighbor generation
//! across scoped worker threads, and moves to the best strictly improving
//! neighbor. Workers only read the current solution and the strategy; each
//! keeps its own best candidate and random engine, so the only
//! synchronization is the join at the end of the iteration. Ties are broken
//! by generation order inside a worker and by worker id across workers,
//! which makes a run reproducible for a fixed seed and thread count.

use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::neighborhood::{Neighborhood, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Single-pass construction finished.
    Completed,
    /// Feasible and no improving neighbor left.
    Converged,
    IterationLimitReached,
    TimeLimitReached,
    /// Infeasible, no improving neighbor, and the heuristic no longer changes.
    Stalled,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchStatus::Completed => "completed",
            SearchStatus::Converged => "converged",
            SearchStatus::IterationLimitReached => "iteration limit reached",
            SearchStatus::TimeLimitReached => "time limit reached",
            SearchStatus::Stalled => "stalled",
        };
        f.write_str(name)
    }
}

/// Result of a solver run.
#[derive(Debug, Clone)]
pub struct SolveOutcome<S> {
    pub solution: S,
    /// Accepted states, starting with the initial one. Empty unless requested.
    pub log: Vec<S>,
    pub elapsed: Duration,
    /// Greedy: insertions performed. Local search: iterations run.
    pub iterations: u64,
    pub status: SearchStatus,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub iter_max: Option<u64>,
    pub time_max: Option<Duration>,
    pub threads: usize,
    pub seed: u64,
    pub record_log: bool,
    /// Ignore the iteration and time limits while `good` is false.
    pub return_good: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iter_max: None,
            time_max: None,
            threads: default_threads(),
            seed: 0,
            record_log: false,
            return_good: true,
        }
    }
}

pub fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

struct Candidate<S> {
    solution: S,
    score: f64,
}

fn worker_seed(seed: u64, iteration: u64, worker: Worker) -> u64 {
    seed.wrapping_add(iteration.wrapping_mul(worker.count as u64))
        .wrapping_add(worker.id as u64)
}

/// Best neighbor from one worker's slice that beats `current_score`.
fn best_in_slice<N: Neighborhood>(
    strategy: &N,
    solution: &N::Solution,
    current_score: f64,
    iteration: u64,
    worker: Worker,
    seed: u64,
) -> Option<Candidate<N::Solution>> {
    let mut rng = StdRng::seed_from_u64(worker_seed(seed, iteration, worker));
    let mut best: Option<Candidate<N::Solution>> = None;
    for neighbor in strategy.neighbors(solution, worker, &mut rng) {
        let score = strategy.heuristic(&neighbor, iteration);
        let threshold = best.as_ref().map_or(current_score, |b| b.score);
        if score < threshold {
            best = Some(Candidate {
                solution: neighbor,
                score,
            });
        }
    }
    best
}

fn best_neighbor<N: Neighborhood>(
    strategy: &N,
    solution: &N::Solution,
    current_score: f64,
    iteration: u64,
    workers: usize,
    seed: u64,
) -> Option<Candidate<N::Solution>> {
    if workers == 1 {
        return best_in_slice(
            strategy,
            solution,
            current_score,
            iteration,
            Worker::single(),
            seed,
        );
    }

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = Worker { id, count: workers };
                scope.spawn(move || {
                    best_in_slice(strategy, solution, current_score, iteration, worker, seed)
                })
            })
            .collect();

        let mut best: Option<Candidate<N::Solution>> = None;
        for handle in handles {
            let found = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            if let Some(candidate) = found
                && best.as_ref().is_none_or(|b| candidate.score < b.score)
            {
                best = Some(candidate);
            }
        }
        best
    })
}

/// Hill-climbs from `strategy.initial(seed)` until convergence or a limit.
///
/// Limits are checked between iterations only; an iteration in flight always
/// completes. With `return_good` set they only apply once the solution is
/// `good`; an infeasible search then ends by converging or stalling. A
/// returned solution for which `good` is false is a soft failure and is
/// reported through the status, never as an error.
pub fn run_local_search<N: Neighborhood>(
    strategy: &N,
    config: &SearchConfig,
) -> SolveOutcome<N::Solution> {
    let start = Instant::now();
    let workers = config.threads.max(1);

    let mut solution = strategy.initial(config.seed);
    let mut log = Vec::new();
    if config.record_log {
        log.push(solution.clone());
    }

    let mut iteration: u64 = 0;
    let status = loop {
        let limits_apply = !config.return_good || strategy.good(&solution);
        if limits_apply && config.iter_max.is_some_and(|max| iteration >= max) {
            break SearchStatus::IterationLimitReached;
        }
        if limits_apply && config.time_max.is_some_and(|max| start.elapsed() >= max) {
            break SearchStatus::TimeLimitReached;
        }

        let score = strategy.heuristic(&solution, iteration);
        let best = best_neighbor(strategy, &solution, score, iteration, workers, config.seed);
        let improved = best.is_some();
        if let Some(candidate) = best {
            tracing::debug!(
                iteration,
                from = score,
                to = candidate.score,
                "accepted improving neighbor"
            );
            solution = candidate.solution;
            if config.record_log {
                log.push(solution.clone());
            }
        }

        let settled = strategy.is_settled(iteration);
        iteration += 1;
        if !improved {
            if strategy.good(&solution) {
                break SearchStatus::Converged;
            }
            if settled {
                break SearchStatus::Stalled;
            }
        }
    };

    let elapsed = start.elapsed();
    if strategy.good(&solution) {
        tracing::info!(
            %status,
            iterations = iteration,
            elapsed_ms = elapsed.as_millis() as u64,
            "local search finished"
        );
    } else {
        tracing::warn!(
            %status,
            iterations = iteration,
            elapsed_ms = elapsed.as_millis() as u64,
            "local search finished without a feasible solution"
        );
    }

    SolveOutcome {
        solution,
        log,
        elapsed,
        iterations: iteration,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bin;
    use rand::Rng;

    /// Walks an integer towards zero; neighbors are the values within
    /// `step` of the current one, split by offset across workers.
    struct Walk {
        start: i64,
        step: i64,
        floor: i64,
    }

    impl Neighborhood for Walk {
        type Solution = i64;

        fn initial(&self, _seed: u64) -> i64 {
            self.start
        }

        fn neighbors(&self, solution: &i64, worker: Worker, _rng: &mut StdRng) -> Vec<i64> {
            let offsets: Vec<i64> = (-self.step..=self.step).filter(|&d| d != 0).collect();
            offsets[worker.range(offsets.len())]
                .iter()
                .map(|d| (solution + d).max(self.floor))
                .collect()
        }

        fn heuristic(&self, solution: &i64, _iteration: u64) -> f64 {
            solution.abs() as f64
        }

        fn good(&self, solution: &i64) -> bool {
            *solution == 0
        }

        fn get_boxes(&self, _solution: &i64) -> Vec<Bin> {
            Vec::new()
        }
    }

    fn config(threads: usize) -> SearchConfig {
        SearchConfig {
            threads,
            record_log: true,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_converges_to_optimum() {
        let walk = Walk {
            start: 17,
            step: 3,
            floor: i64::MIN,
        };
        for threads in [1, 2, 4] {
            let outcome = run_local_search(&walk, &config(threads));
            assert_eq!(outcome.solution, 0);
            assert_eq!(outcome.status, SearchStatus::Converged);
            assert_eq!(outcome.log, vec![17, 14, 11, 8, 5, 2, 0]);
        }
    }

    #[test]
    fn test_log_strictly_improves() {
        let walk = Walk {
            start: -40,
            step: 7,
            floor: i64::MIN,
        };
        let outcome = run_local_search(&walk, &config(3));
        for pair in outcome.log.windows(2) {
            assert!(walk.heuristic(&pair[1], 0) < walk.heuristic(&pair[0], 0));
        }
    }

    #[test]
    fn test_iteration_limit_returns_best_effort() {
        let walk = Walk {
            start: 100,
            step: 1,
            floor: i64::MIN,
        };
        let cfg = SearchConfig {
            iter_max: Some(5),
            return_good: false,
            ..config(2)
        };
        let outcome = run_local_search(&walk, &cfg);
        assert_eq!(outcome.status, SearchStatus::IterationLimitReached);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.solution, 95);
        assert!(!walk.good(&outcome.solution));
    }

    #[test]
    fn test_zero_iterations_returns_initial() {
        let walk = Walk {
            start: 9,
            step: 1,
            floor: i64::MIN,
        };
        let cfg = SearchConfig {
            iter_max: Some(0),
            return_good: false,
            ..config(1)
        };
        let outcome = run_local_search(&walk, &cfg);
        assert_eq!(outcome.solution, 9);
        assert_eq!(outcome.log, vec![9]);
    }

    #[test]
    fn test_time_limit() {
        let walk = Walk {
            start: 1_000_000_000,
            step: 1,
            floor: i64::MIN,
        };
        let cfg = SearchConfig {
            time_max: Some(Duration::from_millis(20)),
            record_log: false,
            return_good: false,
            ..config(1)
        };
        let outcome = run_local_search(&walk, &cfg);
        assert_eq!(outcome.status, SearchStatus::TimeLimitReached);
        assert!(outcome.solution < 1_000_000_000);
    }

    #[test]
    fn test_stalls_when_infeasible_local_minimum() {
        // The floor keeps the walk from ever reaching zero.
        let walk = Walk {
            start: 10,
            step: 2,
            floor: 4,
        };
        let outcome = run_local_search(&walk, &config(2));
        assert_eq!(outcome.solution, 4);
        assert_eq!(outcome.status, SearchStatus::Stalled);
    }

    #[test]
    fn test_limits_wait_for_good_solution() {
        let walk = Walk {
            start: 10,
            step: 2,
            floor: 4,
        };
        let cfg = SearchConfig {
            iter_max: Some(1),
            ..config(2)
        };
        let outcome = run_local_search(&walk, &cfg);
        assert_eq!(outcome.solution, 4);
        assert_eq!(outcome.status, SearchStatus::Stalled);
        assert_eq!(outcome.iterations, 4);

        let outcome = run_local_search(
            &walk,
            &SearchConfig {
                return_good: false,
                ..cfg
            },
        );
        assert_eq!(outcome.solution, 8);
        assert_eq!(outcome.status, SearchStatus::IterationLimitReached);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_limits_apply_once_good() {
        let walk = Walk {
            start: 30,
            step: 1,
            floor: i64::MIN,
        };
        let cfg = SearchConfig {
            iter_max: Some(3),
            ..config(1)
        };
        // Still infeasible at the limit, so the walk carries on to zero and
        // the limit takes effect right after.
        let outcome = run_local_search(&walk, &cfg);
        assert_eq!(outcome.solution, 0);
        assert_eq!(outcome.iterations, 30);
        assert_eq!(outcome.status, SearchStatus::IterationLimitReached);
    }

    /// From 0, moves to one of `candidates`. Odd values score 5, even ones
    /// 7, so odd candidates tie for best.
    struct Ties {
        candidates: Vec<i64>,
    }

    impl Neighborhood for Ties {
        type Solution = i64;

        fn initial(&self, _seed: u64) -> i64 {
            0
        }

        fn neighbors(&self, solution: &i64, worker: Worker, _rng: &mut StdRng) -> Vec<i64> {
            if *solution != 0 {
                return Vec::new();
            }
            self.candidates[worker.range(self.candidates.len())].to_vec()
        }

        fn heuristic(&self, solution: &i64, _iteration: u64) -> f64 {
            match solution {
                0 => 10.0,
                s if s % 2 != 0 => 5.0,
                _ => 7.0,
            }
        }

        fn good(&self, _solution: &i64) -> bool {
            true
        }

        fn get_boxes(&self, _solution: &i64) -> Vec<Bin> {
            Vec::new()
        }
    }

    #[test]
    fn test_tie_within_worker_keeps_first() {
        let ties = Ties {
            candidates: vec![2, 3, 4, 1],
        };
        let outcome = run_local_search(&ties, &config(1));
        assert_eq!(outcome.log, vec![0, 3]);
        assert_eq!(outcome.status, SearchStatus::Converged);
    }

    #[test]
    fn test_tie_across_workers_keeps_lowest_id() {
        // Worker 0 gets [2, 3] and worker 1 gets [4, 1].
        let ties = Ties {
            candidates: vec![2, 3, 4, 1],
        };
        let outcome = run_local_search(&ties, &config(2));
        assert_eq!(outcome.log, vec![0, 3]);

        // Worker 0 gets [4, 1] and worker 1 gets [2, 3].
        let ties = Ties {
            candidates: vec![4, 1, 2, 3],
        };
        for _ in 0..10 {
            let outcome = run_local_search(&ties, &config(2));
            assert_eq!(outcome.solution, 1);
        }
    }

    #[test]
    fn test_worker_ranges_partition() {
        for len in [0, 1, 5, 17] {
            for count in 1..6 {
                let mut covered = Vec::new();
                for id in 0..count {
                    covered.extend(Worker { id, count }.range(len));
                }
                assert_eq!(covered, (0..len).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_worker_seeds_differ() {
        let a = worker_seed(1, 3, Worker { id: 0, count: 2 });
        let b = worker_seed(1, 3, Worker { id: 1, count: 2 });
        let c = worker_seed(1, 4, Worker { id: 0, count: 2 });
        assert!(a != b && a != c && b != c);

        let mut r1 = StdRng::seed_from_u64(a);
        let mut r2 = StdRng::seed_from_u64(a);
        assert_eq!(r1.gen_range(0..1000), r2.gen_range(0..1000));
    }
}
