//! Iterative allocation solvers
//!
//! Every local-search solver runs the same control loop ([`run_local_search`]):
//! each iteration a [`MoveProposer`] picks one item and a destination, the loop
//! scores the result, and an [`Acceptance`] policy decides whether the move is
//! committed. Termination is shared too: convergence against the threshold, stagnation
//! after `max_no_improve` non-improving iterations, or the iteration limit.
//!
//! - [`swap::RandomSwapSolver`]: random item, random new owner, commit on strict improvement
//! - [`mincov::DirectedAssignmentSolver`]: random item, weighted best recipient, always commit
//! - [`baseline::RandomBaselineSolver`]: independent full random draws, keep the best

pub mod baseline;
pub mod mincov;
pub mod swap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::allocation::Allocation;
use crate::bundle::BundleValueMatrix;
use crate::error::AllocError;
use crate::objective::{Direction, Evaluator};
use crate::valuation::ValuationMatrix;

pub use baseline::RandomBaselineSolver;
pub use mincov::DirectedAssignmentSolver;
pub use swap::RandomSwapSolver;

/// Why a solve stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Best score reached the convergence threshold
    Converged,
    IterationLimitReached,
    /// `max_no_improve` consecutive iterations without improvement
    Stagnated,
}

impl Status {
    /// Numeric status code at the caller boundary
    pub fn code(self) -> u8 {
        match self {
            Status::Converged => 0,
            Status::IterationLimitReached => 1,
            Status::Stagnated => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Converged => write!(f, "Converged"),
            Status::IterationLimitReached => write!(f, "Iteration Limit Reached"),
            Status::Stagnated => write!(f, "Stagnated"),
        }
    }
}

/// Loop limits shared by all solvers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub max_iterations: usize,
    /// Stop after this many consecutive non-improving iterations.
    /// `None`, or any value `>= max_iterations`, disables the check.
    pub max_no_improve: Option<usize>,
    /// Convergence threshold when minimising (`<=`)
    pub eps: f64,
    /// Convergence threshold when maximising (`>=`). `None` means a maximising
    /// solve stops only by iteration limit or stagnation.
    #[serde(default)]
    pub maximize_eps: Option<f64>,
}

impl SolverParams {
    pub fn new(max_iterations: usize, eps: f64) -> Self {
        SolverParams {
            max_iterations,
            max_no_improve: None,
            eps,
            maximize_eps: None,
        }
    }

    pub fn with_max_no_improve(mut self, max_no_improve: usize) -> Self {
        self.max_no_improve = Some(max_no_improve);
        self
    }

    /// Stagnation limit actually in force
    pub fn effective_no_improve(&self) -> Option<usize> {
        self.max_no_improve
            .filter(|&limit| limit < self.max_iterations)
    }

    /// Opt in to convergence when maximising: stop once the score is `>= threshold`
    pub fn with_maximize_eps(mut self, threshold: f64) -> Self {
        self.maximize_eps = Some(threshold);
        self
    }

    /// Threshold in force for `direction`, if any
    pub fn threshold(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Minimize => Some(self.eps),
            Direction::Maximize => self.maximize_eps,
        }
    }

    /// Whether `score` ends the solve as converged
    pub fn converged(&self, direction: Direction, score: f64) -> bool {
        self.threshold(direction)
            .is_some_and(|eps| direction.reached(score, eps))
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            max_iterations: 10_000,
            max_no_improve: None,
            eps: 0.0,
            maximize_eps: None,
        }
    }
}

/// Objective value recorded at each iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    values: Vec<f64>,
}

impl Trace {
    pub fn new() -> Self {
        Trace { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Trace {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Running best value after each entry
    pub fn best_so_far(&self, direction: Direction) -> Vec<f64> {
        let mut best: Option<f64> = None;
        self.values
            .iter()
            .map(|&value| {
                let next = match best {
                    Some(b) if !direction.improves(value, b) => b,
                    _ => value,
                };
                best = Some(next);
                next
            })
            .collect()
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}

/// Inequality of the final allocation measured without the per-person targets
#[derive(Debug, Clone, PartialEq)]
pub struct UntargetedReport {
    pub objective: f64,
    pub bundle_values: BundleValueMatrix,
}

/// Final state of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub allocation: Allocation,
    /// Objective value of `allocation`
    pub objective: f64,
    pub bundle_values: BundleValueMatrix,
    pub trace: Trace,
    pub status: Status,
    pub iterations: usize,
    /// Only set by the target-aware directed solver
    pub untargeted: Option<UntargetedReport>,
}

/// A solver that improves an allocation of the items in `valuations`
pub trait Solver {
    fn name(&self) -> &'static str;

    fn solve<R: Rng>(
        &self,
        valuations: &ValuationMatrix,
        initial: Allocation,
        rng: &mut R,
    ) -> Result<SolveOutcome, AllocError>;
}

/// Fail fast if the allocation does not fit the valuation matrix
pub fn validate_allocation(
    valuations: &ValuationMatrix,
    allocation: &Allocation,
) -> Result<(), AllocError> {
    if allocation.items() != valuations.items() {
        return Err(AllocError::DimensionMismatch {
            what: "allocation length",
            expected: valuations.items(),
            found: allocation.items(),
        });
    }
    if allocation.persons() != valuations.persons() {
        return Err(AllocError::DimensionMismatch {
            what: "allocation person count",
            expected: valuations.persons(),
            found: allocation.persons(),
        });
    }
    if let Some((item, &owner)) = allocation
        .owners()
        .iter()
        .enumerate()
        .find(|(_, &o)| o >= valuations.persons())
    {
        return Err(AllocError::InvalidAllocation {
            item,
            owner,
            persons: valuations.persons(),
        });
    }
    Ok(())
}

/// A single-item reassignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub item: usize,
    pub from: usize,
    pub to: usize,
}

/// Allocation and bundle matrix evolving together through a solve
#[derive(Debug, Clone)]
pub struct SearchState<'a> {
    pub valuations: &'a ValuationMatrix,
    pub allocation: Allocation,
    pub bundles: BundleValueMatrix,
}

impl<'a> SearchState<'a> {
    pub fn new(valuations: &'a ValuationMatrix, allocation: Allocation) -> Self {
        let bundles = BundleValueMatrix::build(valuations, &allocation);
        SearchState {
            valuations,
            allocation,
            bundles,
        }
    }

    /// One person or no items: there is nothing to move
    pub fn is_degenerate(&self) -> bool {
        self.valuations.persons() == 1 || self.valuations.items() == 0
    }

    pub fn commit(&mut self, mv: Move) {
        self.allocation.reassign(mv.item, mv.to);
        self.bundles
            .apply_move(self.valuations, mv.item, mv.from, mv.to);
    }
}

/// Chooses the move to try at each iteration
pub trait MoveProposer {
    fn propose<R: Rng>(&mut self, state: &SearchState<'_>, rng: &mut R) -> Move;
}

/// How the loop treats a proposed move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Score a hypothetical move; commit only if it strictly beats the best so far
    StrictImprovement,
    /// Always commit; improvement is judged against the previous iteration
    Unconditional,
}

/// Result of the shared control loop
#[derive(Debug, Clone)]
pub struct LoopResult {
    /// Best score for [`Acceptance::StrictImprovement`], current score otherwise;
    /// in both cases the score of the state's allocation
    pub score: f64,
    pub trace: Trace,
    pub status: Status,
    pub iterations: usize,
}

/// The control loop shared by all local-search solvers
///
/// The trace starts with the score of the initial state, so its length is
/// `iterations + 1`.
pub fn run_local_search<P, R>(
    state: &mut SearchState<'_>,
    proposer: &mut P,
    evaluator: &Evaluator,
    acceptance: Acceptance,
    params: &SolverParams,
    rng: &mut R,
) -> LoopResult
where
    P: MoveProposer,
    R: Rng,
{
    let direction = evaluator.direction();
    let no_improve_limit = params.effective_no_improve();

    let mut incumbent = evaluator.score(&state.bundles);
    let mut trace = Trace::with_capacity(params.max_iterations.saturating_add(1).min(1 << 20));
    trace.push(incumbent);

    if state.is_degenerate() {
        tracing::debug!(
            persons = state.valuations.persons(),
            items = state.valuations.items(),
            "nothing to move; returning initial allocation"
        );
        return LoopResult {
            score: incumbent,
            trace,
            status: Status::Converged,
            iterations: 0,
        };
    }

    let mut scratch = state.bundles.clone();
    let mut no_improve = 0usize;
    let mut iterations = 0usize;
    let mut status = Status::IterationLimitReached;

    while iterations < params.max_iterations {
        let mv = proposer.propose(state, rng);

        let improved = match acceptance {
            Acceptance::StrictImprovement => {
                state
                    .bundles
                    .preview_move(state.valuations, mv.item, mv.from, mv.to, &mut scratch);
                let score = evaluator.score(&scratch);
                trace.push(score);
                if direction.improves(score, incumbent) {
                    state.allocation.reassign(mv.item, mv.to);
                    std::mem::swap(&mut state.bundles, &mut scratch);
                    incumbent = score;
                    tracing::trace!(item = mv.item, from = mv.from, to = mv.to, score, "accepted move");
                    true
                } else {
                    false
                }
            }
            Acceptance::Unconditional => {
                state.commit(mv);
                let score = evaluator.score(&state.bundles);
                trace.push(score);
                let improved = direction.improves(score, incumbent);
                incumbent = score;
                tracing::trace!(item = mv.item, from = mv.from, to = mv.to, score, "committed move");
                improved
            }
        };

        if improved {
            no_improve = 0;
        } else {
            no_improve += 1;
        }
        iterations += 1;

        if params.converged(direction, incumbent) {
            status = Status::Converged;
            break;
        }
        if no_improve_limit.is_some_and(|limit| no_improve >= limit) {
            status = Status::Stagnated;
            break;
        }
    }

    LoopResult {
        score: incumbent,
        trace,
        status,
        iterations,
    }
}
