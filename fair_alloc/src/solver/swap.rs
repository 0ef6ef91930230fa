use rand::Rng;

use super::{
    run_local_search, validate_allocation, Acceptance, Move, MoveProposer, SearchState,
    SolveOutcome, Solver, SolverParams,
};
use crate::allocation::Allocation;
use crate::error::AllocError;
use crate::objective::{Evaluator, Objective};
use crate::valuation::ValuationMatrix;

/// Uniform random item, handed to a uniformly chosen different person
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReassignment;

impl MoveProposer for RandomReassignment {
    fn propose<R: Rng>(&mut self, state: &SearchState<'_>, rng: &mut R) -> Move {
        let persons = state.valuations.persons();
        let item = rng.random_range(0..state.valuations.items());
        let offset = rng.random_range(1..persons);
        let from = state.allocation.owner(item);
        Move {
            item,
            from,
            to: Allocation::rotated_owner(from, offset, persons),
        }
    }
}

/// Random single-item local search, accepting only strict improvements
#[derive(Debug, Clone)]
pub struct RandomSwapSolver {
    objective: Objective,
    params: SolverParams,
}

impl RandomSwapSolver {
    pub fn new(objective: Objective, params: SolverParams) -> Self {
        RandomSwapSolver { objective, params }
    }

    /// Minimise the largest pairwise envy
    pub fn envy(params: SolverParams) -> Self {
        Self::new(Objective::MaxEnvy, params)
    }

    /// Minimise social inequality
    pub fn social(params: SolverParams) -> Self {
        Self::new(Objective::SocialInequality, params)
    }

    /// Maximise Nash utility
    pub fn utility(params: SolverParams) -> Self {
        Self::new(Objective::NashUtility, params)
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }
}

impl Solver for RandomSwapSolver {
    fn name(&self) -> &'static str {
        match self.objective {
            Objective::MaxEnvy => "envy",
            Objective::SocialInequality => "social",
            Objective::NashUtility => "utility",
        }
    }

    fn solve<R: Rng>(
        &self,
        valuations: &ValuationMatrix,
        initial: Allocation,
        rng: &mut R,
    ) -> Result<SolveOutcome, AllocError> {
        validate_allocation(valuations, &initial)?;
        tracing::debug!(
            solver = self.name(),
            persons = valuations.persons(),
            items = valuations.items(),
            max_iterations = self.params.max_iterations,
            "starting random swap search"
        );

        let mut state = SearchState::new(valuations, initial);
        let evaluator = Evaluator::new(self.objective, &state.bundles);
        let result = run_local_search(
            &mut state,
            &mut RandomReassignment,
            &evaluator,
            Acceptance::StrictImprovement,
            &self.params,
            rng,
        );

        tracing::debug!(
            solver = self.name(),
            status = %result.status,
            iterations = result.iterations,
            objective = result.score,
            "random swap search finished"
        );

        Ok(SolveOutcome {
            allocation: state.allocation,
            objective: result.score,
            bundle_values: state.bundles,
            trace: result.trace,
            status: result.status,
            iterations: result.iterations,
            untargeted: None,
        })
    }
}
