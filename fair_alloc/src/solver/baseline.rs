use rand::Rng;

use super::{validate_allocation, SolveOutcome, Solver, SolverParams, Status, Trace};
use crate::allocation::Allocation;
use crate::bundle::BundleValueMatrix;
use crate::error::AllocError;
use crate::objective::{Evaluator, Objective};
use crate::valuation::ValuationMatrix;

/// Multi-start sampling: independent uniform allocations, best one kept
///
/// The caller's allocation is the starting incumbent. The trace holds the
/// score of every draw, so its length equals the number of iterations.
/// There is no stagnation check since draws are independent.
#[derive(Debug, Clone)]
pub struct RandomBaselineSolver {
    objective: Objective,
    params: SolverParams,
}

impl RandomBaselineSolver {
    pub fn new(objective: Objective, params: SolverParams) -> Self {
        RandomBaselineSolver { objective, params }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }
}

impl Solver for RandomBaselineSolver {
    fn name(&self) -> &'static str {
        match self.objective {
            Objective::MaxEnvy => "random_envy",
            Objective::SocialInequality => "random_social",
            Objective::NashUtility => "random_utility",
        }
    }

    fn solve<R: Rng>(
        &self,
        valuations: &ValuationMatrix,
        initial: Allocation,
        rng: &mut R,
    ) -> Result<SolveOutcome, AllocError> {
        validate_allocation(valuations, &initial)?;
        let persons = valuations.persons();
        let items = valuations.items();

        let mut best_bundles = BundleValueMatrix::build(valuations, &initial);
        let evaluator = Evaluator::new(self.objective, &best_bundles);
        let direction = evaluator.direction();
        let mut best_score = evaluator.score(&best_bundles);
        let mut best_allocation = initial;

        if persons == 1 || items == 0 {
            tracing::debug!(persons, items, "nothing to sample; returning initial allocation");
            return Ok(SolveOutcome {
                allocation: best_allocation,
                objective: best_score,
                bundle_values: best_bundles,
                trace: Trace::new(),
                status: Status::Converged,
                iterations: 0,
                untargeted: None,
            });
        }

        tracing::debug!(
            solver = self.name(),
            persons,
            items,
            max_iterations = self.params.max_iterations,
            "starting random baseline"
        );

        let mut trace = Trace::with_capacity(self.params.max_iterations.min(1 << 20));
        let mut status = Status::IterationLimitReached;
        let mut iterations = 0;

        while iterations < self.params.max_iterations {
            let candidate = Allocation::random(items, persons, rng);
            let bundles = BundleValueMatrix::build(valuations, &candidate);
            let score = evaluator.score(&bundles);
            trace.push(score);
            iterations += 1;

            if direction.improves(score, best_score) {
                tracing::trace!(iteration = iterations, score, "new best draw");
                best_score = score;
                best_allocation = candidate;
                best_bundles = bundles;
            }

            if self.params.converged(direction, best_score) {
                status = Status::Converged;
                break;
            }
        }

        tracing::debug!(
            solver = self.name(),
            status = %status,
            iterations,
            objective = best_score,
            "random baseline finished"
        );

        Ok(SolveOutcome {
            allocation: best_allocation,
            objective: best_score,
            bundle_values: best_bundles,
            trace,
            status,
            iterations,
            untargeted: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::max_envy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn instance() -> ValuationMatrix {
        ValuationMatrix::new(vec![
            vec![4.0, 1.0, 3.0, 2.0],
            vec![1.0, 5.0, 2.0, 2.0],
            vec![3.0, 3.0, 1.0, 4.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_single_draw_never_exceeds_total_value() {
        let v = instance();
        for seed in 0..20 {
            let solver = RandomBaselineSolver::new(Objective::MaxEnvy, SolverParams::new(1, 0.0));
            let initial = Allocation::all_to(0, 4, 3).unwrap();
            let out = solver
                .solve(&v, initial, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            assert!(out.objective <= v.total());
            assert_eq!(out.iterations.min(1), out.trace.len());
        }
    }

    #[test]
    fn test_keeps_best_draw() {
        let v = instance();
        let solver = RandomBaselineSolver::new(Objective::MaxEnvy, SolverParams::new(200, -1.0));
        let initial = Allocation::all_to(0, 4, 3).unwrap();
        let initial_envy = max_envy(&BundleValueMatrix::build(&v, &initial));

        let out = solver
            .solve(&v, initial, &mut StdRng::seed_from_u64(4))
            .unwrap();

        assert_eq!(out.status, Status::IterationLimitReached);
        assert_eq!(out.trace.len(), 200);
        let best_draw = out.trace.min().unwrap();
        assert_eq!(out.objective, best_draw.min(initial_envy));
        assert_eq!(out.objective, max_envy(&BundleValueMatrix::build(&v, &out.allocation)));
        assert_eq!(out.bundle_values, BundleValueMatrix::build(&v, &out.allocation));
    }

    #[test]
    fn test_utility_ignores_minimise_threshold() {
        let v = instance();
        let out = RandomBaselineSolver::new(Objective::NashUtility, SolverParams::new(40, 0.0))
            .solve(&v, Allocation::all_to(0, 4, 3).unwrap(), &mut StdRng::seed_from_u64(2))
            .unwrap();

        assert_eq!(out.status, Status::IterationLimitReached);
        assert_eq!(out.iterations, 40);
        assert_eq!(out.trace.len(), 40);
    }

    #[test]
    fn test_utility_maximises() {
        let v = instance();
        let solver = RandomBaselineSolver::new(
            Objective::NashUtility,
            SolverParams::new(300, 0.0),
        );
        let initial = Allocation::all_to(0, 4, 3).unwrap();

        let out = solver
            .solve(&v, initial, &mut StdRng::seed_from_u64(12))
            .unwrap();

        assert_eq!(solver.name(), "random_utility");
        assert!(out.objective > 0.0);
        assert_eq!(Some(out.objective), out.trace.max());
    }

    #[test]
    fn test_zero_iterations_returns_input() {
        let v = instance();
        let initial = Allocation::new(vec![0, 1, 2, 0], 3).unwrap();
        let out = RandomBaselineSolver::new(Objective::SocialInequality, SolverParams::new(0, 0.0))
            .solve(&v, initial.clone(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out.allocation, initial);
        assert_eq!(out.status, Status::IterationLimitReached);
        assert!(out.trace.is_empty());
    }

    #[test]
    fn test_converges_when_threshold_is_loose() {
        let v = instance();
        let solver = RandomBaselineSolver::new(Objective::MaxEnvy, SolverParams::new(1000, 100.0));
        let out = solver
            .solve(&v, Allocation::all_to(0, 4, 3).unwrap(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out.status, Status::Converged);
        assert_eq!(out.iterations, 1);
    }
}
