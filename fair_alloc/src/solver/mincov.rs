//! Directed assignment ("mincov")
//!
//! Each iteration samples an item uniformly and hands it to the person that
//! minimises the weighted column sum
//!
//! `L[k] = Σ_i β[i][j] · M'[i][k]`
//!
//! where `M'` is the bundle-value matrix with item `j` taken out of its current
//! owner's column. The move is always committed. Ties go to the lowest person
//! index, so the current owner can be chosen again (a no-op move).
//!
//! With a target vector the loop runs on a matrix whose diagonal has been
//! shifted down by each person's target, and the inequality of the final
//! allocation without the shift is reported alongside.

use rand::Rng;

use super::{
    run_local_search, validate_allocation, Acceptance, Move, MoveProposer, SearchState,
    SolveOutcome, Solver, SolverParams, UntargetedReport,
};
use crate::allocation::Allocation;
use crate::bundle::BundleValueMatrix;
use crate::error::AllocError;
use crate::objective::{Evaluator, Objective};
use crate::valuation::{TargetVector, ValuationMatrix, WeightMatrix};

/// Picks the recipient with the smallest weighted column sum
#[derive(Debug, Clone)]
pub struct WeightedRecipient<'w> {
    weights: &'w WeightMatrix,
    column_sums: Vec<f64>,
}

impl<'w> WeightedRecipient<'w> {
    pub fn new(weights: &'w WeightMatrix) -> Self {
        WeightedRecipient {
            weights,
            column_sums: vec![0.0; weights.persons()],
        }
    }

    /// Weighted column sums for moving `item` out of `owner`'s bundle
    pub fn column_sums(
        &mut self,
        bundles: &BundleValueMatrix,
        valuations: &ValuationMatrix,
        item: usize,
        owner: usize,
    ) -> &[f64] {
        let persons = bundles.persons();
        self.column_sums.clear();
        self.column_sums.resize(persons, 0.0);
        for person in 0..persons {
            let beta = self.weights.weight(person, item);
            let row = bundles.row(person);
            for (recipient, sum) in self.column_sums.iter_mut().enumerate() {
                let mut value = row[recipient];
                if recipient == owner {
                    value -= valuations.value(person, item);
                }
                *sum += beta * value;
            }
        }
        &self.column_sums
    }

    /// Index of the smallest entry; first one wins on ties
    pub fn argmin(values: &[f64]) -> usize {
        let mut best = 0;
        for (index, &value) in values.iter().enumerate().skip(1) {
            if value < values[best] {
                best = index;
            }
        }
        best
    }
}

impl MoveProposer for WeightedRecipient<'_> {
    fn propose<R: Rng>(&mut self, state: &SearchState<'_>, rng: &mut R) -> Move {
        let item = rng.random_range(0..state.valuations.items());
        let from = state.allocation.owner(item);
        let sums = self.column_sums(&state.bundles, state.valuations, item, from);
        Move {
            item,
            from,
            to: Self::argmin(sums),
        }
    }
}

/// Social-inequality search driven by a person × item weighting
#[derive(Debug, Clone)]
pub struct DirectedAssignmentSolver {
    weights: WeightMatrix,
    target: Option<TargetVector>,
    params: SolverParams,
}

impl DirectedAssignmentSolver {
    pub fn new(weights: WeightMatrix, params: SolverParams) -> Self {
        DirectedAssignmentSolver {
            weights,
            target: None,
            params,
        }
    }

    /// Measure inequality against a diagonal shifted by `target`
    pub fn with_target(mut self, target: TargetVector) -> Self {
        self.target = Some(target);
        self
    }

    pub fn target(&self) -> Option<&TargetVector> {
        self.target.as_ref()
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }
}

impl Solver for DirectedAssignmentSolver {
    fn name(&self) -> &'static str {
        if self.target.is_some() {
            "mincov_target"
        } else {
            "mincov"
        }
    }

    fn solve<R: Rng>(
        &self,
        valuations: &ValuationMatrix,
        initial: Allocation,
        rng: &mut R,
    ) -> Result<SolveOutcome, AllocError> {
        validate_allocation(valuations, &initial)?;
        self.weights.check_shape(valuations)?;
        if let Some(target) = &self.target {
            target.check_shape(valuations)?;
        }
        tracing::debug!(
            solver = self.name(),
            persons = valuations.persons(),
            items = valuations.items(),
            max_iterations = self.params.max_iterations,
            "starting directed assignment"
        );

        let mut state = SearchState::new(valuations, initial);
        if let Some(target) = &self.target {
            state.bundles.shift_diagonal(target);
        }
        let evaluator = Evaluator::new(Objective::SocialInequality, &state.bundles);
        let result = run_local_search(
            &mut state,
            &mut WeightedRecipient::new(&self.weights),
            &evaluator,
            Acceptance::Unconditional,
            &self.params,
            rng,
        );

        let untargeted = self.target.as_ref().map(|_| {
            let bundle_values = BundleValueMatrix::build(valuations, &state.allocation);
            let objective =
                Evaluator::new(Objective::SocialInequality, &bundle_values).score(&bundle_values);
            UntargetedReport {
                objective,
                bundle_values,
            }
        });

        tracing::debug!(
            solver = self.name(),
            status = %result.status,
            iterations = result.iterations,
            objective = result.score,
            untargeted = untargeted.as_ref().map(|u| u.objective),
            "directed assignment finished"
        );

        Ok(SolveOutcome {
            allocation: state.allocation,
            objective: result.score,
            bundle_values: state.bundles,
            trace: result.trace,
            status: result.status,
            iterations: result.iterations,
            untargeted,
        })
    }
}
