//! Fair allocation of indivisible items
//!
//! Items are handed out among persons who each hold an additive valuation
//! over the items. Several criteria are supported:
//!
//! - minimise the largest pairwise envy
//! - minimise social inequality (spread of each person's view of all bundles)
//! - maximise Nash utility (product of own-bundle values)
//! - directed "mincov" assignment, steered by a person × item weighting
//!
//! The central bookkeeping structure is the [`BundleValueMatrix`]: entry
//! `(i, k)` is how much person `i` values the bundle held by person `k`.
//! Moving one item updates it in O(n), which is what keeps the iterative
//! solvers cheap.
//!
//! Allocations are 0-indexed internally. [`Allocation::from_one_based`] and
//! [`Allocation::to_one_based`] convert at the boundary.

pub mod allocation;
pub mod bundle;
pub mod config;
pub mod error;
pub mod matrix;
pub mod objective;
pub mod output;
pub mod solver;
pub mod valuation;

pub use allocation::Allocation;
pub use bundle::BundleValueMatrix;
pub use config::{ExperimentConfig, Instance, Method};
pub use error::{AllocError, ConfigError};
pub use matrix::Matrix;
pub use objective::{Direction, Objective};
pub use solver::{
    DirectedAssignmentSolver, RandomBaselineSolver, RandomSwapSolver, SolveOutcome, Solver,
    SolverParams, Status, Trace,
};
pub use valuation::{TargetVector, ValuationMatrix, ValueDistribution, WeightMatrix};
