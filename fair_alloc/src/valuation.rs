//! Problem inputs: valuations, recipient weights and per-person targets
//!
//! All three are validated once on construction and are read-only for the
//! duration of a solve.

use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::AllocError;
use crate::matrix::Matrix;

/// Additive valuations: row `i`, column `j` is the value person `i` puts on item `j`
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationMatrix {
    values: Matrix,
}

impl ValuationMatrix {
    /// Build from one row per person. Values must be finite and nonnegative.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AllocError> {
        Self::from_matrix(Matrix::from_rows(&rows)?)
    }

    pub fn from_matrix(values: Matrix) -> Result<Self, AllocError> {
        if values.rows() == 0 {
            return Err(AllocError::NoPersons);
        }
        for person in 0..values.rows() {
            for item in 0..values.cols() {
                let value = values.get(person, item);
                if !value.is_finite() || value < 0.0 {
                    return Err(AllocError::InvalidValuation {
                        person,
                        item,
                        value,
                    });
                }
            }
        }
        Ok(ValuationMatrix { values })
    }

    /// Draw a `persons` x `items` instance with i.i.d. entries from `distribution`
    pub fn sample<R: Rng>(
        persons: usize,
        items: usize,
        distribution: &ValueDistribution,
        rng: &mut R,
    ) -> Result<Self, AllocError> {
        let values = match *distribution {
            ValueDistribution::Uniform { low, high } => {
                if low < 0.0 {
                    return Err(AllocError::InvalidDistribution(format!(
                        "uniform lower bound must be nonnegative (got {low})"
                    )));
                }
                let dist = Uniform::new(low, high)
                    .map_err(|e| AllocError::InvalidDistribution(e.to_string()))?;
                draw_matrix(persons, items, &dist, rng)
            }
            ValueDistribution::Exponential { rate } => {
                let dist =
                    Exp::new(rate).map_err(|e| AllocError::InvalidDistribution(e.to_string()))?;
                draw_matrix(persons, items, &dist, rng)
            }
            ValueDistribution::Gamma { shape, scale } => {
                let dist = Gamma::new(shape, scale)
                    .map_err(|e| AllocError::InvalidDistribution(e.to_string()))?;
                draw_matrix(persons, items, &dist, rng)
            }
            ValueDistribution::LogNormal { mu, sigma } => {
                let dist = LogNormal::new(mu, sigma)
                    .map_err(|e| AllocError::InvalidDistribution(e.to_string()))?;
                draw_matrix(persons, items, &dist, rng)
            }
        };

        Self::from_matrix(values)
    }

    /// Number of persons (n)
    pub fn persons(&self) -> usize {
        self.values.rows()
    }

    /// Number of items (m)
    pub fn items(&self) -> usize {
        self.values.cols()
    }

    #[inline]
    pub fn value(&self, person: usize, item: usize) -> f64 {
        self.values.get(person, item)
    }

    /// Sum of all valuations; an upper bound on max envy for any allocation
    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Total value person `person` puts on the whole item set
    pub fn person_total(&self, person: usize) -> f64 {
        self.values.row(person).iter().sum()
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.values
    }
}

fn draw_matrix<D: Distribution<f64>, R: Rng>(
    persons: usize,
    items: usize,
    dist: &D,
    rng: &mut R,
) -> Matrix {
    let mut values = Matrix::zeros(persons, items);
    for person in 0..persons {
        for item in 0..items {
            values.set(person, item, dist.sample(rng));
        }
    }
    values
}

/// Per-person-per-item multipliers used to pick recipients in the directed solver
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    weights: Matrix,
}

impl WeightMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AllocError> {
        Self::from_matrix(Matrix::from_rows(&rows)?)
    }

    pub fn from_matrix(weights: Matrix) -> Result<Self, AllocError> {
        for person in 0..weights.rows() {
            for item in 0..weights.cols() {
                let value = weights.get(person, item);
                if !value.is_finite() {
                    return Err(AllocError::InvalidWeight {
                        person,
                        item,
                        value,
                    });
                }
            }
        }
        Ok(WeightMatrix { weights })
    }

    /// Every person weighted equally for every item
    pub fn uniform(persons: usize, items: usize) -> Self {
        WeightMatrix {
            weights: Matrix::filled(persons, items, 1.0),
        }
    }

    pub fn persons(&self) -> usize {
        self.weights.rows()
    }

    pub fn items(&self) -> usize {
        self.weights.cols()
    }

    #[inline]
    pub fn weight(&self, person: usize, item: usize) -> f64 {
        self.weights.get(person, item)
    }

    /// Fails unless the weights have the same shape as `valuations`
    pub fn check_shape(&self, valuations: &ValuationMatrix) -> Result<(), AllocError> {
        if self.persons() != valuations.persons() {
            return Err(AllocError::DimensionMismatch {
                what: "weight matrix rows",
                expected: valuations.persons(),
                found: self.persons(),
            });
        }
        if self.items() != valuations.items() {
            return Err(AllocError::DimensionMismatch {
                what: "weight matrix columns",
                expected: valuations.items(),
                found: self.items(),
            });
        }
        Ok(())
    }
}

/// Desired per-person entitlement, subtracted from own-bundle values
#[derive(Debug, Clone, PartialEq)]
pub struct TargetVector {
    targets: Vec<f64>,
}

impl TargetVector {
    pub fn new(targets: Vec<f64>) -> Result<Self, AllocError> {
        if let Some((person, &value)) = targets.iter().enumerate().find(|(_, t)| !t.is_finite()) {
            return Err(AllocError::InvalidTarget { person, value });
        }
        Ok(TargetVector { targets })
    }

    /// Equal split of each person's total valuation: `total_i / n`
    pub fn proportional(valuations: &ValuationMatrix) -> Self {
        let n = valuations.persons() as f64;
        TargetVector {
            targets: (0..valuations.persons())
                .map(|i| valuations.person_total(i) / n)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.targets
    }

    pub fn check_shape(&self, valuations: &ValuationMatrix) -> Result<(), AllocError> {
        if self.len() != valuations.persons() {
            return Err(AllocError::DimensionMismatch {
                what: "target vector length",
                expected: valuations.persons(),
                found: self.len(),
            });
        }
        Ok(())
    }
}

/// Distribution used to generate random valuation instances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueDistribution {
    Uniform { low: f64, high: f64 },
    Exponential { rate: f64 },
    Gamma { shape: f64, scale: f64 },
    LogNormal { mu: f64, sigma: f64 },
}

impl Default for ValueDistribution {
    fn default() -> Self {
        ValueDistribution::Uniform {
            low: 0.0,
            high: 1.0,
        }
    }
}
