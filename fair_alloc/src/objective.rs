//! Objective functions over a bundle-value matrix
//!
//! All functions here are pure: they read a [`BundleValueMatrix`] and return a
//! score. Which way a score is "better" is described by [`Direction`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bundle::BundleValueMatrix;

/// Largest amount any person would gain, in their own valuation, by taking
/// someone else's bundle instead of their own. Never negative: the diagonal
/// contributes zero.
pub fn max_envy(bundles: &BundleValueMatrix) -> f64 {
    let n = bundles.persons();
    let mut worst = f64::NEG_INFINITY;
    for person in 0..n {
        let own = bundles.get(person, person);
        for &value in bundles.row(person) {
            worst = worst.max(value - own);
        }
    }
    worst
}

/// Per-person mean valuation across all current bundles, broadcast across each row
#[derive(Debug, Clone, PartialEq)]
pub struct AverageValues {
    row_means: Vec<f64>,
}

impl AverageValues {
    #[inline]
    pub fn get(&self, person: usize, _bundle_owner: usize) -> f64 {
        self.row_means[person]
    }

    pub fn row_means(&self) -> &[f64] {
        &self.row_means
    }
}

/// Row-wise mean of the bundle-value matrix
pub fn average_value(bundles: &BundleValueMatrix) -> AverageValues {
    let n = bundles.persons() as f64;
    AverageValues {
        row_means: (0..bundles.persons())
            .map(|person| bundles.row(person).iter().sum::<f64>() / n)
            .collect(),
    }
}

/// `(1/n²) Σ_i Σ_k (M[i][k] − Avg[i][k])²`
pub fn social_inequality(bundles: &BundleValueMatrix, average: &AverageValues) -> f64 {
    let n = bundles.persons();
    let mut total = 0.0;
    for person in 0..n {
        let mean = average.get(person, 0);
        total += bundles
            .row(person)
            .iter()
            .map(|&value| (value - mean).powi(2))
            .sum::<f64>();
    }
    total / (n * n) as f64
}

/// Product of each person's valuation of their own bundle, read off the diagonal
pub fn nash_utility(bundles: &BundleValueMatrix) -> f64 {
    (0..bundles.persons())
        .map(|person| bundles.get(person, person))
        .product()
}

/// Same product computed from a maintained own-value vector
pub fn nash_utility_from_own(own_values: &[f64]) -> f64 {
    own_values.iter().product()
}

/// Which way an objective improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Strict improvement; ties never count
    #[inline]
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }

    /// Whether `score` has reached the convergence threshold `eps` (inclusive)
    #[inline]
    pub fn reached(self, score: f64, eps: f64) -> bool {
        match self {
            Direction::Minimize => score <= eps,
            Direction::Maximize => score >= eps,
        }
    }
}

/// The scalar criteria a solver can optimise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    MaxEnvy,
    SocialInequality,
    NashUtility,
}

impl Objective {
    pub fn direction(self) -> Direction {
        match self {
            Objective::MaxEnvy | Objective::SocialInequality => Direction::Minimize,
            Objective::NashUtility => Direction::Maximize,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::MaxEnvy => write!(f, "max envy"),
            Objective::SocialInequality => write!(f, "social inequality"),
            Objective::NashUtility => write!(f, "Nash utility"),
        }
    }
}

/// An objective bound to the per-solve data it needs
///
/// Social inequality compares against the average matrix, which is fixed for
/// the duration of a solve (row sums of the bundle matrix do not change when
/// items move), so it is computed once here.
#[derive(Debug, Clone)]
pub struct Evaluator {
    objective: Objective,
    average: AverageValues,
}

impl Evaluator {
    pub fn new(objective: Objective, initial: &BundleValueMatrix) -> Self {
        Evaluator {
            objective,
            average: average_value(initial),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn direction(&self) -> Direction {
        self.objective.direction()
    }

    pub fn score(&self, bundles: &BundleValueMatrix) -> f64 {
        match self.objective {
            Objective::MaxEnvy => max_envy(bundles),
            Objective::SocialInequality => social_inequality(bundles, &self.average),
            Objective::NashUtility => nash_utility_from_own(bundles.own_values()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::Allocation;
    use crate::valuation::ValuationMatrix;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bundles(rows: Vec<Vec<f64>>, owners: Vec<usize>) -> BundleValueMatrix {
        let v = ValuationMatrix::new(rows).unwrap();
        let n = v.persons();
        BundleValueMatrix::build(&v, &Allocation::new(owners, n).unwrap())
    }

    #[test]
    fn test_max_envy_everything_to_one_person() {
        // Person 1 values item 0 at 10 but holds nothing
        let m = bundles(vec![vec![10.0, 0.0], vec![0.0, 10.0]], vec![0, 0]);
        assert_eq!(max_envy(&m), 10.0);
    }

    #[test]
    fn test_max_envy_zero_when_envy_free() {
        let m = bundles(vec![vec![10.0, 0.0], vec![0.0, 10.0]], vec![0, 1]);
        assert_eq!(max_envy(&m), 0.0);
    }

    #[test]
    fn test_max_envy_is_never_negative() {
        // Both persons strictly prefer their own bundle
        let m = bundles(vec![vec![5.0, 1.0], vec![1.0, 5.0]], vec![0, 1]);
        assert_eq!(max_envy(&m), 0.0);
    }

    #[test]
    fn test_average_value_is_row_mean() {
        let m = bundles(
            vec![vec![1.0, 2.0, 3.0], vec![6.0, 0.0, 0.0]],
            vec![0, 1, 1],
        );
        let avg = average_value(&m);
        assert_eq!(avg.row_means(), &[3.0, 3.0]);
        assert_eq!(avg.get(0, 1), 3.0);
    }

    #[test]
    fn test_social_inequality_hand_computed() {
        // Row 0: [1, 5] mean 3 -> 4 + 4; row 1: [6, 0] mean 3 -> 9 + 9
        let m = bundles(
            vec![vec![1.0, 2.0, 3.0], vec![6.0, 0.0, 0.0]],
            vec![0, 1, 1],
        );
        let avg = average_value(&m);
        assert_abs_diff_eq!(social_inequality(&m, &avg), 26.0 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_social_inequality_zero_iff_rows_constant() {
        let m = bundles(vec![vec![2.0, 2.0], vec![1.0, 1.0]], vec![0, 1]);
        let avg = average_value(&m);
        assert_eq!(social_inequality(&m, &avg), 0.0);

        let m = bundles(vec![vec![2.0, 3.0], vec![1.0, 1.0]], vec![0, 1]);
        let avg = average_value(&m);
        assert!(social_inequality(&m, &avg) > 0.0);
    }

    #[test]
    fn test_social_inequality_nonnegative_on_random_instances() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let n = rng.random_range(1..5);
            let items = rng.random_range(0..8);
            let rows: Vec<Vec<f64>> = (0..n)
                .map(|_| (0..items).map(|_| rng.random_range(0.0..5.0)).collect::<Vec<f64>>())
                .collect();
            let v = ValuationMatrix::new(rows).unwrap();
            let alloc = Allocation::random(items, n, &mut rng);
            let m = BundleValueMatrix::build(&v, &alloc);
            assert!(social_inequality(&m, &average_value(&m)) >= 0.0);
        }
    }

    #[test]
    fn test_nash_utility_diagonal_and_vector_agree() {
        let m = bundles(
            vec![vec![2.0, 1.0, 1.0], vec![1.0, 3.0, 4.0]],
            vec![0, 1, 1],
        );
        assert_eq!(nash_utility(&m), 2.0 * 7.0);
        assert_eq!(nash_utility_from_own(m.own_values()), nash_utility(&m));
    }

    #[test]
    fn test_nash_utility_zero_when_someone_has_nothing() {
        let m = bundles(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![0, 0]);
        assert_eq!(nash_utility(&m), 0.0);
    }

    #[test]
    fn test_direction_is_strict_and_threshold_inclusive() {
        assert!(Direction::Minimize.improves(1.0, 2.0));
        assert!(!Direction::Minimize.improves(2.0, 2.0));
        assert!(Direction::Maximize.improves(3.0, 2.0));
        assert!(!Direction::Maximize.improves(2.0, 2.0));

        assert!(Direction::Minimize.reached(0.0, 0.0));
        assert!(!Direction::Minimize.reached(0.1, 0.0));
        assert!(Direction::Maximize.reached(5.0, 5.0));
        assert!(!Direction::Maximize.reached(5.0, f64::INFINITY));
    }

    #[test]
    fn test_evaluator_matches_free_functions() {
        let m = bundles(
            vec![vec![1.0, 2.0, 3.0], vec![6.0, 0.0, 1.0]],
            vec![0, 1, 0],
        );
        let avg = average_value(&m);
        assert_eq!(Evaluator::new(Objective::MaxEnvy, &m).score(&m), max_envy(&m));
        assert_eq!(
            Evaluator::new(Objective::SocialInequality, &m).score(&m),
            social_inequality(&m, &avg)
        );
        assert_eq!(
            Evaluator::new(Objective::NashUtility, &m).score(&m),
            nash_utility(&m)
        );
    }
}
