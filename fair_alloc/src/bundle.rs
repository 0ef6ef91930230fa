//! Bundle-value bookkeeping
//!
//! `BundleValueMatrix` holds, for every pair of persons `(i, k)`, the value
//! person `i` places on the bundle currently owned by person `k`. It is derived
//! entirely from a valuation matrix and an allocation, and is kept in sync with
//! the allocation by shifting a single item's valuation column whenever that
//! item changes hands.
//!
//! # Equivalence contract
//!
//! For any allocation `a` and any sequence of moves applied to it,
//! `BundleValueMatrix::build(v, &a_after)` and the matrix obtained by calling
//! [`BundleValueMatrix::apply_move`] once per move on `build(v, &a_before)`
//! agree entry for entry (exactly for integer-valued valuations, up to
//! floating-point rounding otherwise). The own-value vector mirrors the
//! diagonal under the same rule.

use crate::allocation::Allocation;
use crate::matrix::Matrix;
use crate::valuation::{TargetVector, ValuationMatrix};

#[derive(Debug, Clone, PartialEq)]
pub struct BundleValueMatrix {
    values: Matrix,
    own_values: Vec<f64>,
}

impl BundleValueMatrix {
    /// Full recomputation in O(n·m)
    pub fn build(valuations: &ValuationMatrix, allocation: &Allocation) -> Self {
        let n = valuations.persons();
        let mut values = Matrix::zeros(n, n);
        for (item, &owner) in allocation.owners().iter().enumerate() {
            for person in 0..n {
                values.add_to(person, owner, valuations.value(person, item));
            }
        }
        let own_values = (0..n).map(|i| values.get(i, i)).collect();
        BundleValueMatrix { values, own_values }
    }

    /// Incremental update in O(n) after `item` moved from `old_owner` to `new_owner`
    pub fn apply_move(
        &mut self,
        valuations: &ValuationMatrix,
        item: usize,
        old_owner: usize,
        new_owner: usize,
    ) {
        if old_owner == new_owner {
            return;
        }
        for person in 0..self.persons() {
            let value = valuations.value(person, item);
            self.values.add_to(person, old_owner, -value);
            self.values.add_to(person, new_owner, value);
        }
        self.own_values[old_owner] -= valuations.value(old_owner, item);
        self.own_values[new_owner] += valuations.value(new_owner, item);
    }

    /// Write the matrix that would result from a move into `scratch`, leaving `self` untouched
    pub fn preview_move(
        &self,
        valuations: &ValuationMatrix,
        item: usize,
        old_owner: usize,
        new_owner: usize,
        scratch: &mut BundleValueMatrix,
    ) {
        scratch.copy_from(self);
        scratch.apply_move(valuations, item, old_owner, new_owner);
    }

    /// Overwrite with the contents of `other`, reusing the existing buffers
    pub fn copy_from(&mut self, other: &BundleValueMatrix) {
        self.values.copy_from(&other.values);
        self.own_values.clone_from(&other.own_values);
    }

    /// Subtract each person's target from their own-bundle value
    pub fn shift_diagonal(&mut self, targets: &TargetVector) {
        for (person, &target) in targets.as_slice().iter().enumerate() {
            self.values.add_to(person, person, -target);
            self.own_values[person] -= target;
        }
    }

    pub fn persons(&self) -> usize {
        self.values.rows()
    }

    #[inline]
    pub fn get(&self, person: usize, bundle_owner: usize) -> f64 {
        self.values.get(person, bundle_owner)
    }

    pub fn row(&self, person: usize) -> &[f64] {
        self.values.row(person)
    }

    /// Value each person puts on their own bundle, maintained alongside the diagonal
    pub fn own_values(&self) -> &[f64] {
        &self.own_values
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.values
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.to_rows()
    }
}
