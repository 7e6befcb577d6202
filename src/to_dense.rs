///! Utilities for sparse-to-dense conversion, used by tests and by the
///! extend-add correctness property (Testable Property 5) to compare a
///! multifrontal assembly against the classical assembled frontal
///! matrix.

use crate::local_csr::LocalCsr;
use ndarray::{Array2, ArrayViewMut2};
use num_traits::Zero;

/// Assign a local CSR's rows into a dense matrix.
///
/// The dense matrix is not zeroed prior to assignment, so existing
/// values not corresponding to non-zeroes are preserved (matching the
/// additive extend-add use case, where a caller zeroes once and then
/// assigns several sparse pieces into the same dense buffer).
pub fn assign_to_dense<F: Clone>(mut array: ArrayViewMut2<F>, csr: &LocalCsr<F>) {
    assert_eq!(
        array.shape()[0],
        csr.n_local_rows(),
        "row count mismatch between dense target and local CSR"
    );
    assert_eq!(
        array.shape()[1],
        csr.n_cols(),
        "column count mismatch between dense target and local CSR"
    );
    for r in 0..csr.n_local_rows() {
        let (cols, vals) = csr.row(r);
        for (&c, v) in cols.iter().zip(vals.iter()) {
            array[[r, c]] = v.clone();
        }
    }
}

/// Convenience: materialize a fresh zeroed dense matrix from a local
/// CSR.
pub fn to_dense<F: Clone + Zero>(csr: &LocalCsr<F>) -> Array2<F> {
    let mut array = Array2::from_elem((csr.n_local_rows(), csr.n_cols()), F::zero());
    assign_to_dense(array.view_mut(), csr);
    array
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::local_csr::LocalTriplets;
    use ndarray::arr2;

    #[test]
    fn to_dense_matches_manual_layout() {
        let mut t = LocalTriplets::new(5, 5);
        // |0 0 3 4 0|
        // |0 0 0 2 5|
        // |0 0 5 0 0|
        // |0 8 0 0 0|
        // |0 0 0 7 0|
        t.push(0, 2, 3.0);
        t.push(0, 3, 4.0);
        t.push(1, 3, 2.0);
        t.push(1, 4, 5.0);
        t.push(2, 2, 5.0);
        t.push(3, 1, 8.0);
        t.push(4, 3, 7.0);

        let csr = t.into_csr();
        let dense = to_dense(&csr);
        let expected = arr2(&[
            [0., 0., 3., 4., 0.],
            [0., 0., 0., 2., 5.],
            [0., 0., 5., 0., 0.],
            [0., 8., 0., 0., 0.],
            [0., 0., 0., 7., 0.],
        ]);
        assert_eq!(dense, expected);
    }

    #[test]
    fn assign_to_dense_preserves_existing_values() {
        let mut t = LocalTriplets::new(2, 2);
        t.push(0, 0, 1.0);
        let csr = t.into_csr();

        let mut array = arr2(&[[0.0, 9.0], [9.0, 0.0]]);
        assign_to_dense(array.view_mut(), &csr);
        assert_eq!(array, arr2(&[[1.0, 9.0], [9.0, 0.0]]));
    }
}
