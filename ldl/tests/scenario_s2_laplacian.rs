//! 1D Laplacian, `N = 1024`, real `f64`, tridiagonal `[-1, 2, -1]`.
//! Single-process, single-node tree (see `common::single_node_tree` for
//! why this substitutes for the out-of-scope external partitioner's
//! analytic nested dissection). Residual must be `<= 1e-12`.

mod common;

use dsparse_mf::factor::local_ldl;
use dsparse_mf::front_tree::FrontTree;
use dsparse_mf::nodal_vector::{DistMultiVec, NodalMultiVec};
use dsparse_mf::solve::{backward_solve, forward_solve, Diagonal};

#[test]
fn laplacian_1024_residual_within_tolerance() {
    let universe = mpi::initialize().expect("MPI environment required for dsparse-mf's solve pipeline");
    let world = universe.world();
    let config = dsparse::config::CommConfig::default();

    let n = 1024usize;
    let mut entries = Vec::with_capacity(n + n - 1);
    for i in 0..n {
        entries.push((i, i, 2.0f64));
        if i + 1 < n {
            entries.push((i, i + 1, -1.0f64));
        }
    }
    let matrix = common::build_matrix(n, &entries, &world);
    let inv_map = common::identity_map(n, &world);
    let info = common::analyze_single_node(n, &world);

    let tree = FrontTree::init(&matrix, &inv_map, &info, false, &world, &config).unwrap();
    let factored = local_ldl(&tree, &info, false, true, 1e-12).unwrap();

    let x_expected: Vec<f64> = (0..n).map(common::pseudo_random).collect();
    let mut b = DistMultiVec::<f64>::zeros(n, 1, &world);
    for i in 0..n {
        let mut v = 2.0 * x_expected[i];
        if i > 0 {
            v -= x_expected[i - 1];
        }
        if i + 1 < n {
            v -= x_expected[i + 1];
        }
        b.local_row_mut(i)[0] = v;
    }

    let mut rhs = NodalMultiVec::<f64>::zeros_like(&factored, 1);
    rhs.pull(&inv_map, &info, &b, &world, &config).unwrap();

    forward_solve(&factored, &info, &mut rhs, 1, Diagonal::Full).unwrap();
    backward_solve(&factored, &info, &mut rhs, 1, Diagonal::Full).unwrap();

    let mut x_hat = DistMultiVec::<f64>::zeros(n, 1, &world);
    rhs.push(&inv_map, &info, &mut x_hat, &world, &config).unwrap();

    let mut num = 0.0f64;
    let mut den = 0.0f64;
    for i in 0..n {
        let d = x_hat.local_row(i)[0] - x_expected[i];
        num += d * d;
        den += x_expected[i] * x_expected[i];
    }
    let relative_residual = (num / den).sqrt();
    assert!(relative_residual <= 1e-12, "relative residual {relative_residual} too large");
}
