//! A genuine multi-node elimination tree (two leaves, one root
//! separator), as opposed to the degenerate single-node tree the other
//! scenario tests use. Exercises the real extend-add path in
//! `factor::local_ldl` — a child's `work` (Schur complement) scattered
//! into the root's front/work via precomputed relative-index maps —
//! against a checked residual, not just a finiteness check.
//!
//! 5-point path graph (1D Laplacian, `N = 5`, diag `2`, off-diagonal
//! `-1`), nested-dissected by hand around the middle vertex: separator
//! `{2}` splits the path into `{0, 1}` and `{3, 4}`. Permuted ordering
//! places the two leaf blocks first, the separator last:
//! `inv_map = [0, 1, 3, 4, 2]` (permuted index -> original index).

mod common;

use dsparse::{DistMap, SeparatorNode, SeparatorTree};
use dsparse_mf::factor::local_ldl;
use dsparse_mf::front_tree::FrontTree;
use dsparse_mf::nodal_vector::{DistMultiVec, NodalMultiVec};
use dsparse_mf::solve::{backward_solve, forward_solve, Diagonal};

#[test]
fn two_leaf_one_root_tree_residual_within_tolerance() {
    let universe = mpi::initialize().expect("MPI environment required for dsparse-mf's solve pipeline");
    let world = universe.world();
    let config = dsparse::config::CommConfig::default();

    let n = 5usize;

    // original-index entries: a path graph 0-1-2-3-4.
    let entries: Vec<(usize, usize, f64)> =
        vec![(0, 0, 2.0), (0, 1, -1.0), (1, 1, 2.0), (1, 2, -1.0), (2, 2, 2.0), (2, 3, -1.0), (3, 3, 2.0), (3, 4, -1.0), (4, 4, 2.0)];
    let matrix = common::build_matrix(n, &entries, &world);

    // permuted -> original: leaf A {0,1} -> original {0,1}, leaf B {2,3}
    // -> original {3,4}, separator {4} -> original {2}.
    let mut inv_map = DistMap::identity(n, &world);
    inv_map.local_map_mut().copy_from_slice(&[0, 1, 3, 4, 2]);

    let leaf_a = SeparatorNode {
        off: 0,
        size: 2,
        original_lower_struct: vec![4], // original var 1 touches original var 2, permuted index 4
        parent: Some(2),
        children: None,
        team_size: 1,
    };
    let leaf_b = SeparatorNode {
        off: 2,
        size: 2,
        original_lower_struct: vec![4], // original var 3 touches original var 2, permuted index 4
        parent: Some(2),
        children: None,
        team_size: 1,
    };
    let root = SeparatorNode {
        off: 4,
        size: 1,
        original_lower_struct: vec![],
        parent: None,
        children: Some((0, 1)),
        team_size: 1,
    };
    let tree = SeparatorTree::new(vec![leaf_a, leaf_b, root], 2).unwrap();
    let info = dsparse_mf::symbolic::analyze(&tree, &world).unwrap();

    let front_tree = FrontTree::init(&matrix, &inv_map, &info, false, &world, &config).unwrap();
    let factored = local_ldl(&front_tree, &info, false, true, 1e-12).unwrap();

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
        let diff = x_hat.local_row(i)[0] - x_expected[i];
        num += diff * diff;
        den += x_expected[i] * x_expected[i];
    }
    let relative_residual = (num / den).sqrt();
    assert!(relative_residual <= 1e-12, "relative residual {relative_residual} too large");
}
