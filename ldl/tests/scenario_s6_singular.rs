//! A diagonal matrix with one zero diagonal; factoring with
//! `checkIfSingular = true` must fail with `SingularMatrix`, naming
//! that index.

mod common;

use dsparse::error::SolverError;
use dsparse_mf::factor::local_ldl;
use dsparse_mf::front_tree::FrontTree;

#[test]
fn zero_pivot_is_reported_with_its_global_index() {
    let universe = mpi::initialize().expect("MPI environment required for dsparse-mf's factorization");
    let world = universe.world();
    let config = dsparse::config::CommConfig::default();

    let n = 4usize;
    let entries: Vec<(usize, usize, f64)> = vec![(0, 0, 2.0), (1, 1, 0.0), (2, 2, 5.0), (3, 3, 1.0)];
    let matrix = common::build_matrix(n, &entries, &world);
    let inv_map = common::identity_map(n, &world);
    let info = common::analyze_single_node(n, &world);

    let tree = FrontTree::init(&matrix, &inv_map, &info, false, &world, &config).unwrap();
    let err = local_ldl(&tree, &info, false, true, 1e-12).unwrap_err();

    match err {
        SolverError::SingularMatrix { global_index } => assert_eq!(global_index, 1),
        SolverError::Faulted { source, .. } => match *source {
            SolverError::SingularMatrix { global_index } => assert_eq!(global_index, 1),
            other => panic!("expected SingularMatrix, got {other:?}"),
        },
        other => panic!("expected SingularMatrix, got {other:?}"),
    }
}
