//! Assembly dedup: insert `(0,0,1), (0,0,2), (1,1,3)`; after
//! `StopAssembly`, expect entries `[(0,0,3), (1,1,3)]`. Exercised here
//! end to end through the public `DistSparseMatrix` API (the unit test
//! colocated with `sparse_matrix.rs` covers the same property against
//! a hand-built matrix; this is the black-box equivalent).

use dsparse::DistSparseMatrix;

#[test]
fn duplicate_updates_are_summed_on_stop_assembly() {
    let universe = mpi::initialize().expect("MPI environment required for dsparse's assembly API");
    let world = universe.world();

    let mut matrix = DistSparseMatrix::<f64>::new(2, &world);
    matrix.start_assembly();
    matrix.update(0, 0, 1.0).unwrap();
    matrix.update(0, 0, 2.0).unwrap();
    matrix.update(1, 1, 3.0).unwrap();
    matrix.stop_assembly().unwrap();

    let (cols0, vals0) = matrix.local_row(0);
    assert_eq!(cols0, &[0]);
    assert_eq!(vals0, &[3.0]);

    let (cols1, vals1) = matrix.local_row(1);
    assert_eq!(cols1, &[1]);
    assert_eq!(vals1, &[3.0]);
}
