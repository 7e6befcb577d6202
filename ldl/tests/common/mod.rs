//! Shared scaffolding for the end-to-end scenario tests. Each scenario
//! runs single-process: `comm.size() == 1`, so the graph partitioner
//! nested dissection would normally hand work to (out of scope for this
//! crate) is replaced with a single degenerate separator covering every
//! variable — every node in the resulting tree is local, exercising the
//! full assembly/factor/solve pipeline without needing a real
//! partitioner.

use dsparse::{DistMap, DistSparseMatrix, SeparatorNode, SeparatorTree};
use dsparse_mf::field::Field;
use dsparse_mf::info::EliminationTreeInfo;
use mpi::traits::*;

pub fn single_node_tree(n: usize) -> SeparatorTree {
    let node = SeparatorNode {
        off: 0,
        size: n,
        original_lower_struct: Vec::new(),
        parent: None,
        children: None,
        team_size: 1,
    };
    SeparatorTree::new(vec![node], 0).expect("single-node tree is always valid")
}

pub fn analyze_single_node<C: Communicator>(n: usize, comm: &C) -> EliminationTreeInfo {
    let tree = single_node_tree(n);
    dsparse_mf::symbolic::analyze(&tree, comm).expect("single-node symbolic analysis cannot fail")
}

/// Build a `DistSparseMatrix` from a list of `(row, col, value)`
/// triplets, assembling both directions of every off-diagonal entry so
/// the matrix is stored as the structurally-symmetric object the rest
/// of the pipeline assumes.
pub fn build_matrix<C, F>(n: usize, entries: &[(usize, usize, F)], comm: &C) -> DistSparseMatrix<F>
where
    C: Communicator,
    F: Field,
{
    let mut matrix = DistSparseMatrix::<F>::new(n, comm);
    matrix.start_assembly();
    for &(i, j, v) in entries {
        matrix.update(i, j, v).unwrap();
        if i != j {
            matrix.update(j, i, v).unwrap();
        }
    }
    matrix.stop_assembly().unwrap();
    matrix
}

pub fn identity_map<C: Communicator>(n: usize, comm: &C) -> DistMap {
    DistMap::identity(n, comm)
}

/// A fixed, reproducible pseudo-random sequence in `(0.2, 1.2]` — used
/// in place of a `rand`-crate draw since this crate's dependency stack
/// has no RNG; deterministic but still decorrelated enough to exercise
/// a solve against a non-trivial right-hand side.
pub fn pseudo_random(i: usize) -> f64 {
    ((i.wrapping_mul(2654435761).wrapping_add(1)) % 1000) as f64 / 1000.0 + 0.2
}
