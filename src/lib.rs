///! `dsparse` holds the distributed data structures a multifrontal
///! sparse direct solver is built on: a row-block distributed sparse
///! matrix ([`sparse_matrix::DistSparseMatrix`]), a row-block
///! distributed permutation map ([`map::DistMap`]), and the separator
///! tree nested dissection hands the numeric solver
///! ([`separator_tree::SeparatorTree`]). The multifrontal factorization
///! and triangular solves themselves live in the `dsparse-mf` crate,
///! which depends on this one.

pub mod call_stack;
pub mod comm;
pub mod config;
pub mod environment;
pub mod error;
pub mod local_csr;
pub mod map;
pub mod separator_tree;
pub mod sparse_matrix;
pub mod to_dense;

pub use error::{Result, SolverError};
pub use map::DistMap;
pub use separator_tree::{SeparatorNode, SeparatorTree};
pub use sparse_matrix::DistSparseMatrix;
