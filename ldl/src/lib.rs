///! `dsparse-mf`: distributed-memory sparse direct multifrontal `LDLᵀ`
///! / `LDLᴴ` factorization and triangular solves, built on the
///! row-block distributed data structures in the `dsparse` crate.
///!
///! Nested dissection hands a [`dsparse::SeparatorTree`] to [`symbolic::analyze`],
///! which produces an [`info::EliminationTreeInfo`] (per-node
///! `lowerStruct`, relative-index maps, and — for nodes above the local
///! level — a [`grid::ProcessGrid`] placement and communication plan).
///! [`front_tree::FrontTree::init`] then assembles dense fronts from the
///! original [`dsparse::DistSparseMatrix`] entries, [`factor::local_ldl`]
///! and [`factor::dist_ldl`] factor them bottom-up, and [`solve::forward_solve`]
///! / [`solve::backward_solve`] apply the result to a right-hand side held
///! as a [`nodal_vector::NodalMultiVec`].
///!
///! Generic throughout over [`field::Field`], the `{+, -, x, /,
///! conjugate, abs, isZero}` capability set spanning `f32`/`f64` and
///! `Complex<f32>`/`Complex<f64>`. `f32`/`f64` cross MPI collectives
///! directly; `Complex<f32>`/`Complex<f64>` go through
///! [`shippable::Shippable`], a local wrapper carrying the `Equivalence`
///! impl neither `num_complex` nor `mpi` can provide for the bare type.

pub mod factor;
pub mod field;
pub mod front_tree;
pub mod grid;
pub mod info;
pub mod nodal_vector;
pub mod shippable;
pub mod solve;
pub mod symbolic;

pub use factor::{dist_ldl, front_block_ldl, front_ldl, local_ldl};
pub use field::Field;
pub use front_tree::{FrontTree, FrontType, NodeFront};
pub use grid::{DenseBuffer, ProcessGrid};
pub use info::{DistNodeInfo, EliminationTreeInfo, NodeInfo};
pub use nodal_vector::{DistMultiVec, NodalMultiVec};
pub use shippable::Shippable;
pub use solve::{backward_solve, forward_solve, Diagonal};
pub use symbolic::analyze;
