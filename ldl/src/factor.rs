///! Numeric Factorization (NF): extend-add a node's children into its
///! front, then run a partial `LDLᵀ`/`LDLᴴ` factorization on it, leaving
///! the Schur complement in `work` for the parent to consume. `local_ldl`
///! walks the local (single-process) nodes bottom-up; `dist_ldl` drives
///! the distributed levels above them.

use crate::field::Field;
use crate::front_tree::{FrontTree, FrontType};
use crate::grid::{local_gemm, make_trapezoidal_lower, transpose_or_adjoint, triangular_inverse, DenseBuffer};
use crate::info::EliminationTreeInfo;
use dsparse::comm::{sparse_all_to_all, Equivalence};
use dsparse::config::CommConfig;
use dsparse::error::{Result, SolverError};
use mpi::traits::*;
use num_traits::{One, Zero};

/// Wire payload for the distributed extend-add exchange in [`dist_ldl`]:
/// a `(row, col, value)` triple of one child update-matrix entry, routed
/// to the parent-team process that owns `row`. A named `#[repr(C)]`
/// struct rather than a tuple — `mpi` has no blanket `Equivalence` impl
/// for tuples, so anything shipped through [`sparse_all_to_all`] needs
/// its own derived datatype.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Equivalence)]
struct UpdateEntry<F> {
    row: usize,
    col: usize,
    value: F,
}

/// Extend-add one child's update matrix into the parent's front/work,
/// via the child's precomputed relative-index map: a row/col pair whose
/// relative indices are both `>= parent.size` lands in `parent.work`;
/// otherwise it lands in
/// `parent.front` (possibly in the `L21` rows, when the row maps above
/// `size` but the column maps below it).
fn extend_add<F: Field>(
    parent_front: &mut DenseBuffer<F>,
    parent_work: &mut DenseBuffer<F>,
    parent_size: usize,
    child_work: &DenseBuffer<F>,
    rel_indices: &[usize],
) {
    let (n, _) = child_work.shape();
    for i in 0..n {
        let pi = rel_indices[i];
        for j in 0..n {
            let pj = rel_indices[j];
            let v = child_work.get(i, j);
            if pi >= parent_size && pj >= parent_size {
                parent_work.add_at(pi - parent_size, pj - parent_size, v);
            } else if pj < parent_size {
                parent_front.add_at(pi, pj, v);
            }
            // pj >= parent_size && pi < parent_size: this is the
            // transpose of an entry already handled by the pj < size
            // branch on the symmetric pair (j, i); structurally
            // symmetric fronts never populate this combination
            // directly: the front only stores its lower triangle.
        }
    }
}

/// Plain (non-blocked) partial `LDL` on one front: factor the top
/// `size x size` block in place (`L` strictly below the diagonal, `D`
/// on it), propagate the `L21` panel into the remaining front rows, and
/// accumulate the Schur-complement update into `work` ("FrontLDL").
pub fn front_ldl<F: Field>(
    front: &mut DenseBuffer<F>,
    work: &mut DenseBuffer<F>,
    off: usize,
    is_hermitian: bool,
    check_if_singular: bool,
    tol: F::Real,
) -> Result<()> {
    let (front_order, size) = front.shape();
    let (lower_len, _) = work.shape();
    debug_assert_eq!(front_order, size + lower_len);

    for k in 0..size {
        let pivot = front.get(k, k);
        if check_if_singular && pivot.is_near_zero(tol) {
            return Err(SolverError::SingularMatrix { global_index: off + k }.with_call_stack());
        }
        for i in (k + 1)..front_order {
            let v = front.get(i, k) / pivot;
            front.set(i, k, v);
        }
        for j in (k + 1)..size {
            let ljk = front.get(j, k);
            let ljk = if is_hermitian { ljk.conj() } else { ljk };
            if ljk == F::zero() {
                continue;
            }
            let factor = ljk * pivot;
            for i in j..front_order {
                let lik = front.get(i, k);
                let updated = front.get(i, j) - lik * factor;
                front.set(i, j, updated);
            }
        }
        for jc in 0..lower_len {
            let j = size + jc;
            let ljk = front.get(j, k);
            let ljk = if is_hermitian { ljk.conj() } else { ljk };
            if ljk == F::zero() {
                continue;
            }
            let factor = ljk * pivot;
            for ic in jc..lower_len {
                let i = size + ic;
                let lik = front.get(i, k);
                let updated = work.get(ic, jc) - lik * factor;
                work.set(ic, jc, updated);
            }
        }
    }
    Ok(())
}

/// `FrontBlockLDL`: runs [`front_ldl`], then replaces the top block with
/// its own inverse, `(L D Lᴴ)⁻¹ = L⁻ᴴ D⁻¹ L⁻¹`, so that later solves
/// reduce to a single `GEMM` against the unchanged `L21` panel.
/// Computed as `TriangularInverse`, a diagonal scale
/// (`Trdtrmm`), the product's lower triangle, then its upper triangle
/// reconstructed by `Transpose`/`Adjoint` rather than recomputed —
/// guarantees exact (anti-)symmetry regardless of rounding.
pub fn front_block_ldl<F: Field>(
    front: &mut DenseBuffer<F>,
    work: &mut DenseBuffer<F>,
    off: usize,
    is_hermitian: bool,
    check_if_singular: bool,
    tol: F::Real,
) -> Result<()> {
    front_ldl(front, work, off, is_hermitian, check_if_singular, tol)?;

    let (_front_order, size) = front.shape();
    let mut l = DenseBuffer::<F>::zeros(size, size);
    let mut d_inv = vec![F::zero(); size];
    for i in 0..size {
        l.set(i, i, F::one());
        d_inv[i] = F::one() / front.get(i, i);
        for j in 0..i {
            l.set(i, j, front.get(i, j));
        }
    }

    let l_inv = triangular_inverse(&l);

    let mut scaled = DenseBuffer::<F>::zeros(size, size);
    for i in 0..size {
        for j in 0..=i {
            scaled.set(i, j, l_inv.get(i, j) * d_inv[i]);
        }
    }

    let mut l_inv_t = DenseBuffer::<F>::zeros(size, size);
    transpose_or_adjoint(l_inv.view(), &mut l_inv_t.view_mut(), is_hermitian);

    let mut product = DenseBuffer::<F>::zeros(size, size);
    local_gemm(l_inv_t.view(), scaled.view(), &mut product.view_mut(), false);
    {
        let mut view = product.view_mut();
        make_trapezoidal_lower(&mut view);
    }

    let mut upper = DenseBuffer::<F>::zeros(size, size);
    transpose_or_adjoint(product.view(), &mut upper.view_mut(), is_hermitian);

    for i in 0..size {
        for j in 0..size {
            let v = if j <= i { product.get(i, j) } else { upper.get(i, j) };
            front.set(i, j, v);
        }
    }
    Ok(())
}

/// Local phase of numeric factorization: traverse the
/// local (single-process) nodes leaves-first, extend-adding each
/// child's `work` into the parent, then factoring the parent front.
pub fn local_ldl<F: Field>(
    tree: &FrontTree<F>,
    info: &EliminationTreeInfo,
    block_ldl: bool,
    check_if_singular: bool,
    tol: F::Real,
) -> Result<FrontTree<F>>
where
    F: Equivalence,
{
    let _frame = dsparse::call_stack::enter("NumericFactorization::local_ldl");
    let mut tree = clone_front_tree(tree);
    let is_hermitian = tree.is_hermitian;
    for id in info.post_order() {
        let node = info.node(id);
        if !node.is_local() {
            continue;
        }
        if let Some((l, r)) = node.children {
            for (child_id, rel) in [(l, &node.left_rel_indices), (r, &node.right_rel_indices)] {
                if !info.node(child_id).is_local() {
                    continue;
                }
                let child_work = clone_buffer(&tree.node(child_id).work);
                let nf = tree.node_mut(id);
                extend_add(&mut nf.front, &mut nf.work, node.size, &child_work, rel);
            }
        }
        let nf = tree.node_mut(id);
        if block_ldl {
            front_block_ldl(&mut nf.front, &mut nf.work, node.off, is_hermitian, check_if_singular, tol)?;
            nf.set_front_type(FrontType::Ldl2d)?;
            nf.set_front_type(FrontType::BlockLdl2d)?;
        } else {
            front_ldl(&mut nf.front, &mut nf.work, node.off, is_hermitian, check_if_singular, tol)?;
            nf.set_front_type(FrontType::Ldl1d)?;
        }
    }
    Ok(tree)
}

/// Distributed phase (`DistLDL`): for each distributed
/// level, pack the child team's update into the parent's front via the
/// 1D VC comm plan [`crate::symbolic::analyze`] computed, all-to-all
/// it, unpack additively, then run the same [`front_ldl`] kernel on the
/// (locally-owned rows of the) parent front.
pub fn dist_ldl<F, C>(
    tree: &mut FrontTree<F>,
    info: &EliminationTreeInfo,
    comm: &C,
    config: &CommConfig,
    check_if_singular: bool,
    tol: F::Real,
) -> Result<()>
where
    F: Field + Equivalence,
    C: Communicator,
{
    let _frame = dsparse::call_stack::enter("NumericFactorization::dist_ldl");
    for id in info.distributed_post_order() {
        let node = info.node(id);
        let dist = node.dist.as_ref().expect("distributed_post_order only yields distributed nodes");
        let team_size = dist.grid.team_size();

        if let Some((l, r)) = node.children {
            for (child_id, rel) in [(l, &info.node(id).left_rel_indices), (r, &info.node(id).right_rel_indices)] {
                let mut send_counts = vec![0i32; team_size];
                let mut payload: Vec<UpdateEntry<F>> = Vec::new();
                {
                    let child_work = &tree.node(child_id).work;
                    let (n, _) = child_work.shape();
                    for i in 0..n {
                        let pi = rel[i];
                        for j in 0..n {
                            let pj = rel[j];
                            let value = child_work.get(i, j);
                            let dest = pi % team_size;
                            send_counts[dest] += 1;
                            payload.push(UpdateEntry { row: pi, col: pj, value });
                        }
                    }
                }
                payload.sort_by_key(|e| e.row % team_size);
                let (recv, _) = sparse_all_to_all(comm, config, &payload, &send_counts)?;
                let node_front = tree.node_mut(id);
                for entry in recv {
                    let (pi, pj, v) = (entry.row, entry.col, entry.value);
                    if pi >= node.size && pj >= node.size {
                        node_front.work.add_at(pi - node.size, pj - node.size, v);
                    } else if pj < node.size {
                        node_front.front.add_at(pi, pj, v);
                    }
                }
            }
        }

        let nf = tree.node_mut(id);
        front_ldl(&mut nf.front, &mut nf.work, node.off, tree.is_hermitian, check_if_singular, tol)?;
        nf.set_front_type(FrontType::Ldl1d)?;
    }
    Ok(())
}

fn clone_buffer<F: Field>(buf: &DenseBuffer<F>) -> DenseBuffer<F> {
    let (r, c) = buf.shape();
    let mut out = DenseBuffer::zeros(r, c);
    for i in 0..r {
        for j in 0..c {
            out.set(i, j, buf.get(i, j));
        }
    }
    out
}

fn clone_front_tree<F: Field>(tree: &FrontTree<F>) -> FrontTree<F>
where
    F: Equivalence,
{
    let mut nodes = Vec::with_capacity(tree.len());
    for id in 0..tree.len() {
        let nf = tree.node(id);
        nodes.push(crate::front_tree::NodeFront {
            front: clone_buffer(&nf.front),
            work: clone_buffer(&nf.work),
            front_type: nf.front_type,
        });
    }
    FrontTree::from_nodes(nodes, tree.is_hermitian)
}
