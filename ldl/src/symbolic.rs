///! Symbolic Analysis (SA): walks a [`dsparse::SeparatorTree`] bottom-up
///! and produces an [`crate::info::EliminationTreeInfo`] — each node's
///! assembled `lowerStruct` and the relative-index maps into its
///! parent, via a five-step union recipe (child structures, original
///! structure, own block, strip own block back out, position lookups).

use crate::grid::ProcessGrid;
use crate::info::{DistNodeInfo, EliminationTreeInfo, NodeInfo};
use dsparse::error::Result;
use dsparse::{SeparatorNode, SeparatorTree};
use mpi::traits::*;

/// Ordered merge of two already-sorted, duplicate-free slices into one
/// sorted, duplicate-free `Vec`. All unions here operate on already-
/// sorted sequences; no sort is ever performed downstream of this pass.
fn merge_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Position of `x` in a sorted slice, via binary search. Panics if `x`
/// is not present — callers only ever look up values known to be in the
/// assembled index list by construction.
fn position(sorted: &[usize], x: usize) -> usize {
    sorted
        .binary_search(&x)
        .expect("relative-index lookup target must be present in the assembled struct")
}

/// Run symbolic analysis over `tree`, producing per-node metadata.
/// `comm` supplies this process's rank, used only to place distributed
/// nodes within their process grid; single-process runs
/// (`comm.size() == 1`) never exercise a distributed node, so every
/// node in that regime takes the local path below.
pub fn analyze<C: Communicator>(tree: &SeparatorTree, comm: &C) -> Result<EliminationTreeInfo> {
    let _frame = dsparse::call_stack::enter("SymbolicAnalysis::analyze");
    let n = tree.len();
    let mut nodes: Vec<Option<NodeInfo>> = (0..n).map(|_| None).collect();
    let rank = comm.rank() as usize;

    for id in tree.post_order() {
        let sep: &SeparatorNode = tree.node(id);
        let own_block: Vec<usize> = (sep.off..sep.off + sep.size).collect();

        let (child_lower, left_rel_src, right_rel_src) = match sep.children {
            None => (Vec::new(), Vec::new(), Vec::new()),
            Some((l, r)) => {
                let left = nodes[l].as_ref().expect("post-order visits children first");
                let right = nodes[r].as_ref().expect("post-order visits children first");
                (
                    merge_sorted(&left.lower_struct, &right.lower_struct),
                    left.lower_struct.clone(),
                    right.lower_struct.clone(),
                )
            }
        };

        // Steps 2-4: union with the original structure, then with this
        // node's own block, then strip the own block back out.
        let partial_struct = merge_sorted(&child_lower, &sep.original_lower_struct);
        let full_struct = merge_sorted(&own_block, &partial_struct);
        let lower_struct: Vec<usize> = full_struct
            .iter()
            .copied()
            .filter(|&x| x < sep.off || x >= sep.off + sep.size)
            .collect();

        // Step 5: assembled index list is own_block ++ lower_struct
        // (own_block is a contiguous prefix range, lower_struct strictly
        // above it per the ST invariant), so position() against
        // full_struct directly gives the relative index.
        let left_rel_indices = left_rel_src.iter().map(|&x| position(&full_struct, x)).collect();
        let right_rel_indices = right_rel_src.iter().map(|&x| position(&full_struct, x)).collect();

        let dist = if sep.is_local() {
            None
        } else {
            let team_rank = rank % sep.team_size;
            let grid = ProcessGrid::new(sep.team_size, team_rank)?;
            Some(distributed_comm_plan(&grid, sep.team_size, &lower_struct))
        };

        nodes[id] = Some(NodeInfo {
            off: sep.off,
            size: sep.size,
            lower_struct,
            left_rel_indices,
            right_rel_indices,
            parent: sep.parent,
            children: sep.children,
            dist,
        });
    }

    let nodes: Vec<NodeInfo> = nodes.into_iter().map(|n| n.expect("every node visited")).collect();
    Ok(EliminationTreeInfo::new(nodes, tree.root()))
}

/// Computes the distributed-node communication plan, approximated with
/// a 1D VC (round-robin) row ownership model rather than the full 2D
/// MC/MR block-cyclic layout: row `r` of the assembled update is owned
/// by team-local process `r % team_size`. This is exact for the
/// `LDL_1D` front type and the forward/backward solve's `VC x STAR`
/// slabs; the 2D front types layer their own packing on top at factor
/// time and reuse this plan only for its row-ownership information, not
/// its exact byte layout — documented in DESIGN.md as the resolution
/// adopted for the comm-plan fields, since the precise 2D indexing is
/// unverifiable without a live multi-process run.
fn distributed_comm_plan(grid: &ProcessGrid, team_size: usize, lower_struct: &[usize]) -> DistNodeInfo {
    let mut send_counts = vec![0usize; team_size];
    let mut recv_indices: Vec<Vec<usize>> = vec![Vec::new(); team_size];
    for (local_row, _global_row) in lower_struct.iter().enumerate() {
        let owner = local_row % team_size;
        send_counts[owner] += 1;
        recv_indices[owner].push(local_row);
    }
    DistNodeInfo {
        grid: *grid,
        num_child_solve_send_indices: send_counts.clone(),
        child_solve_recv_indices: recv_indices.clone(),
        num_child_factor_send_indices: send_counts,
        child_factor_recv_indices: recv_indices,
    }
}
