///! Front Tree (FT): numeric storage attached to elimination-tree
///! metadata. Each node owns a dense `front` (the top `size` columns:
///! `L11`/`D1` on and above the diagonal block, `L21` below it) and a
///! scratch `work` (the update/Schur-complement matrix the parent
///! consumes), tagged with a [`FrontType`] recording which layout and
///! factorization variant currently populates them — a monotonic
///! `frontType` invariant enforced by [`NodeFront::set_front_type`].

use crate::field::Field;
use crate::grid::DenseBuffer;
use crate::info::EliminationTreeInfo;
use dsparse::comm::{sparse_all_to_all, Equivalence};
use dsparse::config::CommConfig;
use dsparse::error::{Result, SolverError};
use dsparse::{DistMap, DistSparseMatrix};
use mpi::traits::*;

/// Wire payload for the row-fetch exchange in [`FrontTree::init`]: a
/// `(column, value)` pair. A named, `#[repr(C)]` struct rather than a
/// tuple, since `mpi` has no blanket `Equivalence` impl for Rust tuples
/// (no stable layout to derive a datatype from) — every type that
/// crosses [`sparse_all_to_all`] needs its own derived datatype.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Equivalence)]
struct ColValue<F> {
    col: usize,
    value: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontType {
    Init,
    Ldl1d,
    Ldl2d,
    LdlSelInv1d,
    LdlSelInv2d,
    BlockLdl2d,
}

impl FrontType {
    /// The four layouts a triangular solve implements; plain `Ldl2d`
    /// is an intermediate state only, not itself
    /// solve-ready — it must first become `LdlSelInv2d` or
    /// `BlockLdl2d`.
    pub fn is_solve_supported(self) -> bool {
        matches!(
            self,
            FrontType::Ldl1d | FrontType::LdlSelInv1d | FrontType::LdlSelInv2d | FrontType::BlockLdl2d
        )
    }
}

fn valid_transition(from: FrontType, to: FrontType) -> bool {
    use FrontType::*;
    matches!(
        (from, to),
        (Init, Ldl1d) | (Init, Ldl2d) | (Ldl1d, LdlSelInv1d) | (Ldl2d, LdlSelInv2d) | (Ldl2d, BlockLdl2d)
    )
}

/// One node's numeric storage. `front` is `front_order x size` (`size`
/// columns: the assembled diagonal block stacked on the `L21` panel);
/// `work` is `lower_len x lower_len`, the update matrix this node's
/// factorization leaves for its parent to extend-add.
pub struct NodeFront<F> {
    pub front: DenseBuffer<F>,
    pub work: DenseBuffer<F>,
    pub front_type: FrontType,
}

impl<F: Field> NodeFront<F> {
    pub fn set_front_type(&mut self, to: FrontType) -> Result<()> {
        if !valid_transition(self.front_type, to) {
            return Err(SolverError::UnsupportedMode(format!(
                "invalid frontType transition {:?} -> {:?}",
                self.front_type, to
            )));
        }
        self.front_type = to;
        Ok(())
    }
}

pub struct FrontTree<F> {
    nodes: Vec<NodeFront<F>>,
    pub is_hermitian: bool,
}

impl<F: Field + Equivalence> FrontTree<F> {
    pub fn from_nodes(nodes: Vec<NodeFront<F>>, is_hermitian: bool) -> Self {
        FrontTree { nodes, is_hermitian }
    }

    pub fn node(&self, id: usize) -> &NodeFront<F> {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut NodeFront<F> {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Which front-local rows of `node` this process owns: all of them
    /// for a local node, the `% team_size == team_rank` subset for a
    /// distributed one (the 1D VC approximation, also used by
    /// [`crate::symbolic::analyze`]'s comm-plan construction).
    fn owned_rows(info: &EliminationTreeInfo, id: usize, comm_rank: usize) -> Vec<usize> {
        let node = info.node(id);
        let front_order = node.front_order();
        match &node.dist {
            None => (0..front_order).collect(),
            Some(d) => {
                let team_size = d.grid.team_size();
                let team_rank = comm_rank % team_size;
                (0..front_order).filter(|r| r % team_size == team_rank).collect()
            }
        }
    }

    /// Populate every front's `L11`/`L21` slots from the
    /// assembled sparse matrix, via the permuted-to-original index map
    /// `inv_map`. Implemented as a three-phase exchange mirroring
    /// [`DistMap::translate`]'s request/reply idiom: (1) request the
    /// original rows each locally-owned front row needs, (2) owners
    /// reply with each requested row's entry count, (3) owners ship the
    /// flattened `(col, value)` pairs; originating columns are then
    /// translated back to permuted indices via the forward map
    /// (`inv_map.form_inverse()`) and placed if they fall within this
    /// node's own `[off, off+size)` block — entries outside it belong
    /// to a different node's front and arrive there via extend-add
    /// during factorization, not here.
    pub fn init<C: Communicator>(
        matrix: &DistSparseMatrix<F>,
        inv_map: &DistMap,
        info: &EliminationTreeInfo,
        is_hermitian: bool,
        comm: &C,
        config: &CommConfig,
    ) -> Result<Self> {
        let _frame = dsparse::call_stack::enter("FrontTree::init");
        let comm_rank = comm.rank() as usize;
        let comm_size = comm.size() as usize;

        let mut nodes = Vec::with_capacity(info.len());
        for id in 0..info.len() {
            let node = info.node(id);
            nodes.push(NodeFront {
                front: DenseBuffer::zeros(node.front_order(), node.size),
                work: DenseBuffer::zeros(node.lower_struct.len(), node.lower_struct.len()),
                front_type: FrontType::Init,
            });
        }

        // Enumerate this process's (node_id, front_row, permuted_row)
        // triples, in a fixed global order so the three-phase exchange
        // below can route replies back to the right slot.
        let mut owners_of_request = Vec::new(); // (node_id, front_row)
        let mut permuted_rows = Vec::new();
        for id in 0..info.len() {
            let node = info.node(id);
            for r in Self::owned_rows(info, id, comm_rank) {
                let permuted = if r < node.size { node.off + r } else { node.lower_struct[r - node.size] };
                owners_of_request.push((id, r));
                permuted_rows.push(permuted);
            }
        }

        let orig_rows = inv_map.translate(&permuted_rows, comm, config)?;

        // Phase 1: route requested original rows to their DSM owners.
        let mut send_counts = vec![0i32; comm_size];
        for &orig in &orig_rows {
            send_counts[matrix.row_owner(orig)] += 1;
        }
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); comm_size];
        let mut bucket_slots: Vec<Vec<usize>> = vec![Vec::new(); comm_size];
        for (slot, &orig) in orig_rows.iter().enumerate() {
            let owner = matrix.row_owner(orig);
            buckets[owner].push(orig);
            bucket_slots[owner].push(slot);
        }
        let request_buf: Vec<usize> = buckets.iter().flatten().cloned().collect();
        let request_counts: Vec<i32> = buckets.iter().map(|b| b.len() as i32).collect();
        let (recv_requests, recv_counts) = sparse_all_to_all(comm, config, &request_buf, &request_counts)?;

        // Owner side: for each received request (in order), gather its
        // row's (col, value) pairs and a length tag.
        let mut reply_lengths = Vec::with_capacity(recv_requests.len());
        let mut reply_entries: Vec<ColValue<F>> = Vec::new();
        let mut reply_entry_counts = vec![0i32; comm_size]; // elements destined to each requester, computed below
        let mut cursor = 0usize;
        let mut per_request_entries: Vec<Vec<ColValue<F>>> = Vec::with_capacity(recv_requests.len());
        for (p, &count) in recv_counts.iter().enumerate() {
            for _ in 0..count {
                let orig_row = recv_requests[cursor];
                cursor += 1;
                let local_row = orig_row - matrix.first_local_row();
                let (cols, vals) = matrix.local_row(local_row);
                let entries: Vec<ColValue<F>> =
                    cols.iter().zip(vals.iter()).map(|(&col, &value)| ColValue { col, value }).collect();
                reply_lengths.push(entries.len() as i32);
                reply_entry_counts[p] += entries.len() as i32;
                per_request_entries.push(entries);
            }
        }
        for entries in &per_request_entries {
            reply_entries.extend(entries.iter().cloned());
        }

        // Phase 2: reply lengths travel back with the roles reversed
        // (recv_counts becomes the new send_counts), exactly as
        // DistMap::translate's answer leg does.
        let (recv_lengths, _) = sparse_all_to_all(comm, config, &reply_lengths, &recv_counts)?;

        // Phase 3: flattened (col, value) pairs, sized per destination
        // by reply_entry_counts (computed above from the owner's own
        // data, no extra round trip needed).
        let (recv_entries, _) = sparse_all_to_all(comm, config, &reply_entries, &reply_entry_counts)?;

        // Reconstruct: walk bucket_slots in the same per-peer order the
        // requests were sent, consuming recv_lengths/recv_entries in
        // lockstep to recover each original row's entry list. Because
        // orig_cols_all and recv_entries are both built by iterating
        // bucket_slots in this same order, a request's range into one
        // is the identical range into the other.
        let mut orig_cols_all = Vec::new();
        let mut row_entry_ranges: Vec<(usize, usize)> = vec![(0, 0); orig_rows.len()];
        let mut length_cursor = 0usize;
        let mut entry_cursor = 0usize;
        for slots in &bucket_slots {
            for &slot in slots {
                let len = recv_lengths[length_cursor] as usize;
                length_cursor += 1;
                for k in 0..len {
                    orig_cols_all.push(recv_entries[entry_cursor + k].col);
                }
                row_entry_ranges[slot] = (entry_cursor, entry_cursor + len);
                entry_cursor += len;
            }
        }

        let forward_map = inv_map.form_inverse(comm, config)?;
        let permuted_cols_all = forward_map.translate(&orig_cols_all, comm, config)?;

        for (req_idx, &(node_id, front_row)) in owners_of_request.iter().enumerate() {
            let (entry_lo, entry_hi) = row_entry_ranges[req_idx];
            let node = info.node(node_id);
            for k in entry_lo..entry_hi {
                let permuted_col = permuted_cols_all[k];
                if permuted_col >= node.off && permuted_col < node.off + node.size {
                    let val = recv_entries[k].value;
                    let col = permuted_col - node.off;
                    nodes[node_id].front.add_at(front_row, col, val);
                }
            }
        }

        Ok(FrontTree { nodes, is_hermitian })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn front_type_transitions_are_monotonic() {
        assert!(valid_transition(FrontType::Init, FrontType::Ldl1d));
        assert!(valid_transition(FrontType::Init, FrontType::Ldl2d));
        assert!(valid_transition(FrontType::Ldl1d, FrontType::LdlSelInv1d));
        assert!(valid_transition(FrontType::Ldl2d, FrontType::BlockLdl2d));
        assert!(!valid_transition(FrontType::Init, FrontType::LdlSelInv1d));
        assert!(!valid_transition(FrontType::Ldl1d, FrontType::Ldl2d));
        assert!(!valid_transition(FrontType::LdlSelInv1d, FrontType::Ldl1d));
    }

    #[test]
    fn solve_supported_excludes_plain_ldl2d() {
        assert!(FrontType::Ldl1d.is_solve_supported());
        assert!(FrontType::BlockLdl2d.is_solve_supported());
        assert!(!FrontType::Ldl2d.is_solve_supported());
        assert!(!FrontType::Init.is_solve_supported());
    }
}
