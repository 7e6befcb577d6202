///! Nodal Multi-Vector (NMV): the right-hand side, held in per-node
///! slabs aligned with the front tree, versus [`DistMultiVec`]'s flat
///! 1D row-block layout (the dense sibling of
///! [`dsparse::DistSparseMatrix`] — needed since `Pull`/`Push` need
///! something on the DSM side of the fence to route rows from).

use crate::field::Field;
use crate::front_tree::FrontTree;
use crate::grid::DenseBuffer;
use crate::info::EliminationTreeInfo;
use dsparse::comm::{blocksize, local_height, row_to_process, sparse_all_to_all, Equivalence};
use dsparse::config::CommConfig;
use dsparse::error::Result;
use dsparse::DistMap;
use mpi::traits::*;
use num_traits::Zero;

/// A dense, row-block-distributed `N x width` multivector — the same
/// 1D partition `dsparse::DistSparseMatrix` uses, carried here because
/// NMV's `Pull`/`Push` need a concrete DSM-side container to route rows
/// to and from.
pub struct DistMultiVec<F> {
    n: usize,
    width: usize,
    first_local_row: usize,
    rows: Vec<Vec<F>>,
}

impl<F: Field> DistMultiVec<F> {
    pub fn zeros<C: Communicator>(n: usize, width: usize, comm: &C) -> Self {
        let comm_size = comm.size() as usize;
        let rank = comm.rank() as usize;
        let first_local_row = blocksize(n, comm_size) * rank;
        let height = local_height(n, comm_size, rank);
        DistMultiVec {
            n,
            width,
            first_local_row,
            rows: vec![vec![F::zero(); width]; height],
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn first_local_row(&self) -> usize {
        self.first_local_row
    }

    pub fn local_row(&self, local_row: usize) -> &[F] {
        &self.rows[local_row]
    }

    pub fn local_row_mut(&mut self, local_row: usize) -> &mut [F] {
        &mut self.rows[local_row]
    }

    pub fn row_owner<C: Communicator>(&self, i: usize, comm: &C) -> usize {
        let comm_size = comm.size() as usize;
        row_to_process(i, blocksize(self.n, comm_size), comm_size)
    }
}

/// Per-node slabs of the same multivector, laid out to match a front's
/// rows (`front_order x width`, top `size` rows the node's own
/// variables, the rest its `lowerStruct`).
pub struct NodalMultiVec<F> {
    slabs: Vec<DenseBuffer<F>>,
}

impl<F: Field> NodalMultiVec<F> {
    pub fn zeros_like<E>(tree: &FrontTree<E>, width: usize) -> Self
    where
        E: Field + Equivalence,
    {
        let slabs = (0..tree.len())
            .map(|id| {
                let (rows, _) = tree.node(id).front.shape();
                DenseBuffer::zeros(rows, width)
            })
            .collect();
        NodalMultiVec { slabs }
    }

    pub fn slab(&self, id: usize) -> &DenseBuffer<F> {
        &self.slabs[id]
    }

    pub fn slab_mut(&mut self, id: usize) -> &mut DenseBuffer<F> {
        &mut self.slabs[id]
    }

    /// Enumerate, in tree order, the `(node_id, front_row, permuted_row)`
    /// triples this process owns — the same row ownership rule
    /// [`crate::front_tree::FrontTree::init`] uses (the 1D VC
    /// approximation for distributed nodes).
    fn owned_permuted_rows(info: &EliminationTreeInfo, comm_rank: usize) -> Vec<(usize, usize, usize)> {
        let mut out = Vec::new();
        for id in 0..info.len() {
            let node = info.node(id);
            let front_order = node.front_order();
            let rows: Vec<usize> = match &node.dist {
                None => (0..front_order).collect(),
                Some(d) => {
                    let team_size = d.grid.team_size();
                    let team_rank = comm_rank % team_size;
                    (0..front_order).filter(|r| r % team_size == team_rank).collect()
                }
            };
            for r in rows {
                let permuted = if r < node.size { node.off + r } else { node.lower_struct[r - node.size] };
                out.push((id, r, permuted));
            }
        }
        out
    }

    /// `Pull(invMap, info, X)`: gather DSM-layout rows of `x` into
    /// per-node slabs, via `invMap`'s
    /// permuted-to-original translation and a row-owner-routed
    /// exchange, mirroring [`crate::front_tree::FrontTree::init`]'s
    /// structure but simpler (every row carries exactly `width` values,
    /// no variable-length entry lists to track).
    pub fn pull<C: Communicator>(
        &mut self,
        inv_map: &DistMap,
        info: &EliminationTreeInfo,
        x: &DistMultiVec<F>,
        comm: &C,
        config: &CommConfig,
    ) -> Result<()>
    where
        F: Equivalence,
    {
        let _frame = dsparse::call_stack::enter("NodalMultiVec::pull");
        let comm_rank = comm.rank() as usize;
        let comm_size = comm.size() as usize;
        let width = x.width();

        let owned = Self::owned_permuted_rows(info, comm_rank);
        let permuted_rows: Vec<usize> = owned.iter().map(|&(_, _, p)| p).collect();
        let orig_rows = inv_map.translate(&permuted_rows, comm, config)?;

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); comm_size];
        let mut bucket_slots: Vec<Vec<usize>> = vec![Vec::new(); comm_size];
        for (slot, &orig) in orig_rows.iter().enumerate() {
            let owner = x.row_owner(orig, comm);
            buckets[owner].push(orig);
            bucket_slots[owner].push(slot);
        }
        let request_buf: Vec<usize> = buckets.iter().flatten().cloned().collect();
        let request_counts: Vec<i32> = buckets.iter().map(|b| b.len() as i32).collect();
        let (recv_requests, recv_counts) = sparse_all_to_all(comm, config, &request_buf, &request_counts)?;

        let mut reply: Vec<F> = Vec::with_capacity(recv_requests.len() * width);
        for &orig_row in &recv_requests {
            let local = orig_row - x.first_local_row();
            reply.extend_from_slice(x.local_row(local));
        }
        let reply_counts: Vec<i32> = recv_counts.iter().map(|&c| c * width as i32).collect();
        let (recv_values, _) = sparse_all_to_all(comm, config, &reply, &reply_counts)?;

        let mut cursor = 0usize;
        for slots in &bucket_slots {
            for &slot in slots {
                let (id, r, _) = owned[slot];
                let row_values = &recv_values[cursor..cursor + width];
                let slab = &mut self.slabs[id];
                for (c, &v) in row_values.iter().enumerate() {
                    slab.set(r, c, v);
                }
                cursor += width;
            }
        }
        Ok(())
    }

    /// `Push`: the inverse of [`Self::pull`] — same routing, roles
    /// reversed. `Pull` then `Push` round-trips a right-hand side
    /// unchanged.
    pub fn push<C: Communicator>(
        &self,
        inv_map: &DistMap,
        info: &EliminationTreeInfo,
        y: &mut DistMultiVec<F>,
        comm: &C,
        config: &CommConfig,
    ) -> Result<()>
    where
        F: Equivalence,
    {
        let _frame = dsparse::call_stack::enter("NodalMultiVec::push");
        let comm_rank = comm.rank() as usize;
        let comm_size = comm.size() as usize;
        let width = y.width();

        let owned = Self::owned_permuted_rows(info, comm_rank);
        let permuted_rows: Vec<usize> = owned.iter().map(|&(_, _, p)| p).collect();
        let orig_rows = inv_map.translate(&permuted_rows, comm, config)?;

        // Group owned slots by destination process so row ids and their
        // payload slabs travel in matching order.
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); comm_size]; // slot indices per dest
        for (slot, &orig) in orig_rows.iter().enumerate() {
            let owner = y.row_owner(orig, comm);
            buckets[owner].push(slot);
        }
        let row_counts: Vec<i32> = buckets.iter().map(|b| b.len() as i32).collect();
        let mut row_payload: Vec<usize> = Vec::with_capacity(owned.len());
        let mut value_payload: Vec<F> = Vec::with_capacity(owned.len() * width);
        for slots in &buckets {
            for &slot in slots {
                let (id, r, _) = owned[slot];
                row_payload.push(orig_rows[slot]);
                let slab = &self.slabs[id];
                for c in 0..width {
                    value_payload.push(slab.get(r, c));
                }
            }
        }
        let value_counts: Vec<i32> = row_counts.iter().map(|&c| c * width as i32).collect();

        let (recv_rows, _recv_row_counts) = sparse_all_to_all(comm, config, &row_payload, &row_counts)?;
        let (recv_values, _) = sparse_all_to_all(comm, config, &value_payload, &value_counts)?;

        for (k, &orig_row) in recv_rows.iter().enumerate() {
            let local = orig_row - y.first_local_row();
            let values = &recv_values[k * width..(k + 1) * width];
            y.local_row_mut(local).copy_from_slice(values);
        }
        Ok(())
    }
}
