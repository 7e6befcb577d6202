///! Collective helpers built directly on the `mpi` crate. These are the
///! flat, single-communicator primitives used by [`crate::map`] and
///! [`crate::sparse_matrix`]; the 2D process-grid variants used inside a
///! front (`SumScatter` over `MC`/`MR`, panel broadcasts, …) live in
///! `dsparse-mf`'s `grid` module, which is layered on top of these.

use crate::config::CommConfig;
use crate::error::{Result, SolverError};
use mpi::collective::SystemOperation;
use mpi::datatype::{Partition, PartitionMut};
use mpi::traits::*;

/// `RowToProcess(i) = min(floor(i / blocksize), comm_size - 1)`, the
/// 1D row-block partition shared by [`crate::map::DistMap`] and
/// [`crate::sparse_matrix::DistSparseMatrix`].
#[inline]
pub fn row_to_process(global_row: usize, blocksize: usize, comm_size: usize) -> usize {
    debug_assert!(blocksize > 0);
    (global_row / blocksize).min(comm_size - 1)
}

/// `blocksize = floor(n / comm_size)`, used with [`row_to_process`]. The
/// last process owns the remainder, `n - blocksize * (comm_size - 1)`.
#[inline]
pub fn blocksize(n: usize, comm_size: usize) -> usize {
    debug_assert!(comm_size > 0);
    n / comm_size
}

/// Number of rows locally owned by `rank` out of `n` rows split over
/// `comm_size` processes via [`row_to_process`]/[`blocksize`].
pub fn local_height(n: usize, comm_size: usize, rank: usize) -> usize {
    let b = blocksize(n, comm_size);
    if rank + 1 == comm_size {
        n - b * rank
    } else {
        b
    }
}

/// Verify that what one side thinks it is sending matches what the other
/// side thinks it is receiving, by all-to-alling the send counts and
/// comparing them against the caller-supplied recv counts. Used to turn
/// a silent protocol mismatch into a `SolverError::SizeMismatch` instead
/// of a communication deadlock or out-of-bounds write.
pub fn verify_counts<C: Communicator>(
    comm: &C,
    send_counts: &[i32],
    expected_recv_counts: &[i32],
) -> Result<()> {
    let size = comm.size() as usize;
    if send_counts.len() != size || expected_recv_counts.len() != size {
        return Err(SolverError::SizeMismatch(format!(
            "count vectors must have length comm.size() = {size}"
        )));
    }
    let mut actual_recv_counts = vec![0i32; size];
    comm.all_to_all_into(send_counts, &mut actual_recv_counts[..]);
    if actual_recv_counts != expected_recv_counts {
        return Err(SolverError::SizeMismatch(format!(
            "recv counts {actual_recv_counts:?} did not match expected {expected_recv_counts:?}"
        )));
    }
    Ok(())
}

/// Variable-sized all-to-all: each process sends `send_counts[p]`
/// elements of `send_buf` (laid out contiguously per destination, in
/// rank order) to process `p`, and receives a variable number back.
/// Lowers to `MPI_Alltoallv` when `config.use_custom_all_to_all_v` is
/// false; otherwise posts one `immediate_send`/`immediate_receive` pair
/// per peer and waits on all of them, mirroring `USE_CUSTOM_ALLTOALLV`.
pub fn sparse_all_to_all<C: Communicator, T>(
    comm: &C,
    config: &CommConfig,
    send_buf: &[T],
    send_counts: &[i32],
) -> Result<(Vec<T>, Vec<i32>)>
where
    T: Clone + Default + Equivalence,
{
    let size = comm.size() as usize;
    if send_counts.len() != size {
        return Err(SolverError::SizeMismatch(format!(
            "send_counts must have length comm.size() = {size}"
        )));
    }
    let send_displs = displacements(send_counts);

    let mut recv_counts = vec![0i32; size];
    comm.all_to_all_into(send_counts, &mut recv_counts[..]);
    let recv_displs = displacements(&recv_counts);
    let total_recv = recv_counts.iter().map(|&c| c as usize).sum();
    let mut recv_buf = vec![T::default(); total_recv];

    if config.use_custom_all_to_all_v {
        if config.barrier_in_all_to_all_v {
            comm.barrier();
        }
        post_pairwise_exchange(
            comm,
            send_buf,
            send_counts,
            &send_displs,
            &mut recv_buf,
            &recv_counts,
            &recv_displs,
        );
    } else {
        let send_partition = Partition::new(send_buf, send_counts, &send_displs[..]);
        let mut recv_partition = PartitionMut::new(&mut recv_buf[..], recv_counts.clone(), &recv_displs[..]);
        comm.all_to_all_varcount_into(&send_partition, &mut recv_partition);
    }

    Ok((recv_buf, recv_counts))
}

/// Posted-`Irecv`/`Isend`/`WaitAll` fallback for [`sparse_all_to_all`],
/// selected when `CommConfig::use_custom_all_to_all_v` is set.
fn post_pairwise_exchange<C: Communicator, T>(
    comm: &C,
    send_buf: &[T],
    send_counts: &[i32],
    send_displs: &[i32],
    recv_buf: &mut [T],
    recv_counts: &[i32],
    recv_displs: &[i32],
) where
    T: Clone + Default + Equivalence,
{
    mpi::request::scope(|scope| {
        let mut requests = Vec::new();
        for peer in 0..comm.size() {
            let p = peer as usize;
            if recv_counts[p] > 0 {
                let lo = recv_displs[p] as usize;
                let hi = lo + recv_counts[p] as usize;
                let req = comm
                    .process_at_rank(peer)
                    .immediate_receive_into(scope, &mut recv_buf[lo..hi]);
                requests.push(req);
            }
        }
        for peer in 0..comm.size() {
            let p = peer as usize;
            if send_counts[p] > 0 {
                let lo = send_displs[p] as usize;
                let hi = lo + send_counts[p] as usize;
                let req = comm
                    .process_at_rank(peer)
                    .immediate_send(scope, &send_buf[lo..hi]);
                requests.push(req);
            }
        }
        for req in requests {
            req.wait();
        }
    });
}

/// Exclusive prefix sum of per-process counts: `displs[0] = 0`,
/// `displs[p] = displs[p-1] + counts[p-1]`.
pub fn displacements(counts: &[i32]) -> Vec<i32> {
    let mut displs = Vec::with_capacity(counts.len());
    let mut running = 0i32;
    for &c in counts {
        displs.push(running);
        running += c;
    }
    displs
}

/// Re-exported so callers of [`sparse_all_to_all`] don't need to depend
/// on `mpi` directly just to name the trait bound.
pub use mpi::datatype::Equivalence;

/// A barrier across `comm`. Thin wrapper kept for symmetry with the
/// other named collectives in this module (`all_to_all`, `all_gather`, ...).
pub fn barrier<C: Communicator>(comm: &C) {
    comm.barrier();
}

/// Sum-reduce `value` across `comm`, returning the result on every rank
/// (an `AllReduce`, used where the source calls a degenerate
/// single-axis `SumScatter`).
pub fn all_reduce_sum<C: Communicator>(comm: &C, value: f64) -> f64 {
    let mut result = 0.0f64;
    comm.all_reduce_into(&value, &mut result, SystemOperation::sum());
    result
}
