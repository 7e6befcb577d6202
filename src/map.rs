///! Distributed Permutation Map (DPM): a 1D row-block map
///! `m: [0, N) -> [0, N)` together with its inverse, plus
///! `translate`/`form_inverse`/`extend` operations over it.

use crate::comm::{blocksize, local_height, row_to_process, sparse_all_to_all};
use crate::config::CommConfig;
use crate::error::{Result, SolverError};
use mpi::traits::*;

/// Wire payload for [`DistMap::store_owners`]: a `(global_index, owner)`
/// pair. A named `#[repr(C)]` struct rather than a tuple, since `mpi`
/// has no blanket `Equivalence` impl for tuples.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Equivalence)]
struct OwnerEntry {
    index: usize,
    owner: usize,
}

/// Wire payload for [`DistMap::form_inverse`]: a `(target, source)` pair
/// — same rationale as [`OwnerEntry`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Equivalence)]
struct InverseEntry {
    target: usize,
    source: usize,
}

/// A 1D row-block-distributed permutation map. Process `p` owns global
/// indices `[first_local_source, first_local_source + num_local_sources)`
/// and stores `map_[s] = m(first_local_source + s)` for each local `s`.
#[derive(Debug, Clone)]
pub struct DistMap {
    n: usize,
    comm_size: usize,
    rank: usize,
    first_local_source: usize,
    map_: Vec<usize>,
}

impl DistMap {
    /// Build an identity map over `[0, n)`, row-block distributed over
    /// `comm`.
    pub fn identity<C: Communicator>(n: usize, comm: &C) -> Self {
        let comm_size = comm.size() as usize;
        let rank = comm.rank() as usize;
        let first_local_source = first_local_source(n, comm_size, rank);
        let height = local_height(n, comm_size, rank);
        let map_ = (first_local_source..first_local_source + height).collect();
        DistMap {
            n,
            comm_size,
            rank,
            first_local_source,
            map_,
        }
    }

    /// `StoreOwners`: given that each process holds the set of global
    /// indices it *owns* (disjoint, covering `[0, n)` across all
    /// processes), builds a map whose value at `i` is the owning
    /// process. `owned_indices` need not be sorted.
    pub fn store_owners<C: Communicator>(
        n: usize,
        owned_indices: &[usize],
        comm: &C,
        config: &CommConfig,
    ) -> Result<Self> {
        let comm_size = comm.size() as usize;
        let rank = comm.rank() as usize;
        let first_local_source = first_local_source(n, comm_size, rank);
        let height = local_height(n, comm_size, rank);
        let b = blocksize(n, comm_size);

        // Route (global_index, rank) pairs to the process that owns the
        // row-block slot for global_index.
        let mut send_counts = vec![0i32; comm_size];
        for &g in owned_indices {
            if g >= n {
                return Err(SolverError::InvalidArgument(format!(
                    "owned index {g} out of range [0, {n})"
                )));
            }
            send_counts[row_to_process(g, b, comm_size)] += 1;
        }
        let mut buckets: Vec<Vec<OwnerEntry>> = vec![Vec::new(); comm_size];
        for &g in owned_indices {
            buckets[row_to_process(g, b, comm_size)].push(OwnerEntry { index: g, owner: rank });
        }
        let send_buf: Vec<OwnerEntry> = buckets.into_iter().flatten().collect();

        let (recv_pairs, _recv_counts) =
            sparse_all_to_all(comm, config, &send_buf, &send_counts)?;

        let mut map_ = vec![usize::MAX; height];
        for entry in recv_pairs {
            map_[entry.index - first_local_source] = entry.owner;
        }
        Ok(DistMap {
            n,
            comm_size,
            rank,
            first_local_source,
            map_,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn first_local_source(&self) -> usize {
        self.first_local_source
    }

    pub fn local_height(&self) -> usize {
        self.map_.len()
    }

    pub fn local_map(&self) -> &[usize] {
        &self.map_
    }

    pub fn local_map_mut(&mut self) -> &mut [usize] {
        &mut self.map_
    }

    /// `m(i)` for a global index owned by *this* process (i.e.
    /// `first_local_source <= i < first_local_source + local_height()`).
    /// For an arbitrary, possibly-remote index use [`Self::translate`].
    pub fn local_value(&self, global_index: usize) -> usize {
        self.map_[global_index - self.first_local_source]
    }

    /// Rewrite each input global index through the map, in place order
    /// preserved. Indices `>= n` pass through unchanged (phantom /
    /// boundary indices). Negative indices are rejected (the type is
    /// unsigned, so this only arises if a caller smuggles in
    /// `usize::MAX`-style sentinels it shouldn't).
    ///
    /// Implementation: two back-to-back all-to-all-v exchanges — first
    /// each index is shipped to its owner, the owner substitutes
    /// `map_[i - first_local_source]`, then the answers are shipped
    /// back to the asker in the original order.
    pub fn translate<C: Communicator>(
        &self,
        indices: &[usize],
        comm: &C,
        config: &CommConfig,
    ) -> Result<Vec<usize>> {
        let b = blocksize(self.n, self.comm_size);
        let mut owners = vec![0usize; indices.len()];
        let mut send_counts = vec![0i32; self.comm_size];
        for (slot, &i) in indices.iter().enumerate() {
            if i >= self.n {
                owners[slot] = self.comm_size; // sentinel: passthrough
                continue;
            }
            let owner = row_to_process(i, b, self.comm_size);
            owners[slot] = owner;
            send_counts[owner] += 1;
        }

        // group the requests by destination, remembering where each
        // request came from so the answer can be placed back in order
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); self.comm_size];
        let mut bucket_slots: Vec<Vec<usize>> = vec![Vec::new(); self.comm_size];
        let mut passthrough = vec![None; indices.len()];
        for (slot, &i) in indices.iter().enumerate() {
            if i >= self.n {
                passthrough[slot] = Some(i);
                continue;
            }
            let owner = owners[slot];
            buckets[owner].push(i);
            bucket_slots[owner].push(slot);
        }
        let request_buf: Vec<usize> = buckets.iter().flatten().cloned().collect();
        let request_counts: Vec<i32> = buckets.iter().map(|b| b.len() as i32).collect();

        let (recv_requests, recv_counts) =
            sparse_all_to_all(comm, config, &request_buf, &request_counts)?;

        // answer in received order, then ship answers back (roles
        // reversed: recv_counts become the new send_counts)
        let answers: Vec<usize> = recv_requests
            .iter()
            .map(|&g| self.local_value(g))
            .collect();
        let (recv_answers, _) = sparse_all_to_all(comm, config, &answers, &recv_counts)?;

        let mut out = vec![0usize; indices.len()];
        let mut cursor = 0usize;
        for (owner, slots) in bucket_slots.iter().enumerate() {
            let _ = owner;
            for &slot in slots {
                out[slot] = recv_answers[cursor];
                cursor += 1;
            }
        }
        for (slot, pass) in passthrough.into_iter().enumerate() {
            if let Some(i) = pass {
                out[slot] = i;
            }
        }
        Ok(out)
    }

    /// `FormInverse`: each process emits `(s + first_local_source,
    /// map_[s])` pairs routed by `RowToProcess(map_[s])`; destinations
    /// write `out[map_[s] - first] = s + first`.
    pub fn form_inverse<C: Communicator>(&self, comm: &C, config: &CommConfig) -> Result<Self> {
        let b = blocksize(self.n, self.comm_size);
        let mut buckets: Vec<Vec<InverseEntry>> = vec![Vec::new(); self.comm_size];
        for (s, &target) in self.map_.iter().enumerate() {
            let owner = row_to_process(target, b, self.comm_size);
            buckets[owner].push(InverseEntry { target, source: s + self.first_local_source });
        }
        let send_counts: Vec<i32> = buckets.iter().map(|b| b.len() as i32).collect();
        let send_buf: Vec<InverseEntry> = buckets.into_iter().flatten().collect();

        let (recv_pairs, _) = sparse_all_to_all(comm, config, &send_buf, &send_counts)?;

        let height = self.local_height();
        let mut out = vec![usize::MAX; height];
        for entry in recv_pairs {
            out[entry.target - self.first_local_source] = entry.source;
        }
        Ok(DistMap {
            n: self.n,
            comm_size: self.comm_size,
            rank: self.rank,
            first_local_source: self.first_local_source,
            map_: out,
        })
    }

    /// Compose two maps: `(self ∘ first)(i) = self(first(i))`, i.e.
    /// translate `first`'s local map values through `self`.
    pub fn extend<C: Communicator>(
        &self,
        first: &DistMap,
        comm: &C,
        config: &CommConfig,
    ) -> Result<Self> {
        if self.n != first.n {
            return Err(SolverError::SizeMismatch(format!(
                "cannot compose maps of size {} and {}",
                self.n, first.n
            )));
        }
        let translated = self.translate(&first.map_, comm, config)?;
        Ok(DistMap {
            n: first.n,
            comm_size: first.comm_size,
            rank: first.rank,
            first_local_source: first.first_local_source,
            map_: translated,
        })
    }
}

fn first_local_source(n: usize, comm_size: usize, rank: usize) -> usize {
    blocksize(n, comm_size) * rank
}

#[cfg(test)]
mod test {
    use super::*;

    // These exercise the pure index-partitioning math without a live
    // communicator; the collective-driving paths (`translate`,
    // `form_inverse`, `extend`, `store_owners`) need an `mpi::Communicator`
    // and are covered by single-process end-to-end tests in
    // `dsparse-mf/tests` instead.

    #[test]
    fn first_local_source_matches_row_to_process_boundaries() {
        let n = 10;
        let comm_size = 3;
        let b = blocksize(n, comm_size);
        for rank in 0..comm_size {
            let first = first_local_source(n, comm_size, rank);
            assert_eq!(row_to_process(first, b, comm_size), rank);
        }
    }
}
