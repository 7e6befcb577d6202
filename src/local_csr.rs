///! Local (single-process) triplet assembly and CSR compression, used
///! internally by [`crate::sparse_matrix::DistSparseMatrix`] to turn the
///! unsorted `Update(i, j, v)` calls a process receives during assembly
///! into sorted, duplicate-summed row-block storage (CSR-equivalent,
///! with implicit sorting and dedup once assembly stops).
///!
///! Built on a `TripletMat`-style assembly step: fills an unsorted CSR
///! by bucketing, then relies on a transpose-twice trick to end up with
///! sorted columns without an explicit sort, specialized here to the
///! row-block (not full CSC/CSR pair) this crate actually needs.

use num_traits::Zero;

/// Accumulates `(row, col, value)` triplets for the rows a single
/// process owns. `row` is relative to the process's first local row.
pub struct LocalTriplets<F> {
    n_local_rows: usize,
    n_cols: usize,
    row_inds: Vec<usize>,
    col_inds: Vec<usize>,
    data: Vec<F>,
}

impl<F> LocalTriplets<F> {
    pub fn new(n_local_rows: usize, n_cols: usize) -> Self {
        LocalTriplets {
            n_local_rows,
            n_cols,
            row_inds: Vec::new(),
            col_inds: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.row_inds.reserve(additional);
        self.col_inds.reserve(additional);
        self.data.reserve(additional);
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Append one triplet. `local_row` must be `< n_local_rows` and
    /// `col` must be `< n_cols`; callers (DSM's `update`) are expected to
    /// have already validated this against the row range.
    pub fn push(&mut self, local_row: usize, col: usize, value: F) {
        debug_assert!(local_row < self.n_local_rows);
        debug_assert!(col < self.n_cols);
        self.row_inds.push(local_row);
        self.col_inds.push(col);
        self.data.push(value);
    }

    /// Compress into a sorted, duplicate-summed local CSR. Consumes
    /// `self` since the triplet buffers are not useful afterwards.
    pub fn into_csr(self) -> LocalCsr<F>
    where
        F: Clone + Zero + std::ops::Add<Output = F> + PartialEq,
    {
        let (unsorted_indptr, unsorted_indices, unsorted_data) = dedup_sum_csr(
            self.n_local_rows,
            self.n_cols,
            &self.row_inds,
            &self.col_inds,
            self.data,
        );
        // Transposing an (local_rows x cols) structure whose entries
        // were grouped in row order yields a (cols x local_rows)
        // structure whose entries are grouped in *column* order but
        // sorted by row within each column (since the source was
        // visited row-by-row). Transposing that back sorts columns
        // within each row, which is what a CSR's `indices` are
        // supposed to satisfy.
        let (t_indptr, t_indices, t_data) = transpose_compressed(
            self.n_local_rows,
            self.n_cols,
            &unsorted_indptr,
            &unsorted_indices,
            unsorted_data,
        );
        let (indptr, indices, data) = transpose_compressed(
            self.n_cols,
            self.n_local_rows,
            &t_indptr,
            &t_indices,
            t_data,
        );
        LocalCsr {
            n_local_rows: self.n_local_rows,
            n_cols: self.n_cols,
            indptr,
            indices,
            data,
        }
    }
}

/// A process's local row-block in compressed-sparse-row form: row `r`'s
/// entries are `indices[indptr[r]..indptr[r+1]]` paired with
/// `data[indptr[r]..indptr[r+1]]`, with `indices` strictly increasing
/// within each row.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCsr<F> {
    n_local_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<F>,
}

impl<F> LocalCsr<F> {
    pub fn n_local_rows(&self) -> usize {
        self.n_local_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn row(&self, local_row: usize) -> (&[usize], &[F]) {
        let lo = self.indptr[local_row];
        let hi = self.indptr[local_row + 1];
        (&self.indices[lo..hi], &self.data[lo..hi])
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }
}

/// Build an unsorted-but-deduped CSR: entries sharing `(row, col)` are
/// summed, in first-seen order; columns within a row are **not**
/// guaranteed sorted (that's `transpose_compressed`'s job, called
/// twice by [`LocalTriplets::into_csr`]).
fn dedup_sum_csr<F>(
    n_rows: usize,
    n_cols: usize,
    row_inds: &[usize],
    col_inds: &[usize],
    values: Vec<F>,
) -> (Vec<usize>, Vec<usize>, Vec<F>)
where
    F: Clone + Zero + std::ops::Add<Output = F>,
{
    let mut row_counts = vec![0usize; n_rows + 1];
    for &i in row_inds {
        row_counts[i + 1] += 1;
    }
    let mut indptr = row_counts.clone();
    for i in 1..=n_rows {
        indptr[i] += indptr[i - 1];
    }
    let nnz_max = indptr[n_rows];
    let mut indices = vec![0usize; nnz_max];
    let mut data: Vec<F> = (0..nnz_max).map(|_| F::zero()).collect();
    let mut fill_count = vec![0usize; n_rows];

    for ((&i, &j), val) in row_inds.iter().zip(col_inds.iter()).zip(values.into_iter()) {
        let start = indptr[i];
        let stop = start + fill_count[i];
        let existing = indices[start..stop]
            .iter()
            .position(|&col| col == j);
        match existing {
            Some(offset) => {
                let slot = start + offset;
                data[slot] = data[slot].clone() + val;
            }
            None => {
                indices[stop] = j;
                data[stop] = val;
                fill_count[i] += 1;
            }
        }
    }

    // compact each row down to its actual (deduped) count
    let mut compacted_indptr = vec![0usize; n_rows + 1];
    let mut compacted_indices = Vec::with_capacity(nnz_max);
    let mut compacted_data = Vec::with_capacity(nnz_max);
    for i in 0..n_rows {
        let start = indptr[i];
        let count = fill_count[i];
        compacted_indptr[i] = compacted_indices.len();
        compacted_indices.extend_from_slice(&indices[start..start + count]);
        compacted_data.extend(data[start..start + count].iter().cloned());
    }
    compacted_indptr[n_rows] = compacted_indices.len();
    let _ = n_cols;
    (compacted_indptr, compacted_indices, compacted_data)
}

/// Transpose a `(major x minor)` compressed structure into a
/// `(minor x major)` one. A standard counting-sort transpose: entries
/// end up grouped by (former) column and, within each group, ordered by
/// the row they came from — which is what lets calling this twice sort
/// the original rows' columns without an explicit comparison sort.
fn transpose_compressed<F: Clone>(
    major: usize,
    minor: usize,
    indptr: &[usize],
    indices: &[usize],
    data: Vec<F>,
) -> (Vec<usize>, Vec<usize>, Vec<F>)
where
    F: Zero,
{
    let nnz = indices.len();
    let mut minor_counts = vec![0usize; minor + 1];
    for &j in indices {
        minor_counts[j + 1] += 1;
    }
    let mut new_indptr = minor_counts;
    for j in 1..=minor {
        new_indptr[j] += new_indptr[j - 1];
    }
    let mut new_indices = vec![0usize; nnz];
    let mut new_data: Vec<F> = (0..nnz).map(|_| F::zero()).collect();
    let mut cursor = new_indptr.clone();

    for i in 0..major {
        for p in indptr[i]..indptr[i + 1] {
            let j = indices[p];
            let dest = cursor[j];
            new_indices[dest] = i;
            new_data[dest] = data[p].clone();
            cursor[j] += 1;
        }
    }
    (new_indptr, new_indices, new_data)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sorts_and_dedups_within_row() {
        let mut t = LocalTriplets::new(2, 4);
        // row 0: (0,3)=1, (0,1)=2, (0,1)=3 (dup, should sum to 5)
        // row 1: (1,0)=4
        t.push(0, 3, 1.0f64);
        t.push(0, 1, 2.0f64);
        t.push(0, 1, 3.0f64);
        t.push(1, 0, 4.0f64);

        let csr = t.into_csr();
        assert_eq!(csr.n_local_rows(), 2);
        assert_eq!(csr.nnz(), 3);

        let (cols0, vals0) = csr.row(0);
        assert_eq!(cols0, &[1, 3]);
        assert_eq!(vals0, &[5.0, 1.0]);

        let (cols1, vals1) = csr.row(1);
        assert_eq!(cols1, &[0]);
        assert_eq!(vals1, &[4.0]);
    }

    #[test]
    fn empty_row_has_empty_slice() {
        let t: LocalTriplets<f64> = LocalTriplets::new(3, 3);
        let csr = t.into_csr();
        assert_eq!(csr.nnz(), 0);
        for r in 0..3 {
            let (cols, vals) = csr.row(r);
            assert!(cols.is_empty());
            assert!(vals.is_empty());
        }
    }
}
