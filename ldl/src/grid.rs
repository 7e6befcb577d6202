///! A minimal dense linear-algebra substrate: no published crate hosts
///! a 2D process-grid distributed dense matrix of the shape a
///! multifrontal engine needs, so this module defines the narrow slice
///! actually called — a `ProcessGrid` coordinate descriptor, node-local
///! dense storage backed by `ndarray`, and named local kernels
///! (`local_gemm`, `front_lower_forward_solve`, …) as plain loops over
///! that storage. It is not a general dense linear-algebra library.
///!
///! `ProcessGrid` itself owns no communicator — a node's team
///! communicator is created once by a `CommSplit` and owned by its
///! front-tree entry, not by the grid descriptor; collective helpers
///! here take a `&impl Communicator` explicitly alongside the grid.

use crate::field::Field;
use dsparse::error::{Result, SolverError};
use mpi::traits::*;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use num_traits::{One, Zero};

/// A logical 2D arrangement of processes a distributed front is laid
/// out over. `row_align`/`col_align` record where this grid's logical
/// `(0, 0)` sits within its *parent* grid's coordinate space — an
/// explicit field rather than a shift re-derived ad hoc at each call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGrid {
    pub height: usize,
    pub width: usize,
    pub row: usize,
    pub col: usize,
    pub row_align: usize,
    pub col_align: usize,
}

impl ProcessGrid {
    /// The degenerate 1x1 grid a local (single-process) node uses.
    pub fn singleton() -> Self {
        ProcessGrid {
            height: 1,
            width: 1,
            row: 0,
            col: 0,
            row_align: 0,
            col_align: 0,
        }
    }

    /// The `height * width` process grid closest to square for a team
    /// of `team_size` processes, with this rank's `(row, col)`
    /// coordinate. `team_size` must be a power of two; arbitrary team
    /// sizes are explicitly unsupported rather than guessed at.
    pub fn new(team_size: usize, team_rank: usize) -> Result<Self> {
        if team_size == 0 || !team_size.is_power_of_two() {
            return Err(SolverError::InvalidArgument(format!(
                "process grid requires a power-of-two team size, got {team_size}"
            )));
        }
        if team_rank >= team_size {
            return Err(SolverError::InvalidArgument(format!(
                "team rank {team_rank} out of range for team size {team_size}"
            )));
        }
        let log2 = team_size.trailing_zeros();
        let height_bits = log2 / 2;
        let height = 1usize << height_bits;
        let width = team_size / height;
        Ok(ProcessGrid {
            height,
            width,
            row: team_rank % height,
            col: team_rank / height,
            row_align: 0,
            col_align: 0,
        })
    }

    pub fn team_size(&self) -> usize {
        self.height * self.width
    }

    /// Split this grid's team in half, by the `level`-th bit of the
    /// team-local rank, producing the two children's grid
    /// descriptors (`team_rank`'s own child is whichever of the pair it
    /// falls into). `level` is `0` for the first split below the root.
    pub fn child_grid(&self, team_rank: usize, level: u32) -> Result<ProcessGrid> {
        let team_size = self.team_size();
        if team_size == 1 {
            return Err(SolverError::InvalidArgument(
                "a singleton grid has no children to split into".into(),
            ));
        }
        let child_team_size = team_size / 2;
        let bit = (team_rank >> level) & 1;
        // The child's team-local rank is this rank's position within
        // its half of the team: drop the split bit and renumber.
        let child_rank = renumber_dropping_bit(team_rank, level);
        let child = ProcessGrid::new(child_team_size, child_rank)?;
        Ok(realign(self, &child, bit))
    }
}

/// Team-local rank with the `level`-th bit removed (the remaining bits,
/// shifted down past the removed one), i.e. this rank's position within
/// whichever half of the team it falls into.
fn renumber_dropping_bit(rank: usize, level: u32) -> usize {
    let low = rank & ((1usize << level) - 1);
    let high = rank >> (level + 1);
    (high << level) | low
}

/// Compute the child grid's alignment within its parent, given which
/// half (`bit`) of the parent team the child occupies. The shift is
/// applied to the destination coordinate *before* the modular wrap,
/// `(child_coord + align) % parent_extent`, not after.
fn realign(parent: &ProcessGrid, child: &ProcessGrid, bit: usize) -> ProcessGrid {
    // A team split by one bit of team-local rank halves whichever of
    // height/width is larger (keeping the grid close to square); the
    // half not taken by this child is where the sibling's grid starts,
    // i.e. the alignment offset along that axis.
    let halves_width = parent.width >= parent.height;
    let (row_align, col_align) = if halves_width {
        (0, if bit == 1 { child.width } else { 0 })
    } else {
        (if bit == 1 { child.height } else { 0 }, 0)
    };
    ProcessGrid {
        height: child.height,
        width: child.width,
        row: child.row,
        col: child.col,
        row_align,
        col_align,
    }
}

/// Map a coordinate in the child grid's local frame to its destination
/// coordinate in the parent grid's frame, applying the alignment shift
/// before the modular wrap.
pub fn realign_destination(child: &ProcessGrid, parent: &ProcessGrid, child_row: usize, child_col: usize) -> (usize, usize) {
    let dest_row = (child_row + child.row_align) % parent.height;
    let dest_col = (child_col + child.col_align) % parent.width;
    (dest_row, dest_col)
}

/// Node-local dense storage: a thin `ndarray::Array2` wrapper. Plays
/// the role of the "local kernels'" operand type.
#[derive(Debug, Clone)]
pub struct DenseBuffer<F> {
    data: Array2<F>,
}

impl<F: Field> DenseBuffer<F> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        DenseBuffer {
            data: Array2::from_elem((rows, cols), F::zero()),
        }
    }

    pub fn from_array(data: Array2<F>) -> Self {
        DenseBuffer { data }
    }

    pub fn view(&self) -> ArrayView2<F> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<F> {
        self.data.view_mut()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }

    pub fn get(&self, i: usize, j: usize) -> F {
        self.data[[i, j]]
    }

    pub fn add_at(&mut self, i: usize, j: usize, value: F) {
        self.data[[i, j]] += value;
    }

    pub fn set(&mut self, i: usize, j: usize, value: F) {
        self.data[[i, j]] = value;
    }

    pub fn into_array(self) -> Array2<F> {
        self.data
    }
}

/// `Axpy`: `y += alpha * x`, row by row (used to additively unpack a
/// child's solve contribution into a parent's slab).
pub fn axpy<F: Field>(alpha: F, x: ArrayView2<F>, y: &mut ArrayViewMut2<F>) {
    assert_eq!(x.dim(), y.dim(), "axpy operands must have matching shape");
    for (xv, yv) in x.iter().zip(y.iter_mut()) {
        *yv += alpha * *xv;
    }
}

/// Plain triple-loop `C += A * B` (or `C = A * B` if `accumulate` is
/// false). Stand-in for the substrate's `LocalGemm`; not a tuned BLAS-3
/// kernel.
pub fn local_gemm<F: Field>(a: ArrayView2<F>, b: ArrayView2<F>, c: &mut ArrayViewMut2<F>, accumulate: bool) {
    let (m, k) = a.dim();
    let (k2, n) = b.dim();
    assert_eq!(k, k2, "inner dimensions must agree");
    assert_eq!(c.dim(), (m, n), "output dimensions must agree");
    if !accumulate {
        c.fill(F::zero());
    }
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[[i, p]];
            if a_ip == F::zero() {
                continue;
            }
            for j in 0..n {
                c[[i, j]] += a_ip * b[[p, j]];
            }
        }
    }
}

/// `Transpose`/`Adjoint`: transpose `a` into `out`, conjugating entries
/// when `hermitian` is set.
pub fn transpose_or_adjoint<F: Field>(a: ArrayView2<F>, out: &mut ArrayViewMut2<F>, hermitian: bool) {
    let (m, n) = a.dim();
    assert_eq!(out.dim(), (n, m));
    for i in 0..m {
        for j in 0..n {
            let v = a[[i, j]];
            out[[j, i]] = if hermitian { v.conj() } else { v };
        }
    }
}

/// Invert a unit lower-triangular matrix (`TriangularInverse`) by
/// forward substitution, one column of the identity at a time. Used by
/// [`crate::factor::front_block_ldl`] to explicitly invert a front's
/// diagonal block.
pub fn triangular_inverse<F: Field>(l: &DenseBuffer<F>) -> DenseBuffer<F> {
    let (n, n2) = l.shape();
    assert_eq!(n, n2, "triangular_inverse requires a square matrix");
    let mut inv = DenseBuffer::<F>::zeros(n, n);
    for col in 0..n {
        inv.set(col, col, F::one());
        for row in (col + 1)..n {
            let mut acc = F::zero();
            for k in col..row {
                acc += l.get(row, k) * inv.get(k, col);
            }
            inv.set(row, col, F::zero() - acc);
        }
    }
    inv
}

/// Zero out the strictly-upper part of a square matrix, leaving the
/// diagonal and lower-triangle untouched (`MakeTrapezoidal(LOWER)`).
pub fn make_trapezoidal_lower<F: Field>(a: &mut ArrayViewMut2<F>) {
    let (m, n) = a.dim();
    for i in 0..m {
        for j in (i + 1)..n {
            a[[i, j]] = F::zero();
        }
    }
}

/// Row-sum reduction across one axis of the process grid (`SumScatter`
/// on `MC`/`MR`). Since `ProcessGrid` does not own a communicator, the
/// team communicator restricted to the relevant axis is passed in by
/// the caller (built once per node and cached alongside the front).
pub fn sum_scatter_axis<C: Communicator, F: Field + Equivalence>(
    axis_comm: &C,
    local: ArrayView2<F>,
) -> Array2<F> {
    let shape = local.dim();
    let send: Vec<F> = local.iter().cloned().collect();
    let mut recv = vec![F::zero(); send.len()];
    axis_comm.all_reduce_into(&send[..], &mut recv[..], &mpi::collective::SystemOperation::sum());
    Array2::from_shape_vec(shape, recv).expect("shape preserved by all_reduce_into")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn square_grid_for_power_of_two_team() {
        let g = ProcessGrid::new(4, 3).unwrap();
        assert_eq!((g.height, g.width), (2, 2));
        assert_eq!((g.row, g.col), (1, 1));
    }

    #[test]
    fn rejects_non_power_of_two_team_size() {
        assert!(ProcessGrid::new(3, 0).is_err());
    }

    #[test]
    fn renumber_dropping_bit_halves_the_team() {
        // team of 8, split on bit 0: ranks 0,2,4,6 -> child ranks 0,1,2,3
        // ranks 1,3,5,7 -> child ranks 0,1,2,3 too (other half)
        assert_eq!(renumber_dropping_bit(0, 0), 0);
        assert_eq!(renumber_dropping_bit(2, 0), 1);
        assert_eq!(renumber_dropping_bit(4, 0), 2);
        assert_eq!(renumber_dropping_bit(6, 0), 3);
        assert_eq!(renumber_dropping_bit(1, 0), 0);
        assert_eq!(renumber_dropping_bit(7, 0), 3);
    }

    #[test]
    fn realign_shifts_destination_before_wrap() {
        let parent = ProcessGrid::new(4, 0).unwrap(); // 2x2
        let child_size = parent.team_size() / 2;
        let child0 = ProcessGrid::new(child_size, 0).unwrap();
        let aligned0 = realign(&parent, &child0, 0);
        assert_eq!((aligned0.row_align, aligned0.col_align), (0, 0));

        let child1 = ProcessGrid::new(child_size, 0).unwrap();
        let aligned1 = realign(&parent, &child1, 1);
        // parent is 2x2 (height==width, halves_width branch taken),
        // second half's columns start at child.width
        assert_eq!(aligned1.col_align, aligned1.width);

        let (dest_row, dest_col) = realign_destination(&aligned1, &parent, 0, 0);
        assert_eq!(dest_row, 0);
        assert_eq!(dest_col, aligned1.width % parent.width);
    }

    #[test]
    fn local_gemm_matches_hand_multiplication() {
        use ndarray::array;
        let a = array![[1.0f64, 2.0], [3.0, 4.0]];
        let b = array![[5.0f64, 6.0], [7.0, 8.0]];
        let mut c = Array2::<f64>::zeros((2, 2));
        local_gemm(a.view(), b.view(), &mut c.view_mut(), false);
        assert_eq!(c, array![[19.0, 22.0], [43.0, 50.0]]);
    }

    #[test]
    fn axpy_accumulates_scaled_values() {
        use ndarray::array;
        let x = array![[1.0f64, 2.0]];
        let mut y = array![[10.0f64, 20.0]];
        {
            let mut yv = y.view_mut();
            axpy(2.0, x.view(), &mut yv);
        }
        assert_eq!(y, array![[12.0, 24.0]]);
    }
}
