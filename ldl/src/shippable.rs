///! A thin wrapper that lets a [`crate::field::Field`] element cross an
///! MPI collective when the wrapped type has no upstream `Equivalence`
///! impl. `Complex<f64>`/`Complex<f32>` are the motivating case: neither
///! `num_complex` nor `mpi` is this crate's own, so the orphan rule
///! blocks implementing `Equivalence` for `Complex<T>` directly. Wrapping
///! it in a local, `#[repr(C)]` newtype sidesteps that — the newtype
///! *is* local, so it may carry whatever impls this crate needs.

use crate::field::Field;
use dsparse::comm::Equivalence;
use num_complex::Complex;
use num_traits::{Num, One, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Rem, RemAssign, Sub, SubAssign};

/// Wraps any `F` so it can be shipped through [`dsparse::comm::sparse_all_to_all`].
/// Arithmetic and [`Field`] forward straight through to the inner value;
/// only `Equivalence` needs a type-specific impl (below, for the two
/// `Complex` instantiations that actually need one — `f32`/`f64` already
/// have an upstream impl and never need wrapping).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Shippable<F>(pub F);

impl<F: fmt::Display> fmt::Display for Shippable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<F: Add<Output = F>> Add for Shippable<F> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Shippable(self.0 + rhs.0)
    }
}

impl<F: Sub<Output = F>> Sub for Shippable<F> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Shippable(self.0 - rhs.0)
    }
}

impl<F: Mul<Output = F>> Mul for Shippable<F> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Shippable(self.0 * rhs.0)
    }
}

impl<F: Div<Output = F>> Div for Shippable<F> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Shippable(self.0 / rhs.0)
    }
}

impl<F: Rem<Output = F>> Rem for Shippable<F> {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        Shippable(self.0 % rhs.0)
    }
}

impl<F: AddAssign> AddAssign for Shippable<F> {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl<F: SubAssign> SubAssign for Shippable<F> {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl<F: MulAssign> MulAssign for Shippable<F> {
    fn mul_assign(&mut self, rhs: Self) {
        self.0 *= rhs.0;
    }
}

impl<F: DivAssign> DivAssign for Shippable<F> {
    fn div_assign(&mut self, rhs: Self) {
        self.0 /= rhs.0;
    }
}

impl<F: RemAssign> RemAssign for Shippable<F> {
    fn rem_assign(&mut self, rhs: Self) {
        self.0 %= rhs.0;
    }
}

impl<F: Zero> Zero for Shippable<F> {
    fn zero() -> Self {
        Shippable(F::zero())
    }
    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl<F: One> One for Shippable<F> {
    fn one() -> Self {
        Shippable(F::one())
    }
}

impl<F: Num> Num for Shippable<F> {
    type FromStrRadixErr = F::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        F::from_str_radix(str, radix).map(Shippable)
    }
}

// `NumAssignOps` has a blanket impl in `num_traits` for any type that
// implements the five *Assign ops above, so no explicit impl is needed.

impl<F: Field> Field for Shippable<F> {
    type Real = F::Real;

    fn conj(self) -> Self {
        Shippable(self.0.conj())
    }

    fn magnitude(self) -> Self::Real {
        self.0.magnitude()
    }

    fn from_real(r: Self::Real) -> Self {
        Shippable(F::from_real(r))
    }
}

/// `Complex<f64>`'s layout is `#[repr(C)] { re: f64, im: f64 }`, so
/// `Shippable<Complex<f64>>` is bit-for-bit two contiguous `f64`s — an
/// MPI datatype built as a length-2 contiguous `f64` vector describes it
/// exactly.
unsafe impl Equivalence for Shippable<Complex<f64>> {
    type Out = mpi::datatype::UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        mpi::datatype::UserDatatype::contiguous(2, &f64::equivalent_datatype())
    }
}

/// Same reasoning as the `f64` impl above, for `Complex<f32>`.
unsafe impl Equivalence for Shippable<Complex<f32>> {
    type Out = mpi::datatype::UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        mpi::datatype::UserDatatype::contiguous(2, &f32::equivalent_datatype())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_forwards_to_the_wrapped_field() {
        let a = Shippable(Complex::new(1.0f64, 2.0));
        let b = Shippable(Complex::new(3.0f64, -1.0));
        assert_eq!((a + b).0, Complex::new(4.0, 1.0));
        assert_eq!((a * b).0, a.0 * b.0);
    }

    #[test]
    fn conj_and_magnitude_match_the_wrapped_field() {
        let z = Shippable(Complex::new(3.0f64, 4.0));
        assert_eq!(Field::conj(z).0, Complex::new(3.0, -4.0));
        assert_eq!(Field::magnitude(z), 5.0);
    }
}
