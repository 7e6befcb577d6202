///! The numeric-field capability set the multifrontal engine is generic
///! over: `{+, -, x, /, conjugate, abs, isZero}`, plus the `isHermitian`
///! flag selecting transpose vs. conjugate-transpose at factor/solve
///! boundaries. `Default` is a supertrait rather than an incidental
///! bound: every buffer this crate allocates (`DenseBuffer::zeros`,
///! the wire-payload structs `sparse_all_to_all` fills with
///! `T::default()`) needs a zero element of `F` to start from.
///!
///! A single trait spans both real (`f32`/`f64`) and complex
///! (`Complex<f32>`/`Complex<f64>`) element types. `Complex<T>` has no
///! total order, so `Field` itself does not require `PartialOrd` —
///! anywhere the factorization needs to compare magnitudes (pivot
///! checks, singularity detection) it goes through `Field::Real` via
///! `magnitude()`/`is_near_zero()` instead of comparing `Self` values
///! directly.

use num_complex::Complex;
use num_traits::{Num, NumAssignOps};

pub trait Field: Num + NumAssignOps + Copy + Clone + std::fmt::Debug + Default {
    /// The real, order-comparable scalar underlying this field —
    /// `Self` for real fields, the component type for complex ones.
    type Real: Num + Copy + PartialOrd + std::fmt::Debug + Into<f64>;

    /// The identity for real fields; complex conjugate otherwise.
    fn conj(self) -> Self;
    /// `abs()` for real fields; `norm()` (not `norm_sqr()`) for complex.
    fn magnitude(self) -> Self::Real;
    fn is_near_zero(self, tol: Self::Real) -> bool {
        self.magnitude() <= tol
    }
    fn from_real(r: Self::Real) -> Self;
}

impl Field for f32 {
    type Real = f32;
    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn magnitude(self) -> Self::Real {
        self.abs()
    }
    #[inline]
    fn from_real(r: Self::Real) -> Self {
        r
    }
}

impl Field for f64 {
    type Real = f64;
    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn magnitude(self) -> Self::Real {
        self.abs()
    }
    #[inline]
    fn from_real(r: Self::Real) -> Self {
        r
    }
}

impl Field for Complex<f32> {
    type Real = f32;
    #[inline]
    fn conj(self) -> Self {
        Complex::conj(&self)
    }
    #[inline]
    fn magnitude(self) -> Self::Real {
        self.norm()
    }
    #[inline]
    fn from_real(r: Self::Real) -> Self {
        Complex::new(r, 0.0)
    }
}

impl Field for Complex<f64> {
    type Real = f64;
    #[inline]
    fn conj(self) -> Self {
        Complex::conj(&self)
    }
    #[inline]
    fn magnitude(self) -> Self::Real {
        self.norm()
    }
    #[inline]
    fn from_real(r: Self::Real) -> Self {
        Complex::new(r, 0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn real_conj_is_identity() {
        assert_eq!(Field::conj(3.5f64), 3.5f64);
    }

    #[test]
    fn complex_conj_negates_imaginary_part() {
        let z = Complex::new(1.0f64, 2.0f64);
        assert_eq!(Field::conj(z), Complex::new(1.0, -2.0));
    }

    #[test]
    fn magnitude_matches_norm_and_abs() {
        assert_eq!(Field::magnitude(-4.0f64), 4.0);
        let z = Complex::new(3.0f64, 4.0f64);
        assert_eq!(Field::magnitude(z), 5.0);
    }
}
