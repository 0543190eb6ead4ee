//! Kernel evaluator interface.
//!
//! The closed-form projection of a single power-law mode onto the angular
//! basis lives outside this crate; callers plug it in through [`Kernel`].

use num_complex::Complex64;

/// Projection kernel for one complex power-law exponent.
pub trait Kernel {
    /// Kernel value at exponent `nu`, ratio `t = r / chi`, distance `chi`,
    /// multipole `ell` and minimal-argument threshold `t1min`.
    fn evaluate(&self, nu: Complex64, t: f64, chi: f64, ell: u32, t1min: f64) -> Complex64;

    /// Minimal-argument threshold for `(ell, nu)`.
    ///
    /// Only queried for `ell >= 5`; smaller multipoles use a threshold of 0.
    fn threshold(&self, ell: u32, nu: Complex64) -> f64;
}

impl<K: Kernel + ?Sized> Kernel for &K {
    #[inline]
    fn evaluate(&self, nu: Complex64, t: f64, chi: f64, ell: u32, t1min: f64) -> Complex64 {
        (**self).evaluate(nu, t, chi, ell, t1min)
    }

    #[inline]
    fn threshold(&self, ell: u32, nu: Complex64) -> f64 {
        (**self).threshold(ell, nu)
    }
}

/// Adapts a pair of closures into a [`Kernel`].
#[derive(Clone)]
pub struct FnKernel<E, T> {
    eval: E,
    threshold: T,
}

impl<E, T> FnKernel<E, T>
where
    E: Fn(Complex64, f64, f64, u32, f64) -> Complex64,
    T: Fn(u32, Complex64) -> f64,
{
    pub fn new(eval: E, threshold: T) -> Self {
        Self { eval, threshold }
    }
}

impl<E, T> Kernel for FnKernel<E, T>
where
    E: Fn(Complex64, f64, f64, u32, f64) -> Complex64,
    T: Fn(u32, Complex64) -> f64,
{
    #[inline]
    fn evaluate(&self, nu: Complex64, t: f64, chi: f64, ell: u32, t1min: f64) -> Complex64 {
        (self.eval)(nu, t, chi, ell, t1min)
    }

    #[inline]
    fn threshold(&self, ell: u32, nu: Complex64) -> f64 {
        (self.threshold)(ell, nu)
    }
}

/// Smallest multipole for which the kernel threshold is queried.
pub(crate) const THRESHOLD_MIN_ELL: u32 = 5;

/// `kernel.threshold(ell, nu)` for `ell >= 5`, else 0.
#[inline]
pub(crate) fn threshold_for<K: Kernel + ?Sized>(kernel: &K, ell: u32, nu: Complex64) -> f64 {
    if ell >= THRESHOLD_MIN_ELL {
        kernel.threshold(ell, nu)
    } else {
        0.0
    }
}
