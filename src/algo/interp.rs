//! Piecewise-linear interpolation on a sorted abscissa.
//!
//! Follows `numpy.interp`: values outside the abscissa range are clamped to
//! the first/last ordinate, a sample sitting exactly on a node returns
//! that node's ordinate unchanged, and a NaN sample yields NaN.

use num_complex::Complex64;

use crate::utils::mul_add_scalar;

/// Location of one sample inside the abscissa: ordinate
/// `f[lo] + (f[lo + 1] - f[lo]) * weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    lo: usize,
    weight: f64,
}

impl Bracket {
    /// Locate `r` in the strictly increasing `xs` (at least two entries).
    pub(crate) fn locate(xs: &[f64], r: f64) -> Self {
        let last = xs.len() - 1;
        if r.is_nan() {
            return Self {
                lo: 0,
                weight: f64::NAN,
            };
        }
        if r <= xs[0] {
            return Self { lo: 0, weight: 0.0 };
        }
        if r >= xs[last] {
            return Self {
                lo: last,
                weight: 0.0,
            };
        }
        // xs[0] < r < xs[last], so at least one and at most `last` nodes are <= r.
        let lo = xs.partition_point(|&x| x <= r) - 1;
        let weight = (r - xs[lo]) / (xs[lo + 1] - xs[lo]);
        Self { lo, weight }
    }

    #[inline]
    pub(crate) fn apply(self, f: &[Complex64]) -> Complex64 {
        let left = f[self.lo];
        if self.weight == 0.0 {
            left
        } else {
            mul_add_scalar(f[self.lo + 1] - left, self.weight, left)
        }
    }
}
