//! Fused complex arithmetic used by the inner summation loops.

use num_complex::Complex64;

/// Fused multiply-add for Complex: `s * a + b`.
///
/// Written out component-wise so every real product that can be fused is,
/// rather than going through `Complex::mul_add`.
#[inline]
pub(crate) fn mul_add(s: Complex64, a: Complex64, b: Complex64) -> Complex64 {
    // re = s.re*a.re - s.im*a.im + b.re
    // im = s.re*a.im + s.im*a.re + b.im
    Complex64::new(
        s.re.mul_add(a.re, b.re) - s.im * a.im,
        s.re.mul_add(a.im, s.im.mul_add(a.re, b.im)),
    )
}

/// Fused multiply-add for Complex × scalar: `s * a + b`.
#[inline]
pub(crate) fn mul_add_scalar(s: Complex64, a: f64, b: Complex64) -> Complex64 {
    Complex64::new(s.re.mul_add(a, b.re), s.im.mul_add(a, b.im))
}
