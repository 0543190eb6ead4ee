//! Gauss–Kronrod G7/K15 rule on a single interval.

use crate::algo::constants::{WG, WGK, XGK};

/// Integrand samples per interval.
pub(crate) const POINTS: usize = 15;

/// Append the 15 abscissae of `[a, b]` to `out`.
///
/// Layout: centre first, then `(c - h·x_j, c + h·x_j)` for each `XGK[j]`,
/// `j = 0..7`. [`apply`] expects samples in the same order.
pub(crate) fn push_nodes(a: f64, b: f64, out: &mut Vec<f64>) {
    let c = 0.5 * (a + b);
    let h = 0.5 * (b - a);
    out.push(c);
    for x in &XGK[..7] {
        out.push(c - h * x);
        out.push(c + h * x);
    }
}

/// Kronrod and embedded Gauss estimates of the integral over `[a, b]`.
pub(crate) fn apply(a: f64, b: f64, fx: &[f64]) -> (f64, f64) {
    debug_assert_eq!(fx.len(), POINTS);
    let h = 0.5 * (b - a);
    let centre = fx[0];
    let mut kronrod = WGK[7] * centre;
    let mut gauss = WG[3] * centre;
    for j in 0..7 {
        let pair = fx[1 + 2 * j] + fx[2 + 2 * j];
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    (kronrod * h, gauss * h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(a: f64, b: f64, f: impl Fn(f64) -> f64) -> (f64, f64) {
        let mut x = Vec::new();
        push_nodes(a, b, &mut x);
        let fx: Vec<f64> = x.iter().map(|&v| f(v)).collect();
        apply(a, b, &fx)
    }

    #[test]
    fn weights_sum_to_two() {
        let k: f64 = WGK[7] + 2.0 * WGK[..7].iter().sum::<f64>();
        let g: f64 = WG[3] + 2.0 * (WG[0] + WG[1] + WG[2]);
        assert!((k - 2.0).abs() < 1e-15);
        assert!((g - 2.0).abs() < 1e-15);
    }

    #[test]
    fn gauss_exact_to_degree_13() {
        // ∫_0^2 x^13 dx = 2^14 / 14
        let (k, g) = rule(0.0, 2.0, |x| x.powi(13));
        let exact = 2.0_f64.powi(14) / 14.0;
        assert!((g - exact).abs() < 1e-12 * exact);
        assert!((k - exact).abs() < 1e-12 * exact);
    }

    #[test]
    fn kronrod_exact_to_degree_22() {
        // ∫_{-1}^{1} x^22 dx = 2/23; the Gauss rule is not exact here.
        let (k, g) = rule(-1.0, 1.0, |x| x.powi(22));
        assert!((k - 2.0 / 23.0).abs() < 1e-14);
        assert!((g - 2.0 / 23.0).abs() > 1e-6);
    }
}
