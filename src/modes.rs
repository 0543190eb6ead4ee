//! FFTLog mode summation.
//!
//! A radial function is represented as a sum over N + 1 complex power laws
//! with exponents `nu_p = 1 + b + n + i·eta_p + kpow`, where
//! `eta_p = 2π·p / ln(kmax/kmin)` and `p ∈ [-N/2, N/2]`. Each mode is
//! projected with the external [`Kernel`] and weighted by the tabulated basis
//! value interpolated at the requested radii.
//!
//! Conjugate modes `±p` only cancel their imaginary parts once both have been
//! accumulated, so the sum is carried in complex arithmetic to the end and
//! the real part is taken last.

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use num_complex::Complex64;
use num_traits::Zero;

use crate::grid::{BasisSlice, BasisTable, RadialGrid};
use crate::kernel::{threshold_for, Kernel};
use crate::types::ConfigurationError;
use crate::utils::mul_add;

/// Discrete frequency set of the decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSpec {
    n: usize,
    kmax: f64,
    kmin: f64,
    kpow: f64,
    log_ratio: f64,
}

impl ModeSpec {
    /// `n` must be even and `0 < kmin < kmax`.
    pub fn new(n: usize, kmax: f64, kmin: f64, kpow: f64) -> Result<Self, ConfigurationError> {
        if n % 2 != 0 {
            return Err(ConfigurationError::OddModeCount(n));
        }
        if !(kmin.is_finite() && kmin > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "kmin",
                value: kmin,
            });
        }
        if !(kmax.is_finite() && kmax > kmin) {
            return Err(ConfigurationError::InvalidParameter {
                name: "kmax",
                value: kmax,
            });
        }
        if !kpow.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                name: "kpow",
                value: kpow,
            });
        }
        Ok(Self {
            n,
            kmax,
            kmin,
            kpow,
            log_ratio: (kmax / kmin).ln(),
        })
    }

    /// N, the number of modes minus one.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn mode_count(&self) -> usize {
        self.n + 1
    }

    pub fn kmax(&self) -> f64 {
        self.kmax
    }

    pub fn kmin(&self) -> f64 {
        self.kmin
    }

    pub fn kpow(&self) -> f64 {
        self.kpow
    }

    /// Frequencies `-N/2..=N/2`.
    pub fn frequencies(&self) -> RangeInclusive<i64> {
        let half = (self.n / 2) as i64;
        -half..=half
    }

    /// eta_p = 2π·p / ln(kmax/kmin).
    #[inline]
    pub fn eta(&self, p: i64) -> f64 {
        2.0 * PI * p as f64 / self.log_ratio
    }

    /// nu_p = 1 + b + n + i·eta_p + kpow.
    #[inline]
    pub fn exponent(&self, p: i64, bias: f64, shift: f64) -> Complex64 {
        Complex64::new(1.0 + bias + shift + self.kpow, self.eta(p))
    }

    /// Table row holding frequency `p`.
    #[inline]
    fn row(&self, p: i64) -> usize {
        (p + (self.n / 2) as i64) as usize
    }
}

/// Everything that stays fixed while the radius varies: kernel, radial grid,
/// frequency set, distance and multipole.
pub struct Projection<'a, K: ?Sized> {
    kernel: &'a K,
    grid: &'a RadialGrid,
    modes: &'a ModeSpec,
    chi: f64,
    ell: u32,
}

impl<'a, K: Kernel + ?Sized> Projection<'a, K> {
    pub fn new(
        kernel: &'a K,
        grid: &'a RadialGrid,
        modes: &'a ModeSpec,
        chi: f64,
        ell: u32,
    ) -> Self {
        Self {
            kernel,
            grid,
            modes,
            chi,
            ell,
        }
    }

    pub fn chi(&self) -> f64 {
        self.chi
    }

    pub fn ell(&self) -> u32 {
        self.ell
    }

    pub fn modes(&self) -> &ModeSpec {
        self.modes
    }

    /// Check that `basis` matches the frequency set and the radial grid.
    pub fn check_slice(&self, basis: &BasisSlice<'_>) -> Result<(), ConfigurationError> {
        if basis.mode_count() != self.modes.mode_count() {
            return Err(ConfigurationError::ShapeMismatch {
                what: "basis table modes",
                expected: self.modes.mode_count(),
                actual: basis.mode_count(),
            });
        }
        if basis.sample_count() != self.grid.len() {
            return Err(ConfigurationError::ShapeMismatch {
                what: "basis table radial samples",
                expected: self.grid.len(),
                actual: basis.sample_count(),
            });
        }
        Ok(())
    }

    /// Complex mode sum at each radius, before the real part is taken.
    pub fn sum_modes_complex(
        &self,
        r: &[f64],
        basis: BasisSlice<'_>,
        bias: f64,
        shift: f64,
    ) -> Result<Vec<Complex64>, ConfigurationError> {
        self.check_slice(&basis)?;
        let mut acc = vec![Complex64::zero(); r.len()];
        self.accumulate(r, basis, bias, shift, &mut acc);
        Ok(acc)
    }

    /// Mode sum for a single bias value.
    pub fn sum_modes(
        &self,
        r: &[f64],
        basis: BasisSlice<'_>,
        bias: f64,
        shift: f64,
    ) -> Result<Vec<f64>, ConfigurationError> {
        let acc = self.sum_modes_complex(r, basis, bias, shift)?;
        Ok(acc.into_iter().map(|z| z.re).collect())
    }

    /// Mode sums over every bias value, one table slice per bias, added
    /// elementwise.
    pub fn sum_modes_quadratic(
        &self,
        r: &[f64],
        table: &BasisTable,
        biases: &[f64],
        shift: f64,
    ) -> Result<Vec<f64>, ConfigurationError> {
        if biases.len() != table.bias_count() {
            return Err(ConfigurationError::BiasCount(
                biases.len(),
                table.bias_count(),
            ));
        }
        table.check_shape(self.modes.mode_count(), self.grid.len())?;
        let mut out = vec![0.0; r.len()];
        self.accumulate_quadratic(r, table, biases, shift, &mut out);
        Ok(out)
    }

    /// Shape-unchecked single-bias sum, real part written into `out`.
    pub(crate) fn evaluate_into(
        &self,
        r: &[f64],
        basis: BasisSlice<'_>,
        bias: f64,
        shift: f64,
        out: &mut [f64],
    ) {
        let mut acc = vec![Complex64::zero(); r.len()];
        self.accumulate(r, basis, bias, shift, &mut acc);
        for (o, z) in out.iter_mut().zip(acc) {
            *o = z.re;
        }
    }

    /// Shape-unchecked bias-summed evaluation, written into `out`.
    pub(crate) fn accumulate_quadratic(
        &self,
        r: &[f64],
        table: &BasisTable,
        biases: &[f64],
        shift: f64,
        out: &mut [f64],
    ) {
        out.iter_mut().for_each(|o| *o = 0.0);
        let mut acc = vec![Complex64::zero(); r.len()];
        for (index, &bias) in biases.iter().enumerate() {
            let Some(basis) = table.slice(index) else {
                break;
            };
            acc.iter_mut().for_each(|z| *z = Complex64::zero());
            self.accumulate(r, basis, bias, shift, &mut acc);
            for (o, z) in out.iter_mut().zip(&acc) {
                *o += z.re;
            }
        }
    }

    fn accumulate(
        &self,
        r: &[f64],
        basis: BasisSlice<'_>,
        bias: f64,
        shift: f64,
        acc: &mut [Complex64],
    ) {
        let brackets = self.grid.brackets(r);
        let t: Vec<f64> = r.iter().map(|&x| x / self.chi).collect();

        for p in self.modes.frequencies() {
            let nu = self.modes.exponent(p, bias, shift);
            let t1min = threshold_for(self.kernel, self.ell, nu);
            let f = basis.mode(self.modes.row(p));

            for ((z, &ti), bracket) in acc.iter_mut().zip(&t).zip(&brackets) {
                let k = self.kernel.evaluate(nu, ti, self.chi, self.ell, t1min);
                *z = mul_add(k, bracket.apply(f), *z);
            }
        }
    }
}

/// Mode sum at `r` for one distance and multipole, with the frequency set
/// given by its raw parameters.
///
/// Builds a [`ModeSpec`] and a [`Projection`] and evaluates
/// [`Projection::sum_modes`]; `shift` is the integer exponent shift `n`.
#[allow(clippy::too_many_arguments)]
pub fn sum_modes<K: Kernel + ?Sized>(
    kernel: &K,
    r: &[f64],
    chi: f64,
    ell: u32,
    shift: i32,
    grid: &RadialGrid,
    basis: BasisSlice<'_>,
    n: usize,
    kmax: f64,
    kmin: f64,
    kpow: f64,
    bias: f64,
) -> Result<Vec<f64>, ConfigurationError> {
    let modes = ModeSpec::new(n, kmax, kmin, kpow)?;
    Projection::new(kernel, grid, &modes, chi, ell).sum_modes(r, basis, bias, f64::from(shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::interp::Bracket;
    use crate::kernel::FnKernel;
    use std::cell::RefCell;

    fn power_kernel() -> FnKernel<
        impl Fn(Complex64, f64, f64, u32, f64) -> Complex64,
        impl Fn(u32, Complex64) -> f64,
    > {
        FnKernel::new(
            |nu: Complex64, t: f64, _chi: f64, _ell: u32, _t1min: f64| {
                Complex64::new(t, 0.0).powc(-nu * 0.5)
            },
            |_ell: u32, _nu: Complex64| 0.0,
        )
    }

    #[test]
    fn mode_spec_validation() {
        assert_eq!(
            ModeSpec::new(3, 10.0, 1.0, 0.0),
            Err(ConfigurationError::OddModeCount(3))
        );
        assert!(ModeSpec::new(4, 1.0, 1.0, 0.0).is_err());
        assert!(ModeSpec::new(4, 10.0, 0.0, 0.0).is_err());
        let modes = ModeSpec::new(4, 10.0, 0.1, -0.5).unwrap();
        assert_eq!(modes.mode_count(), 5);
        assert_eq!(modes.frequencies().collect::<Vec<_>>(), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn exponent_layout() {
        let modes = ModeSpec::new(2, 100.0, 1.0, 0.25).unwrap();
        let nu = modes.exponent(1, 0.5, -2.0);
        assert!((nu.re - (1.0 + 0.5 - 2.0 + 0.25)).abs() < 1e-15);
        assert!((nu.im - 2.0 * PI / 100.0_f64.ln()).abs() < 1e-15);
        assert_eq!(modes.exponent(-1, 0.5, -2.0).im, -nu.im);
    }

    #[test]
    fn single_mode_is_hand_computable() {
        let grid = RadialGrid::new(vec![0.0, 50.0, 100.0, 400.0]).unwrap();
        let modes = ModeSpec::new(0, 10.0, 0.01, 0.3).unwrap();
        let basis = BasisTable::from_fn(1, 1, 4, |_, _, _| Complex64::new(2.5, -0.5)).unwrap();
        let kernel = power_kernel();
        let chi = 200.0;
        let projection = Projection::new(&kernel, &grid, &modes, chi, 3);

        let r = [10.0, 75.0, 250.0];
        let bias = 0.7;
        let got = projection
            .sum_modes(&r, basis.slice(0).unwrap(), bias, -2.0)
            .unwrap();

        let nu = Complex64::new(1.0 + bias - 2.0 + 0.3, 0.0);
        for (g, &ri) in got.iter().zip(&r) {
            let k = kernel.evaluate(nu, ri / chi, chi, 3, 0.0);
            let expected = (k * Complex64::new(2.5, -0.5)).re;
            assert!((g - expected).abs() <= 1e-14 * expected.abs(), "{g} vs {expected}");
        }
    }

    #[test]
    fn free_sum_modes_matches_projection() {
        let grid = RadialGrid::new(vec![0.0, 50.0, 100.0, 400.0]).unwrap();
        let basis =
            BasisTable::from_fn(1, 1, 4, |_, _, s| Complex64::new(1.0 + s as f64, 0.5)).unwrap();
        let kernel = power_kernel();
        let r = [10.0, 75.0, 250.0];

        let got = sum_modes(
            &kernel,
            &r,
            200.0,
            3,
            -2,
            &grid,
            basis.slice(0).unwrap(),
            0,
            10.0,
            0.01,
            0.3,
            1.2,
        )
        .unwrap();

        // N = 0: a single real exponent nu = 1 + 1.2 - 2 + 0.3.
        let nu = Complex64::new(0.5, 0.0);
        for (g, &ri) in got.iter().zip(&r) {
            let f = Bracket::locate(grid.as_slice(), ri).apply(basis.slice(0).unwrap().mode(0));
            let expected = (kernel.evaluate(nu, ri / 200.0, 200.0, 3, 0.0) * f).re;
            assert!((g - expected).abs() <= 1e-14 * expected.abs(), "{g} vs {expected}");
        }

        let slice = basis.slice(0).unwrap();
        assert_eq!(
            sum_modes(&kernel, &r, 200.0, 3, 0, &grid, slice, 1, 10.0, 0.01, 0.0, 0.0),
            Err(ConfigurationError::OddModeCount(1))
        );
    }

    #[test]
    fn conjugate_modes_cancel_imaginary_part() {
        let grid = RadialGrid::linspace(1.0, 300.0, 40).unwrap();
        let kernel = power_kernel();
        for n in [2usize, 8, 32] {
            let modes = ModeSpec::new(n, 10.0, 1e-3, -0.4).unwrap();
            let half = (n / 2) as i64;
            let basis = BasisTable::from_fn(1, n + 1, grid.len(), |_, m, s| {
                let p = m as i64 - half;
                let x = grid.as_slice()[s];
                let z = Complex64::new(
                    (x * 0.01).cos() / (1.0 + p.abs() as f64),
                    0.3 * (p as f64) * (x * 0.02).sin(),
                );
                // f(-p) = conj f(p); p = 0 stays real.
                if p == 0 {
                    Complex64::new(z.re, 0.0)
                } else {
                    z
                }
            })
            .unwrap();
            let projection = Projection::new(&kernel, &grid, &modes, 150.0, 2);
            let r: Vec<f64> = (0..25).map(|i| 5.0 + 11.7 * i as f64).collect();
            let acc = projection
                .sum_modes_complex(&r, basis.slice(0).unwrap(), 0.1, 0.0)
                .unwrap();

            let scale: f64 = r
                .iter()
                .map(|&ri| {
                    modes
                        .frequencies()
                        .map(|p| {
                            let nu = modes.exponent(p, 0.1, 0.0);
                            kernel.evaluate(nu, ri / 150.0, 150.0, 2, 0.0).norm()
                        })
                        .sum::<f64>()
                })
                .fold(0.0, f64::max);
            for z in &acc {
                assert!(z.im.abs() < 1e-10 * scale, "N={n}: residual {}", z.im);
            }
        }
    }

    #[test]
    fn quadratic_sums_each_bias() {
        let grid = RadialGrid::linspace(1.0, 100.0, 10).unwrap();
        let modes = ModeSpec::new(2, 5.0, 0.5, 0.0).unwrap();
        let table = BasisTable::from_fn(3, 3, grid.len(), |b, m, s| {
            Complex64::new(1.0 + b as f64 + 0.1 * m as f64, 0.01 * s as f64)
        })
        .unwrap();
        let kernel = power_kernel();
        let projection = Projection::new(&kernel, &grid, &modes, 50.0, 1);
        let biases = [0.1, 0.4, 0.9];
        let r = [3.0, 30.0, 60.0];

        let total = projection
            .sum_modes_quadratic(&r, &table, &biases, 0.0)
            .unwrap();
        let mut expected = [0.0; 3];
        for (i, &b) in biases.iter().enumerate() {
            let single = projection
                .sum_modes(&r, table.slice(i).unwrap(), b, 0.0)
                .unwrap();
            for (e, s) in expected.iter_mut().zip(single) {
                *e += s;
            }
        }
        for (t, e) in total.iter().zip(expected) {
            assert!((t - e).abs() <= 1e-13 * e.abs().max(1.0));
        }

        assert_eq!(
            projection.sum_modes_quadratic(&r, &table, &biases[..2], 0.0),
            Err(ConfigurationError::BiasCount(2, 3))
        );
    }

    #[test]
    fn threshold_passed_for_high_multipoles() {
        let seen = RefCell::new(Vec::new());
        let kernel = FnKernel::new(
            |_nu: Complex64, _t: f64, _chi: f64, _ell: u32, t1min: f64| {
                seen.borrow_mut().push(t1min);
                Complex64::new(1.0, 0.0)
            },
            |ell: u32, nu: Complex64| ell as f64 * 0.5 + nu.im.abs(),
        );
        let grid = RadialGrid::linspace(0.0, 1.0, 3).unwrap();
        let modes = ModeSpec::new(0, 2.0, 1.0, 0.0).unwrap();
        let basis = BasisTable::from_fn(1, 1, 3, |_, _, _| Complex64::new(1.0, 0.0)).unwrap();

        Projection::new(&kernel, &grid, &modes, 1.0, 4)
            .sum_modes(&[0.5], basis.slice(0).unwrap(), 0.0, 0.0)
            .unwrap();
        Projection::new(&kernel, &grid, &modes, 1.0, 10)
            .sum_modes(&[0.5], basis.slice(0).unwrap(), 0.0, 0.0)
            .unwrap();
        assert_eq!(*seen.borrow(), vec![0.0, 5.0]);
    }

    #[test]
    fn mismatched_slice_is_rejected() {
        let grid = RadialGrid::linspace(0.0, 1.0, 3).unwrap();
        let modes = ModeSpec::new(2, 2.0, 1.0, 0.0).unwrap();
        let basis = BasisTable::from_fn(1, 1, 3, |_, _, _| Complex64::new(1.0, 0.0)).unwrap();
        let kernel = power_kernel();
        let projection = Projection::new(&kernel, &grid, &modes, 1.0, 2);
        assert!(matches!(
            projection.sum_modes(&[0.5], basis.slice(0).unwrap(), 0.0, 0.0),
            Err(ConfigurationError::ShapeMismatch { expected: 3, actual: 1, .. })
        ));
    }
}
