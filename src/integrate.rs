//! One coefficient: the mode-summed integrand integrated over `[rmin, rmax]`.

use tracing::trace;

use crate::algo::constants::FOUR_PI;
use crate::grid::{BasisSlice, BasisTable};
use crate::kernel::Kernel;
use crate::modes::Projection;
use crate::quadrature::{Quadrature, Tolerance};
use crate::types::{CellEstimate, ConfigurationError, SubTerm};

/// Primary basis table and, for multipole terms, its derivative companion.
#[derive(Debug, Clone, Copy)]
pub struct BasisPair<'a> {
    pub primary: &'a BasisTable,
    pub derivative: Option<&'a BasisTable>,
}

impl<'a> BasisPair<'a> {
    pub fn new(primary: &'a BasisTable, derivative: Option<&'a BasisTable>) -> Self {
        Self {
            primary,
            derivative,
        }
    }

    /// Table read for `sub_term`.
    pub fn select(&self, sub_term: SubTerm) -> Result<&'a BasisTable, ConfigurationError> {
        if sub_term.uses_derivative_basis() {
            self.derivative
                .ok_or(ConfigurationError::MissingDerivativeBasis)
        } else {
            Ok(self.primary)
        }
    }
}

/// Bias handling of a term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bias<'a> {
    /// One bias value; the table's first bias slice is used.
    Single(f64),
    /// One bias per table slice, contributions summed.
    Summed(&'a [f64]),
}

#[derive(Clone, Copy)]
enum Integrand<'a> {
    Single(BasisSlice<'a>, f64),
    Summed(&'a BasisTable, &'a [f64]),
}

/// Check the interval bounds.
pub(crate) fn check_interval(rmin: f64, rmax: f64) -> Result<(), ConfigurationError> {
    if rmin.is_finite() && rmax.is_finite() && rmin < rmax {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidInterval { rmin, rmax })
    }
}

/// Integrate one sub-term over `[rmin, rmax]` and divide by 4π.
///
/// [`SubTerm::Derivative`] reads the derivative table with the monopole
/// shift; the other sub-terms read the primary table with their own shift.
#[allow(clippy::too_many_arguments)]
pub fn integrate<Q, K>(
    quadrature: &Q,
    projection: &Projection<'_, K>,
    sub_term: SubTerm,
    basis: BasisPair<'_>,
    bias: Bias<'_>,
    rmin: f64,
    rmax: f64,
    tol: Tolerance,
) -> Result<CellEstimate, ConfigurationError>
where
    Q: Quadrature,
    K: Kernel + ?Sized,
{
    check_interval(rmin, rmax)?;
    let table = basis.select(sub_term)?;
    let shift = sub_term.exponent_shift();

    let integrand = match bias {
        Bias::Single(b) => {
            let slice = table.slice(0).ok_or(ConfigurationError::BiasCount(1, 0))?;
            projection.check_slice(&slice)?;
            Integrand::Single(slice, b)
        }
        Bias::Summed(biases) => {
            if biases.len() != table.bias_count() {
                return Err(ConfigurationError::BiasCount(
                    biases.len(),
                    table.bias_count(),
                ));
            }
            for index in 0..table.bias_count() {
                if let Some(slice) = table.slice(index) {
                    projection.check_slice(&slice)?;
                }
            }
            Integrand::Summed(table, biases)
        }
    };

    let raw = quadrature.integrate(
        |r: &[f64], out: &mut [f64]| match integrand {
            Integrand::Single(slice, b) => projection.evaluate_into(r, slice, b, shift, out),
            Integrand::Summed(table, biases) => {
                projection.accumulate_quadratic(r, table, biases, shift, out)
            }
        },
        rmin,
        rmax,
        tol,
    );

    trace!(
        chi = projection.chi(),
        ell = projection.ell(),
        ?sub_term,
        value = raw.value,
        error = raw.error,
        evaluations = raw.evaluations,
        "integral done"
    );

    Ok(CellEstimate {
        value: raw.value / FOUR_PI,
        error: raw.error / FOUR_PI,
        evaluations: raw.evaluations,
        converged: raw.converged,
    })
}
