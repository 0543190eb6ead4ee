//! Angular power spectrum coefficients C_ell(chi) from FFTLog mode sums.
//!
//! A radial source term is decomposed into N + 1 complex power laws. Each
//! mode is projected onto the angular basis by an external hypergeometric
//! [`Kernel`], weighted by tabulated basis functions, and the mode sum is
//! integrated over a radial interval with adaptive Gauss–Kronrod quadrature.
//!
//! Layers, leaves first:
//!
//! - [`sum_modes`], [`Projection::sum_modes`] and
//!   [`Projection::sum_modes_quadratic`]:
//!   the mode-summed integrand at a batch of radii.
//! - [`integrate()`]: one coefficient with its error estimate.
//! - [`compute_table`]: a grid of distances and up to three sub-terms per
//!   multipole, checkpointed to disk after every cell so an interrupted run
//!   resumes where it stopped.
//!
//! ```no_run
//! use fftlog_cln::{
//!     compute_table, BasisTable, Config, FnKernel, ModeSpec, RadialGrid, TableRequest, TermKey,
//! };
//! use num_complex::Complex64;
//!
//! # fn main() -> Result<(), fftlog_cln::Error> {
//! let grid = RadialGrid::linspace(10.0, 400.0, 200)?;
//! let modes = ModeSpec::new(0, 10.0, 1e-3, 0.0)?;
//! let basis = BasisTable::from_fn(1, 1, grid.len(), |_, _, _| Complex64::new(1.0, 0.0))?;
//! let kernel = FnKernel::new(
//!     |nu: Complex64, t: f64, _chi: f64, _ell: u32, _t1min: f64| Complex64::new(t, 0.0).powc(-nu),
//!     |_ell: u32, _nu: Complex64| 0.0,
//! );
//! let config = Config::default().with_output_dir("cln");
//! let request = TableRequest {
//!     term: TermKey::new("F2", 0, "dens", 10)?,
//!     distances: &[100.0, 200.0],
//!     grid: &grid,
//!     basis: &basis,
//!     derivative: None,
//!     rmin: 10.0,
//!     rmax: 400.0,
//!     modes: &modes,
//!     biases: &[0.0],
//! };
//! let result = compute_table(&config, &kernel, &request)?;
//! println!("{:?}", result.table.column(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod grid;
pub mod integrate;
pub mod kernel;
pub mod manager;
pub mod modes;
pub mod quadrature;
pub mod table;
pub mod types;

pub(crate) mod algo;
mod utils;

pub use config::{Config, Gauge, POTENTIAL_LABEL};
pub use grid::{BasisSlice, BasisTable, RadialGrid};
pub use integrate::{integrate, BasisPair, Bias};
pub use kernel::{FnKernel, Kernel};
pub use manager::{
    compute_table, compute_table_with, compute_tables, CellDiagnostic, CellFailure, ComputedTable,
    TableLayout, TableRequest, TermKey, MULTIPOLE_FAMILY,
};
pub use modes::{sum_modes, ModeSpec, Projection};
pub use quadrature::{GaussKronrod, Quadrature, QuadratureEstimate, Tolerance};
pub use table::{ArtifactLease, CoefficientTable};
pub use types::{
    CellEstimate, ConfigurationError, Error, IntegrationError, Result, StorageError, SubTerm,
};
