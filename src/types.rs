//! Core types shared by the summation, integration and table layers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Which physical sub-term of a multipole is being integrated.
///
/// The exponent shift `n` enters every mode exponent as
/// `nu_p = 1 + b + n + i·eta_p + kpow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubTerm {
    /// n = 0, primary basis table.
    Monopole,
    /// n = -2, primary basis table.
    ShiftedDown,
    /// n = +2 sentinel: routes to the derivative basis table and is
    /// integrated with the monopole shift.
    Derivative,
}

impl SubTerm {
    /// Data columns in table order: C0, C₋₂, C₊₂.
    pub const ALL: [SubTerm; 3] = [SubTerm::Monopole, SubTerm::ShiftedDown, SubTerm::Derivative];

    /// Nominal exponent shift carried by the sub-term label.
    pub fn nominal_shift(self) -> i32 {
        match self {
            SubTerm::Monopole => 0,
            SubTerm::ShiftedDown => -2,
            SubTerm::Derivative => 2,
        }
    }

    /// Shift actually passed to the mode summation.
    pub fn exponent_shift(self) -> f64 {
        match self {
            SubTerm::Monopole | SubTerm::Derivative => 0.0,
            SubTerm::ShiftedDown => -2.0,
        }
    }

    /// Whether the derivative basis table is read instead of the primary one.
    pub fn uses_derivative_basis(self) -> bool {
        matches!(self, SubTerm::Derivative)
    }

    /// Data column index (1-based, column 0 holds chi).
    pub fn column(self) -> usize {
        match self {
            SubTerm::Monopole => 1,
            SubTerm::ShiftedDown => 2,
            SubTerm::Derivative => 3,
        }
    }
}

/// Outcome of one adaptive integral, normalised by 4π.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellEstimate {
    /// Integral value divided by 4π.
    pub value: f64,
    /// Quadrature error estimate on `value`.
    pub error: f64,
    /// Integrand evaluations spent.
    pub evaluations: usize,
    /// Whether the requested tolerance was met within the budget.
    pub converged: bool,
}

/// Malformed inputs, rejected before any integration starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// The FFTLog mode count N is odd.
    #[error("mode count N = {0} must be even")]
    OddModeCount(usize),
    /// No distances were requested.
    #[error("distance list must not be empty")]
    EmptyDistances,
    /// `rmin >= rmax`, or a bound is not finite.
    #[error("integration interval [{rmin}, {rmax}] must satisfy rmin < rmax with finite bounds")]
    InvalidInterval { rmin: f64, rmax: f64 },
    /// The same distance was requested twice.
    #[error("distance {0} appears more than once")]
    DuplicateDistance(f64),
    /// A requested distance is NaN, infinite, zero or negative.
    #[error("distance at index {index} is not finite and positive: {value}")]
    NonFiniteDistance { index: usize, value: f64 },
    /// Fewer than two radial samples.
    #[error("radial grid needs at least two samples, got {0}")]
    GridTooShort(usize),
    /// Radial samples are not finite and strictly increasing; carries the
    /// first offending index.
    #[error("radial grid is not strictly increasing at index {0}")]
    GridNotIncreasing(usize),
    /// A table dimension does not match the grid, the mode count or the
    /// supplied data length.
    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A term label is empty or contains characters outside `[A-Za-z0-9-]`.
    #[error("label {0:?} must be non-empty ASCII alphanumerics or '-'")]
    InvalidLabel(String),
    /// A multipole term was requested without a derivative basis table.
    #[error("multipole table requires a derivative basis table")]
    MissingDerivativeBasis,
    /// Supplied bias values versus the number the term needs.
    #[error("{0} bias values supplied, the term needs {1}")]
    BiasCount(usize, usize),
    /// A numeric parameter is out of range.
    #[error("parameter `{name}` is invalid: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    /// The configuration document is not valid TOML for [`crate::Config`].
    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

/// Per-cell integration failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// The evaluation budget ran out before the tolerance was met.
    #[error(
        "quadrature did not converge after {evaluations} evaluations \
         (value {value:e}, error {error:e})"
    )]
    NotConverged {
        value: f64,
        error: f64,
        evaluations: usize,
    },
    /// The integral came out NaN or infinite.
    #[error("integral is not finite: {value}")]
    NonFinite { value: f64 },
}

/// Artifact could not be read, parsed or written.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading, writing or renaming an artifact failed.
    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A line holds something other than finite numbers.
    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// A row has the wrong number of columns for the table layout.
    #[error("{path}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    /// Two rows share a distance.
    #[error("{path}: distance {chi} appears in more than one row")]
    DuplicateRow { path: PathBuf, chi: f64 },
    /// Another writer in this process holds the artifact.
    #[error("{0} already has an active writer")]
    ArtifactBusy(PathBuf),
}

/// Error type for table computation.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input; nothing was computed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A single integral failed.
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    /// An artifact could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
