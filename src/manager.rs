//! Resumable computation of coefficient tables.
//!
//! [`compute_table`] walks the requested distances, integrates every cell
//! that is still zero (or every cell when `force` is set), and persists the
//! whole table after each cell. Killing the process at any point loses at
//! most the cell in flight.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use num_traits::Zero;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::grid::{BasisTable, RadialGrid};
use crate::integrate::{check_interval, integrate, BasisPair, Bias};
use crate::kernel::Kernel;
use crate::modes::{ModeSpec, Projection};
use crate::quadrature::{GaussKronrod, Quadrature, Tolerance};
use crate::table::{ArtifactLease, CoefficientTable};
use crate::types::{ConfigurationError, IntegrationError, Result, StorageError, SubTerm};

/// Term family integrated into the 4-column multipole layout.
pub const MULTIPOLE_FAMILY: &str = "FG2";

/// Column layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableLayout {
    /// `[chi, C0]`.
    Monopole,
    /// `[chi, C0, C₋₂, C₊₂]`.
    Multipole,
}

impl TableLayout {
    /// Sub-terms in column order.
    pub fn sub_terms(self) -> &'static [SubTerm] {
        match self {
            TableLayout::Monopole => &SubTerm::ALL[..1],
            TableLayout::Multipole => &SubTerm::ALL,
        }
    }

    pub fn data_columns(self) -> usize {
        self.sub_terms().len()
    }
}

/// Identifies one artifact: term family, sub-term index, line-of-sight
/// label and multipole.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermKey {
    which: String,
    qterm: u32,
    lterm: String,
    ell: u32,
}

fn check_label(label: &str) -> std::result::Result<(), ConfigurationError> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidLabel(label.to_string()))
    }
}

impl TermKey {
    /// `which` and `lterm` must be non-empty ASCII alphanumerics or `-`, so
    /// distinct keys never map to the same file name.
    pub fn new(
        which: &str,
        qterm: u32,
        lterm: &str,
        ell: u32,
    ) -> std::result::Result<Self, ConfigurationError> {
        check_label(which)?;
        check_label(lterm)?;
        Ok(Self {
            which: which.to_string(),
            qterm,
            lterm: lterm.to_string(),
            ell,
        })
    }

    pub fn which(&self) -> &str {
        &self.which
    }

    pub fn qterm(&self) -> u32 {
        self.qterm
    }

    pub fn lterm(&self) -> &str {
        &self.lterm
    }

    pub fn ell(&self) -> u32 {
        self.ell
    }

    /// Same term at another multipole.
    pub fn at_ell(&self, ell: u32) -> Self {
        Self {
            ell,
            ..self.clone()
        }
    }

    pub fn layout(&self) -> TableLayout {
        if self.which == MULTIPOLE_FAMILY {
            TableLayout::Multipole
        } else {
            TableLayout::Monopole
        }
    }

    /// Single-column terms with `qterm == 0` sum over bias values.
    pub fn is_bias_summed(&self) -> bool {
        self.layout() == TableLayout::Monopole && self.qterm == 0
    }

    /// `Cln_{which}[_qterm{q}]_{lterm}_ell{ell}.txt`, the qterm part present
    /// iff `q != 0`.
    ///
    /// Multipole (`FG2`) tables keep the family in the name as well. Older
    /// pipelines wrote them as `Cln_{lterm}_ell{ell}.txt`; such files are not
    /// picked up for resuming and must be renamed first.
    pub fn file_name(&self) -> String {
        if self.qterm == 0 {
            format!("Cln_{}_{}_ell{}.txt", self.which, self.lterm, self.ell)
        } else {
            format!(
                "Cln_{}_qterm{}_{}_ell{}.txt",
                self.which, self.qterm, self.lterm, self.ell
            )
        }
    }

    pub fn artifact_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.file_name())
    }
}

/// Inputs for one table.
#[derive(Debug, Clone)]
pub struct TableRequest<'a> {
    pub term: TermKey,
    /// Distances chi, finite, positive and distinct. Rows are keyed by value.
    pub distances: &'a [f64],
    /// Radial samples the basis tables are tabulated on.
    pub grid: &'a RadialGrid,
    pub basis: &'a BasisTable,
    /// Required by the multipole layout.
    pub derivative: Option<&'a BasisTable>,
    /// Integration interval, `rmin < rmax`.
    pub rmin: f64,
    pub rmax: f64,
    pub modes: &'a ModeSpec,
    /// One value, or one per basis bias slice for bias-summed terms.
    pub biases: &'a [f64],
}

impl TableRequest<'_> {
    /// Reject malformed requests before any work starts.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.distances.is_empty() {
            return Err(ConfigurationError::EmptyDistances);
        }
        for (index, &value) in self.distances.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::NonFiniteDistance { index, value });
            }
        }
        let mut seen = CoefficientTable::new(0);
        if self.distances.len() != seen.ensure_rows(self.distances) {
            let dup = self
                .distances
                .iter()
                .enumerate()
                .find(|&(i, chi)| self.distances[..i].contains(chi))
                .map_or(f64::NAN, |(_, &chi)| chi);
            return Err(ConfigurationError::DuplicateDistance(dup));
        }
        check_interval(self.rmin, self.rmax)?;

        let modes = self.modes.mode_count();
        let samples = self.grid.len();
        self.basis.check_shape(modes, samples)?;
        if self.term.layout() == TableLayout::Multipole {
            self.derivative
                .ok_or(ConfigurationError::MissingDerivativeBasis)?
                .check_shape(modes, samples)?;
        }

        // A bias-summed term over no slices would integrate to a silent 0.
        let expected = if self.term.is_bias_summed() {
            self.basis.bias_count().max(1)
        } else {
            1
        };
        if self.biases.len() != expected {
            return Err(ConfigurationError::BiasCount(self.biases.len(), expected));
        }
        Ok(())
    }

    fn bias(&self) -> Bias<'_> {
        if self.term.is_bias_summed() {
            Bias::Summed(self.biases)
        } else {
            Bias::Single(self.biases[0])
        }
    }
}

/// Record of one freshly computed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellDiagnostic {
    pub chi: f64,
    pub sub_term: SubTerm,
    /// Stored value, normalisation applied.
    pub value: f64,
    /// Error estimate on `value`.
    pub error: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// A cell left unset because its integral failed.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    pub chi: f64,
    pub sub_term: SubTerm,
    pub error: IntegrationError,
}

/// Table as stored on disk after a run, with what the run did.
#[derive(Debug, Clone)]
pub struct ComputedTable {
    pub path: PathBuf,
    pub table: CoefficientTable,
    /// Cells integrated during this run.
    pub computed: Vec<CellDiagnostic>,
    /// Cells that could not be stored.
    pub failures: Vec<CellFailure>,
}

impl ComputedTable {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Cells stored although the quadrature missed its tolerance.
    pub fn unconverged(&self) -> impl Iterator<Item = &CellDiagnostic> {
        self.computed.iter().filter(|cell| !cell.converged)
    }
}

/// [`compute_table_with`] using the default Gauss–Kronrod quadrature.
pub fn compute_table<K>(
    config: &Config,
    kernel: &K,
    request: &TableRequest<'_>,
) -> Result<ComputedTable>
where
    K: Kernel + ?Sized,
{
    compute_table_with(&GaussKronrod::default(), config, kernel, request)
}

/// Compute, persist and return the table for `request`.
pub fn compute_table_with<Q, K>(
    quadrature: &Q,
    config: &Config,
    kernel: &K,
    request: &TableRequest<'_>,
) -> Result<ComputedTable>
where
    Q: Quadrature,
    K: Kernel + ?Sized,
{
    config.validate()?;
    request.validate()?;

    let term = &request.term;
    let layout = term.layout();
    let path = term.artifact_path(&config.output_dir);
    let _span = info_span!("table", file = %term.file_name()).entered();

    fs::create_dir_all(&config.output_dir).map_err(|source| StorageError::Io {
        path: config.output_dir.clone(),
        source,
    })?;
    let _lease = ArtifactLease::acquire(&path)?;

    let (mut table, mut dirty) = if path.exists() {
        let mut table = CoefficientTable::load(&path, layout.data_columns())?;
        let added = table.ensure_rows(request.distances);
        (table, added > 0)
    } else {
        (
            CoefficientTable::with_distances(layout.data_columns(), request.distances),
            true,
        )
    };
    info!(path = %path.display(), rows = table.len(), "integration");

    let norm = config.normalization(term.lterm());
    let tol = Tolerance {
        rel: config.rel_tol,
        abs: config.abs_tol,
        max_eval: config.max_eval,
    };
    let pair = BasisPair::new(request.basis, request.derivative);
    let bias = request.bias();

    let mut computed = Vec::new();
    let mut failures = Vec::new();
    let started = Instant::now();

    for (i, &chi) in request.distances.iter().enumerate() {
        debug!(
            "{}/{} chi={:.2}, time {:.2}s",
            i,
            request.distances.len(),
            chi,
            started.elapsed().as_secs_f64()
        );
        let projection = Projection::new(kernel, request.grid, request.modes, chi, term.ell());

        for &sub_term in layout.sub_terms() {
            let column = sub_term.column();
            let current = table.get(chi, column).unwrap_or(0.0);
            if !current.is_zero() && !config.force {
                debug!(chi, ?sub_term, "already computed, skipping");
                continue;
            }

            let est = integrate(
                quadrature,
                &projection,
                sub_term,
                pair,
                bias,
                request.rmin,
                request.rmax,
                tol,
            )?;
            let value = norm * est.value;
            let error = norm.abs() * est.error;

            if !value.is_finite() {
                warn!(chi, ?sub_term, value, "integral is not finite, cell left unset");
                failures.push(CellFailure {
                    chi,
                    sub_term,
                    error: IntegrationError::NonFinite { value },
                });
                continue;
            }
            if !est.converged {
                if config.require_convergence {
                    warn!(chi, ?sub_term, value, error, "not converged, cell left unset");
                    failures.push(CellFailure {
                        chi,
                        sub_term,
                        error: IntegrationError::NotConverged {
                            value,
                            error,
                            evaluations: est.evaluations,
                        },
                    });
                    continue;
                }
                warn!(chi, ?sub_term, value, error, "not converged, storing anyway");
            }

            table.set(chi, column, value);
            table.save(&path)?;
            dirty = false;
            computed.push(CellDiagnostic {
                chi,
                sub_term,
                value,
                error,
                evaluations: est.evaluations,
                converged: est.converged,
            });
        }
    }

    if dirty {
        table.save(&path)?;
    }
    info!(
        computed = computed.len(),
        failed = failures.len(),
        seconds = started.elapsed().as_secs_f64(),
        "table done"
    );

    let table = CoefficientTable::load(&path, layout.data_columns())?;
    Ok(ComputedTable {
        path,
        table,
        computed,
        failures,
    })
}

/// Compute several tables in parallel, one worker per artifact.
///
/// Results come back in request order. A request whose artifact repeats an
/// earlier one in the batch is rejected with
/// [`StorageError::ArtifactBusy`] rather than racing it.
pub fn compute_tables<K>(
    config: &Config,
    kernel: &K,
    requests: &[TableRequest<'_>],
) -> Vec<Result<ComputedTable>>
where
    K: Kernel + Sync + ?Sized,
{
    let paths: Vec<PathBuf> = requests
        .iter()
        .map(|r| r.term.artifact_path(&config.output_dir))
        .collect();

    requests
        .par_iter()
        .enumerate()
        .map(|(i, request)| {
            if paths[..i].contains(&paths[i]) {
                return Err(crate::Error::from(StorageError::ArtifactBusy(paths[i].clone())));
            }
            compute_table(config, kernel, request)
        })
        .collect()
}
