//! Coefficient tables and their on-disk artifacts.
//!
//! A table has one row per distance chi: column 0 holds chi, the remaining
//! columns the coefficients. Rows are keyed by the chi value, so an artifact
//! written with a different row order still lines up with the requested
//! distances. A data cell of exactly `0.0` means "not computed yet".
//!
//! Artifacts are whitespace-delimited text in the `numpy.savetxt` layout
//! (`%.18e`), which round-trips every `f64` exactly. Writes go to a sibling
//! temporary file that is renamed over the artifact, so an interrupted
//! process leaves the previous complete table behind.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::types::StorageError;

/// Rows keyed by distance value.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    width: usize,
    data: Vec<f64>,
    index: HashMap<u64, usize>,
}

/// Hash key of a distance; `-0.0` and `0.0` share a row.
fn key(chi: f64) -> u64 {
    if chi == 0.0 {
        0.0_f64.to_bits()
    } else {
        chi.to_bits()
    }
}

impl CoefficientTable {
    /// Empty table with `data_columns` coefficient columns.
    pub fn new(data_columns: usize) -> Self {
        Self {
            width: data_columns + 1,
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Fresh table with one zeroed row per distance.
    pub fn with_distances(data_columns: usize, distances: &[f64]) -> Self {
        let mut table = Self::new(data_columns);
        table.ensure_rows(distances);
        table
    }

    /// Total columns, chi included.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data_columns(&self) -> usize {
        self.width - 1
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rows in storage order, each `[chi, c1, ...]`.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.width)
    }

    /// One column in storage order.
    pub fn column(&self, column: usize) -> Vec<f64> {
        self.rows().map(|row| row[column]).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.column(0)
    }

    pub fn contains(&self, chi: f64) -> bool {
        self.index.contains_key(&key(chi))
    }

    /// Row for `chi`, if present.
    pub fn row(&self, chi: f64) -> Option<&[f64]> {
        let i = *self.index.get(&key(chi))?;
        Some(&self.data[i * self.width..(i + 1) * self.width])
    }

    /// Cell `column` (>= 1) of the row for `chi`.
    pub fn get(&self, chi: f64, column: usize) -> Option<f64> {
        self.row(chi).and_then(|row| row.get(column).copied())
    }

    /// Overwrite one coefficient; returns `false` when the row or column
    /// does not exist.
    pub fn set(&mut self, chi: f64, column: usize, value: f64) -> bool {
        if column == 0 || column >= self.width {
            return false;
        }
        match self.index.get(&key(chi)) {
            Some(&i) => {
                self.data[i * self.width + column] = value;
                true
            }
            None => false,
        }
    }

    /// Append a zero row for every distance not yet present. Returns the
    /// number of rows added.
    pub fn ensure_rows(&mut self, distances: &[f64]) -> usize {
        let mut added = 0;
        for &chi in distances {
            if self.push_row(chi, &[]) {
                added += 1;
            }
        }
        added
    }

    fn push_row(&mut self, chi: f64, cells: &[f64]) -> bool {
        let k = key(chi);
        if self.index.contains_key(&k) {
            return false;
        }
        self.index.insert(k, self.len());
        self.data.push(chi);
        let start = self.data.len();
        self.data.extend_from_slice(cells);
        self.data.resize(start + self.width - 1, 0.0);
        true
    }

    /// Parse the text artifact format.
    ///
    /// Blank lines and `#` comments are skipped. Every row must have
    /// `data_columns + 1` finite numbers and a distinct chi.
    pub fn parse(text: &str, data_columns: usize, path: &Path) -> Result<Self, StorageError> {
        let mut table = Self::new(data_columns);
        let mut cells = Vec::with_capacity(table.width);

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            cells.clear();
            for field in line.split_whitespace() {
                let value: f64 = field.parse().map_err(|_| StorageError::Malformed {
                    path: path.to_path_buf(),
                    line: n + 1,
                    reason: format!("not a number: {field:?}"),
                })?;
                if !value.is_finite() {
                    return Err(StorageError::Malformed {
                        path: path.to_path_buf(),
                        line: n + 1,
                        reason: format!("non-finite value {value}"),
                    });
                }
                cells.push(value);
            }
            if cells.len() != table.width {
                return Err(StorageError::ColumnCount {
                    path: path.to_path_buf(),
                    expected: table.width,
                    found: cells.len(),
                });
            }
            if !table.push_row(cells[0], &cells[1..]) {
                return Err(StorageError::DuplicateRow {
                    path: path.to_path_buf(),
                    chi: cells[0],
                });
            }
        }
        Ok(table)
    }

    /// Read an artifact.
    pub fn load(path: &Path, data_columns: usize) -> Result<Self, StorageError> {
        let text = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, data_columns, path)
    }

    /// Render in the artifact format.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 26);
        for row in self.rows() {
            for (i, &value) in row.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&format_sci(value));
            }
            out.push('\n');
        }
        out
    }

    /// Atomically replace the artifact at `path` with this table.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(self.to_text().as_bytes())
            .map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }
}

/// `%.18e` with a signed, at-least-two-digit exponent, as `numpy.savetxt`
/// writes it.
fn format_sci(value: f64) -> String {
    let raw = format!("{value:.18e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => raw,
    }
}

fn active_artifacts() -> &'static Mutex<HashSet<PathBuf>> {
    static ACTIVE: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive in-process claim on an artifact path, released on drop.
#[derive(Debug)]
pub struct ArtifactLease {
    path: PathBuf,
}

impl ArtifactLease {
    pub fn acquire(path: &Path) -> Result<Self, StorageError> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut active = active_artifacts()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(path.clone()) {
            return Err(StorageError::ArtifactBusy(path));
        }
        Ok(Self { path })
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        let mut active = active_artifacts()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.path);
    }
}
