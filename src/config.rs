//! Run configuration.
//!
//! A [`Config`] is passed explicitly to every entry point; nothing is read
//! from process-wide state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{ConfigurationError, StorageError};

/// Gauge in which the source terms were tabulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gauge {
    /// Terms other than the potential pick up the squared normalisation.
    #[default]
    New,
    Old,
}

/// Configuration for table computation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Relative tolerance requested from the quadrature.
    pub rel_tol: f64,
    /// Absolute tolerance requested from the quadrature. Default: 0.
    pub abs_tol: f64,
    /// Integrand evaluation budget per cell. Default: 100 000.
    pub max_eval: usize,
    pub gauge: Gauge,
    /// Matter density parameter Ω_m.
    pub omega_m: f64,
    /// Hubble constant in units of the inverse distance used for chi.
    pub h0: f64,
    /// Directory receiving the coefficient tables.
    pub output_dir: PathBuf,
    /// Recompute cells even when the artifact already holds a value.
    pub force: bool,
    /// Leave unconverged cells unset and report them as failures instead of
    /// storing them.
    pub require_convergence: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rel_tol: 1e-4,
            abs_tol: 0.0,
            max_eval: 100_000,
            gauge: Gauge::New,
            omega_m: 0.31,
            h0: 1.0 / 2997.92458,
            output_dir: PathBuf::from("."),
            force: false,
            require_convergence: false,
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let text = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigurationError::InvalidParameter { name, value })
            }
        };
        positive("rel_tol", self.rel_tol)?;
        positive("omega_m", self.omega_m)?;
        positive("h0", self.h0)?;
        if !(self.abs_tol.is_finite() && self.abs_tol >= 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "abs_tol",
                value: self.abs_tol,
            });
        }
        if self.max_eval == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "max_eval",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// The factor 2 / (3 Ω_m H0²).
    pub fn growth_factor(&self) -> f64 {
        2.0 / 3.0 / self.omega_m / (self.h0 * self.h0)
    }

    /// Multiplier applied to every stored coefficient of a term.
    pub fn normalization(&self, lterm: &str) -> f64 {
        let f = self.growth_factor();
        if lterm == POTENTIAL_LABEL {
            f
        } else if self.gauge == Gauge::New {
            f * f
        } else {
            1.0
        }
    }
}

/// Line-of-sight label of the potential term.
pub const POTENTIAL_LABEL: &str = "pot";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_eval, 100_000);
        assert_eq!(config.abs_tol, 0.0);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
            rel_tol = 1e-6
            gauge = "old"
            output_dir = "/tmp/cln"
            force = true
            "#,
        )
        .unwrap();
        assert_eq!(config.rel_tol, 1e-6);
        assert_eq!(config.gauge, Gauge::Old);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/cln"));
        assert!(config.force);
        assert_eq!(config.omega_m, Config::default().omega_m);
    }

    #[test]
    fn toml_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            Config::from_toml_str("relerr = 1e-3"),
            Err(ConfigurationError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("omega_m = -0.3"),
            Err(ConfigurationError::InvalidParameter { name: "omega_m", .. })
        ));
    }

    #[test]
    fn normalization_by_gauge_and_label() {
        let config = Config {
            omega_m: 0.5,
            h0: 2.0,
            ..Config::default()
        };
        let f = 2.0 / (3.0 * 0.5 * 4.0);
        assert!((config.normalization("pot") - f).abs() < 1e-15);
        assert!((config.normalization("dens") - f * f).abs() < 1e-15);

        let old = Config {
            gauge: Gauge::Old,
            ..config
        };
        assert!((old.normalization("pot") - f).abs() < 1e-15);
        assert_eq!(old.normalization("dens"), 1.0);
    }
}
