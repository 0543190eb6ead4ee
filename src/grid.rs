//! Radial sample grid and tabulated basis functions.

use num_complex::Complex64;

use crate::algo::interp::Bracket;
use crate::types::ConfigurationError;

/// Strictly increasing radial sample coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGrid {
    samples: Vec<f64>,
}

impl RadialGrid {
    /// Validate and wrap `samples`: at least two, all finite, strictly
    /// increasing.
    pub fn new(samples: Vec<f64>) -> Result<Self, ConfigurationError> {
        if samples.len() < 2 {
            return Err(ConfigurationError::GridTooShort(samples.len()));
        }
        if let Some(index) = samples.iter().position(|r| !r.is_finite()) {
            return Err(ConfigurationError::GridNotIncreasing(index));
        }
        if let Some(index) = samples.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ConfigurationError::GridNotIncreasing(index + 1));
        }
        Ok(Self { samples })
    }

    /// `n` evenly spaced samples from `start` to `end` inclusive.
    pub fn linspace(start: f64, end: f64, n: usize) -> Result<Self, ConfigurationError> {
        if n < 2 {
            return Err(ConfigurationError::GridTooShort(n));
        }
        let step = (end - start) / (n - 1) as f64;
        let mut samples: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        samples[n - 1] = end;
        Self::new(samples)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample coordinates in increasing order.
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub(crate) fn brackets(&self, r: &[f64]) -> Vec<Bracket> {
        r.iter().map(|&x| Bracket::locate(&self.samples, x)).collect()
    }
}

/// Complex basis values indexed by (bias, mode, radial sample).
///
/// Mode index `m` corresponds to frequency `p = m - N/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisTable {
    biases: usize,
    modes: usize,
    samples: usize,
    data: Vec<Complex64>,
}

impl BasisTable {
    /// Table without a bias axis, `data` laid out mode-major.
    pub fn new(
        modes: usize,
        samples: usize,
        data: Vec<Complex64>,
    ) -> Result<Self, ConfigurationError> {
        Self::with_biases(1, modes, samples, data)
    }

    /// Table with `biases` slices, `data` laid out bias-major then mode-major.
    pub fn with_biases(
        biases: usize,
        modes: usize,
        samples: usize,
        data: Vec<Complex64>,
    ) -> Result<Self, ConfigurationError> {
        let expected = biases * modes * samples;
        if data.len() != expected || expected == 0 {
            return Err(ConfigurationError::ShapeMismatch {
                what: "basis table entries",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            biases,
            modes,
            samples,
            data,
        })
    }

    /// Build a table from `f(bias, mode, sample)`. Every dimension must be
    /// non-zero.
    pub fn from_fn<F>(
        biases: usize,
        modes: usize,
        samples: usize,
        mut f: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: FnMut(usize, usize, usize) -> Complex64,
    {
        let mut data = Vec::with_capacity(biases * modes * samples);
        for b in 0..biases {
            for m in 0..modes {
                for s in 0..samples {
                    data.push(f(b, m, s));
                }
            }
        }
        Self::with_biases(biases, modes, samples, data)
    }

    /// Number of bias slices.
    pub fn bias_count(&self) -> usize {
        self.biases
    }

    pub fn mode_count(&self) -> usize {
        self.modes
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// The (mode × sample) slice for one bias index.
    pub fn slice(&self, bias: usize) -> Option<BasisSlice<'_>> {
        if bias >= self.biases {
            return None;
        }
        let len = self.modes * self.samples;
        Some(BasisSlice {
            modes: self.modes,
            samples: self.samples,
            data: &self.data[bias * len..(bias + 1) * len],
        })
    }

    pub(crate) fn check_shape(
        &self,
        modes: usize,
        samples: usize,
    ) -> Result<(), ConfigurationError> {
        if self.modes != modes {
            return Err(ConfigurationError::ShapeMismatch {
                what: "basis table modes",
                expected: modes,
                actual: self.modes,
            });
        }
        if self.samples != samples {
            return Err(ConfigurationError::ShapeMismatch {
                what: "basis table radial samples",
                expected: samples,
                actual: self.samples,
            });
        }
        Ok(())
    }
}

/// Borrowed (mode × sample) view of a [`BasisTable`].
#[derive(Debug, Clone, Copy)]
pub struct BasisSlice<'a> {
    modes: usize,
    samples: usize,
    data: &'a [Complex64],
}

impl<'a> BasisSlice<'a> {
    pub fn mode_count(&self) -> usize {
        self.modes
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Radial samples of mode index `m`.
    pub fn mode(&self, m: usize) -> &'a [Complex64] {
        &self.data[m * self.samples..(m + 1) * self.samples]
    }
}
