//! Adaptive 1-D quadrature over vectorised integrands.
//!
//! The integrand receives a batch of abscissae and fills a matching slice of
//! values, so one call can cover every interval refined in an iteration.
//!
//! [`GaussKronrod`] is h-adaptive: intervals live in a max-heap keyed by
//! their error estimate, and each iteration bisects the worst intervals until
//! the remaining error would fit in the tolerance, evaluating all children in
//! a single batch.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::algo::kronrod::{self, POINTS};

/// Stopping criteria for an adaptive integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Relative error target on |value|.
    pub rel: f64,
    /// Absolute error target.
    pub abs: f64,
    /// Maximum integrand evaluations; 0 means unbounded.
    pub max_eval: usize,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rel: 1e-4,
            abs: 0.0,
            max_eval: 100_000,
        }
    }
}

impl Tolerance {
    fn target(&self, value: f64) -> f64 {
        self.abs.max(self.rel * value.abs())
    }

    fn affords(&self, used: usize, more: usize) -> bool {
        self.max_eval == 0 || used + more <= self.max_eval
    }
}

/// Integral estimate returned by a [`Quadrature`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureEstimate {
    pub value: f64,
    pub error: f64,
    pub evaluations: usize,
    /// Error target met before the budget ran out.
    pub converged: bool,
}

/// Adaptive quadrature over `[a, b]` of a batched integrand.
pub trait Quadrature {
    fn integrate<F>(&self, f: F, a: f64, b: f64, tol: Tolerance) -> QuadratureEstimate
    where
        F: FnMut(&[f64], &mut [f64]);
}

/// h-adaptive Gauss–Kronrod (G7/K15) quadrature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaussKronrod {
    /// Equal-width intervals the range is split into before adapting.
    pub initial_intervals: usize,
}

impl Default for GaussKronrod {
    fn default() -> Self {
        Self {
            initial_intervals: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error
            .total_cmp(&other.error)
            .then_with(|| other.a.total_cmp(&self.a))
    }
}

/// Reusable sample buffers for batched rule evaluation.
#[derive(Default)]
struct Batch {
    x: Vec<f64>,
    fx: Vec<f64>,
}

impl Batch {
    fn evaluate<F>(&mut self, f: &mut F, bounds: &[(f64, f64)]) -> Vec<Interval>
    where
        F: FnMut(&[f64], &mut [f64]),
    {
        self.x.clear();
        for &(a, b) in bounds {
            kronrod::push_nodes(a, b, &mut self.x);
        }
        self.fx.clear();
        self.fx.resize(self.x.len(), 0.0);
        f(&self.x, &mut self.fx);

        bounds
            .iter()
            .zip(self.fx.chunks_exact(POINTS))
            .map(|(&(a, b), fx)| {
                let (value, gauss) = kronrod::apply(a, b, fx);
                Interval {
                    a,
                    b,
                    value,
                    error: (value - gauss).abs(),
                }
            })
            .collect()
    }
}

impl Quadrature for GaussKronrod {
    fn integrate<F>(&self, mut f: F, a: f64, b: f64, tol: Tolerance) -> QuadratureEstimate
    where
        F: FnMut(&[f64], &mut [f64]),
    {
        if a == b {
            return QuadratureEstimate {
                value: 0.0,
                error: 0.0,
                evaluations: 0,
                converged: true,
            };
        }

        let pieces = self.initial_intervals.max(1);
        let width = (b - a) / pieces as f64;
        let bounds: Vec<(f64, f64)> = (0..pieces)
            .map(|i| {
                let lo = a + width * i as f64;
                let hi = if i + 1 == pieces { b } else { lo + width };
                (lo, hi)
            })
            .collect();

        let mut batch = Batch::default();
        let mut heap: BinaryHeap<Interval> = batch.evaluate(&mut f, &bounds).into();
        let mut evaluations = pieces * POINTS;
        let mut value: f64 = heap.iter().map(|i| i.value).sum();
        let mut error: f64 = heap.iter().map(|i| i.error).sum();

        let converged = loop {
            let target = tol.target(value);
            if error <= target {
                break true;
            }
            if !value.is_finite() || !tol.affords(evaluations, 2 * POINTS) {
                break false;
            }

            // Refine the worst intervals until what is left would meet the target.
            let mut split = Vec::new();
            while let Some(worst) = heap.pop() {
                value -= worst.value;
                error -= worst.error;
                let mid = 0.5 * (worst.a + worst.b);
                split.push((worst.a, mid));
                split.push((mid, worst.b));
                if error <= target
                    || !tol.affords(evaluations, (split.len() + 2) * POINTS)
                {
                    break;
                }
            }

            let children = batch.evaluate(&mut f, &split);
            evaluations += split.len() * POINTS;
            for child in children {
                value += child.value;
                error += child.error;
                heap.push(child);
            }
        };

        // Re-sum from scratch so running-total drift does not leak out.
        let intervals = heap.into_sorted_vec();
        QuadratureEstimate {
            value: intervals.iter().map(|i| i.value).sum(),
            error: intervals.iter().map(|i| i.error).sum(),
            evaluations,
            converged,
        }
    }
}
