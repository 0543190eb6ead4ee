//! Compute a small set of coefficient tables with a toy power-law kernel.
//!
//! ```text
//! RUST_LOG=debug cargo run --example basic -- [config.toml]
//! ```
//!
//! Tables land in the configured `output_dir` (a `cln-demo` directory by
//! default). Running it twice shows the resume path: the second run finds
//! every cell already stored and integrates nothing.

use std::path::Path;

use fftlog_cln::{
    compute_table, compute_tables, BasisTable, Config, FnKernel, ModeSpec, RadialGrid,
    TableRequest, TermKey,
};
use num_complex::Complex64;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default().with_output_dir("cln-demo"),
    };

    // A Gaussian shell modulated by each mode's frequency.
    let grid = RadialGrid::linspace(50.0, 3000.0, 400)?;
    let modes = ModeSpec::new(8, 10.0, 1e-4, 0.0)?;
    let centre = 1400.0;
    let width = 300.0;
    let shell = |r: f64| (-0.5 * ((r - centre) / width).powi(2)).exp();
    let basis = BasisTable::from_fn(1, modes.mode_count(), grid.len(), |_, m, s| {
        let r = grid.as_slice()[s];
        let p = m as i64 - (modes.n() / 2) as i64;
        Complex64::from_polar(shell(r), -modes.eta(p) * r.ln()) / (modes.n() + 1) as f64
    })?;
    let derivative = BasisTable::from_fn(1, modes.mode_count(), grid.len(), |_, m, s| {
        let r = grid.as_slice()[s];
        let p = m as i64 - (modes.n() / 2) as i64;
        let slope = -(r - centre) / (width * width);
        Complex64::from_polar(slope * shell(r), -modes.eta(p) * r.ln()) / (modes.n() + 1) as f64
    })?;

    // Stand-in for the hypergeometric projection: a damped complex power law.
    let kernel = FnKernel::new(
        |nu: Complex64, t: f64, _chi: f64, ell: u32, t1min: f64| {
            if t <= t1min {
                return Complex64::new(0.0, 0.0);
            }
            Complex64::new(t, 0.0).powc(-nu * 0.5) * (-(t - 1.0).powi(2) * f64::from(ell)).exp()
        },
        |ell: u32, _nu: Complex64| 1.0 / f64::from(ell),
    );

    let distances: Vec<f64> = (1..=8).map(|i| 250.0 * i as f64).collect();
    let request = |term: TermKey| TableRequest {
        term,
        distances: &distances,
        grid: &grid,
        basis: &basis,
        derivative: Some(&derivative),
        rmin: 100.0,
        rmax: 2900.0,
        modes: &modes,
        biases: &[0.0],
    };

    let single = compute_table(&config, &kernel, &request(TermKey::new("F2", 1, "dens", 2)?))?;
    println!("{}: {} cells computed", single.path.display(), single.computed.len());

    let ells = [2, 6, 10, 20];
    let mut requests = Vec::with_capacity(ells.len());
    for ell in ells {
        requests.push(request(TermKey::new("FG2", 0, "pot", ell)?));
    }
    for result in compute_tables(&config, &kernel, &requests) {
        let result = result?;
        println!(
            "{}: {} cells computed, {} unconverged, {} failed",
            result.path.display(),
            result.computed.len(),
            result.unconverged().count(),
            result.failures.len()
        );
        for row in result.table.rows() {
            println!(
                "  chi={:8.1}  C0={:+.6e}  C-2={:+.6e}  C+2={:+.6e}",
                row[0], row[1], row[2], row[3]
            );
        }
    }
    Ok(())
}
