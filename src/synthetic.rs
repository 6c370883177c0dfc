use anyhow::{Result, anyhow};
use nalgebra::DMatrix;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::operator::{CVector, MeasurementOperator};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub measurements: usize,
    pub dim: usize,
    /// Complex Gaussian operator and signal; real Gaussian otherwise.
    pub complex: bool,
    pub seed: Option<u64>,
    /// Number of measurements multiplied by `outlier_gain`.
    pub outliers: usize,
    pub outlier_gain: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            measurements: 500,
            dim: 50,
            complex: true,
            seed: None,
            outliers: 0,
            outlier_gain: 10.0,
        }
    }
}

/// Gaussian measurement operator, unit-norm ground truth and `b0 = |A x|`.
#[derive(Debug, Clone)]
pub struct SyntheticProblem {
    pub matrix: DMatrix<Complex64>,
    pub signal: CVector,
    pub measurements: Vec<f64>,
    /// Indices whose magnitude was inflated.
    pub outlier_indices: Vec<usize>,
}

impl SyntheticProblem {
    pub fn generate(config: &SyntheticConfig) -> Result<Self> {
        if config.measurements == 0 {
            return Err(anyhow!("Measurement count must be greater than zero"));
        }
        if config.dim == 0 {
            return Err(anyhow!("Signal dimension must be greater than zero"));
        }
        if config.outliers > config.measurements {
            return Err(anyhow!(
                "Requested {} outliers, but only {} measurements",
                config.outliers,
                config.measurements
            ));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed.unwrap_or_else(random_seed));
        let matrix = DMatrix::from_fn(config.measurements, config.dim, |_, _| {
            gaussian(&mut rng, config.complex)
        });
        let mut signal = CVector::from_fn(config.dim, |_, _| gaussian(&mut rng, config.complex));
        let norm = signal.norm();
        if norm == 0.0 {
            return Err(anyhow!("Sampled signal is zero"));
        }
        signal.unscale_mut(norm);

        let mut measurements: Vec<f64> = (&matrix * &signal).iter().map(|v| v.norm()).collect();

        let mut outlier_indices = Vec::with_capacity(config.outliers);
        while outlier_indices.len() < config.outliers {
            let index = rng.gen_range(0..config.measurements);
            if !outlier_indices.contains(&index) {
                outlier_indices.push(index);
            }
        }
        outlier_indices.sort_unstable();
        for &index in &outlier_indices {
            measurements[index] *= config.outlier_gain;
        }

        Ok(Self {
            matrix,
            signal,
            measurements,
            outlier_indices,
        })
    }

    pub fn operator(&self) -> MeasurementOperator {
        MeasurementOperator::dense(self.matrix.clone())
    }
}

fn gaussian(rng: &mut Xoshiro256PlusPlus, complex: bool) -> Complex64 {
    let re: f64 = rng.sample(StandardNormal);
    if complex {
        let im: f64 = rng.sample(StandardNormal);
        Complex64::new(re, im) * std::f64::consts::FRAC_1_SQRT_2
    } else {
        Complex64::new(re, 0.0)
    }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
