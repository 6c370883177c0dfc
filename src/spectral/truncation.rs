use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Measurements whose squared magnitude exceeds `TRUNCATION_ALPHA^2` times the
/// mean squared magnitude are dropped when truncation is enabled.
pub const TRUNCATION_ALPHA: f64 = 3.0;

const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Which measurements take part in the weighted operator and the scale fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionMask {
    included: Vec<bool>,
    lambda0: f64,
    threshold: Option<f64>,
}

impl InclusionMask {
    pub fn from_measurements(b0: &[f64], truncated: bool) -> Self {
        let m = b0.len();
        let mean_energy = if m == 0 {
            0.0
        } else {
            b0.iter().map(|b| b * b).sum::<f64>() / m as f64
        };
        let lambda0 = mean_energy.sqrt();

        if !truncated {
            return Self {
                included: vec![true; m],
                lambda0,
                threshold: None,
            };
        }

        let threshold = TRUNCATION_ALPHA * TRUNCATION_ALPHA * lambda0 * lambda0;
        let keep = |b: &f64| (b * b).abs() <= threshold;
        let included = if m >= PARALLEL_THRESHOLD {
            b0.par_iter().map(keep).collect()
        } else {
            b0.iter().map(keep).collect()
        };

        Self {
            included,
            lambda0,
            threshold: Some(threshold),
        }
    }

    /// Root mean square of the measurement magnitudes.
    pub fn lambda0(&self) -> f64 {
        self.lambda0
    }

    /// Squared-magnitude cutoff, `None` when truncation is disabled.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.included
    }

    pub fn is_included(&self, index: usize) -> bool {
        self.included.get(index).copied().unwrap_or(false)
    }

    pub fn included_count(&self) -> usize {
        self.included.iter().filter(|keep| **keep).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.len() - self.included_count()
    }

    pub fn all_included(&self) -> bool {
        self.included.iter().all(|keep| *keep)
    }
}
