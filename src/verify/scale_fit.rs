use std::fmt::Write;

use crate::spectral::scaling::{ScaleFit, fit_residual};

#[derive(Debug, Clone)]
pub struct ScaleFitReport {
    pub residual: f64,
    pub optimal: bool,
    pub explanation: String,
}

/// Checks that a fitted scale is no worse than any probe scalar.
pub struct ScaleFitCheck;

impl ScaleFitCheck {
    pub fn assess(fit: &ScaleFit, probes: &[f64], epsilon: f64) -> ScaleFitReport {
        let mut explanation = String::new();
        let mut optimal = true;
        let _ = writeln!(
            explanation,
            "s={:.6}: ||s*Ax - b|| = {:.6e}",
            fit.scale, fit.residual
        );

        for &k in probes {
            let probe_residual = fit_residual(k, &fit.magnitudes, &fit.targets);
            let satisfied = fit.residual <= probe_residual + epsilon;
            if !satisfied {
                optimal = false;
            }
            let _ = writeln!(
                explanation,
                "k={:.6}: ||k*Ax - b|| = {:.6e}: {}",
                k, probe_residual, satisfied
            );
        }

        ScaleFitReport {
            residual: fit.residual,
            optimal,
            explanation,
        }
    }

    /// Probes spread around the fitted scale, plus zero.
    pub fn default_probes(fit: &ScaleFit) -> Vec<f64> {
        let s = fit.scale;
        let mut probes = vec![0.0];
        probes.extend([0.5, 0.9, 0.99, 0.999, 1.001, 1.01, 1.1, 2.0].iter().map(|f| f * s));
        probes
    }
}
