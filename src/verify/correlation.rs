use std::fmt::Write;

use crate::operator::CVector;

#[derive(Debug, Clone)]
pub struct CorrelationReport {
    /// `|<x0, x>| / (||x0|| ||x||)`, in `[0, 1]`.
    pub correlation: f64,
    pub passes: bool,
    pub explanation: String,
}

/// Compares an estimate with a reference signal up to a global phase.
pub struct CorrelationCheck;

impl CorrelationCheck {
    pub fn assess(estimate: &CVector, reference: &CVector, threshold: f64) -> CorrelationReport {
        let mut explanation = String::new();

        if estimate.len() != reference.len() {
            let _ = writeln!(
                explanation,
                "Length mismatch: estimate {} vs reference {}",
                estimate.len(),
                reference.len()
            );
            return CorrelationReport {
                correlation: 0.0,
                passes: false,
                explanation,
            };
        }

        let correlation = correlation(estimate, reference);
        let passes = correlation > threshold;
        let _ = writeln!(
            explanation,
            "|<x0, x>| / (|x0| |x|) = {:.6} > {:.6}: {}",
            correlation, threshold, passes
        );
        let _ = writeln!(
            explanation,
            "Norms: estimate {:.6}, reference {:.6}",
            estimate.norm(),
            reference.norm()
        );

        CorrelationReport {
            correlation,
            passes,
            explanation,
        }
    }
}

pub fn correlation(estimate: &CVector, reference: &CVector) -> f64 {
    let denominator = estimate.norm() * reference.norm();
    if denominator <= f64::MIN_POSITIVE {
        return 0.0;
    }
    (estimate.dotc(reference).norm() / denominator).min(1.0)
}

/// Rotates `estimate` by the unit-modulus factor that best aligns it with `reference`.
pub fn align_phase(estimate: &CVector, reference: &CVector) -> CVector {
    let inner = estimate.dotc(reference);
    let magnitude = inner.norm();
    if magnitude <= f64::MIN_POSITIVE {
        return estimate.clone();
    }
    estimate * (inner / magnitude)
}

/// `||align(x0) - x|| / ||x||`.
pub fn relative_error(estimate: &CVector, reference: &CVector) -> f64 {
    let aligned = align_phase(estimate, reference);
    let norm = reference.norm();
    let diff = (aligned - reference).norm();
    if norm <= f64::MIN_POSITIVE {
        diff
    } else {
        diff / norm
    }
}
