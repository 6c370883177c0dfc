use num_complex::Complex64;

use crate::error::{InitError, InitResult};
use crate::operator::{CVector, NormalizedOperator};
use crate::spectral::truncation::InclusionMask;

/// Least-squares fit of a single scalar `s` minimising `||s * Ax - b||`, where
/// both sides are restricted to the included measurements.
#[derive(Debug, Clone)]
pub struct ScaleFit {
    pub scale: f64,
    pub residual: f64,
    /// `|A x0| .* idx`
    pub magnitudes: Vec<f64>,
    /// `b0 .* idx`
    pub targets: Vec<f64>,
}

impl ScaleFit {
    pub fn fit(magnitudes: &[f64], b0: &[f64], mask: &InclusionMask) -> InitResult<Self> {
        if magnitudes.len() != b0.len() || mask.len() != b0.len() {
            return Err(InitError::invalid(format!(
                "scale fit needs equal lengths, got {} magnitudes, {} measurements, {} mask entries",
                magnitudes.len(),
                b0.len(),
                mask.len()
            )));
        }

        let (magnitudes, targets): (Vec<f64>, Vec<f64>) = magnitudes
            .iter()
            .zip(b0)
            .zip(mask.as_slice())
            .map(|((ax, b), &keep)| if keep { (*ax, *b) } else { (0.0, 0.0) })
            .unzip();

        let denominator: f64 = magnitudes.iter().map(|ax| ax * ax).sum();
        if !denominator.is_finite() || denominator <= 0.0 {
            return Err(InitError::DegenerateScale(
                "estimate has no magnitude on the included measurements".to_string(),
            ));
        }
        let energy: f64 = targets.iter().map(|b| b * b).sum();
        if energy <= 0.0 {
            return Err(InitError::DegenerateScale(
                "included measurements carry no energy".to_string(),
            ));
        }

        let numerator: f64 = magnitudes.iter().zip(&targets).map(|(ax, b)| ax * b).sum();
        let scale = numerator / denominator;
        let residual = fit_residual(scale, &magnitudes, &targets);
        Ok(Self {
            scale,
            residual,
            magnitudes,
            targets,
        })
    }
}

/// `||k * Ax - b||` for an arbitrary scalar `k`.
pub fn fit_residual(k: f64, magnitudes: &[f64], targets: &[f64]) -> f64 {
    magnitudes
        .iter()
        .zip(targets)
        .map(|(ax, b)| {
            let diff = k * ax - b;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

/// Rescales a unit eigenvector so its measurement magnitudes best match `b0`.
pub fn rescale(
    operator: &NormalizedOperator<'_>,
    estimate: &CVector,
    b0: &[f64],
    mask: &InclusionMask,
) -> InitResult<(CVector, ScaleFit)> {
    let image = operator.apply(estimate)?;
    let magnitudes: Vec<f64> = image.iter().map(|v| v.norm()).collect();
    let fit = ScaleFit::fit(&magnitudes, b0, mask)?;
    let scaled = estimate * Complex64::new(fit.scale, 0.0);
    Ok((scaled, fit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_form_minimises_residual() {
        let magnitudes = [1.0, 2.0, 0.5, 3.0, 0.0];
        let b0 = [2.1, 3.9, 1.2, 6.3, 0.4];
        let mask = InclusionMask::from_measurements(&b0, false);
        let fit = ScaleFit::fit(&magnitudes, &b0, &mask).expect("fit");
        assert!(fit.scale > 0.0);
        for probe in [0.0, 0.5, 1.9, 2.0, 2.05, 2.1, 3.0, fit.scale * 1.001] {
            assert!(fit.residual <= fit_residual(probe, &fit.magnitudes, &fit.targets) + 1e-12);
        }
    }

    #[test]
    fn exact_multiple_is_recovered() {
        let magnitudes = [0.5, 1.0, 1.5];
        let b0 = [1.5, 3.0, 4.5];
        let mask = InclusionMask::from_measurements(&b0, false);
        let fit = ScaleFit::fit(&magnitudes, &b0, &mask).expect("fit");
        assert!((fit.scale - 3.0).abs() < 1e-12);
        assert!(fit.residual < 1e-12);
    }

    #[test]
    fn excluded_entries_do_not_influence_scale() {
        let mut magnitudes = vec![1.0; 20];
        let mut b0 = vec![2.0; 20];
        magnitudes[0] = 1.0;
        b0[0] = 100.0;
        let mask = InclusionMask::from_measurements(&b0, true);
        assert!(!mask.is_included(0));
        let fit = ScaleFit::fit(&magnitudes, &b0, &mask).expect("fit");
        assert!((fit.scale - 2.0).abs() < 1e-12);
        assert_eq!(fit.magnitudes[0], 0.0);
        assert_eq!(fit.targets[0], 0.0);
    }

    #[test]
    fn zero_magnitudes_are_degenerate() {
        let b0 = [1.0, 2.0];
        let mask = InclusionMask::from_measurements(&b0, false);
        let err = ScaleFit::fit(&[0.0, 0.0], &b0, &mask).unwrap_err();
        assert!(matches!(err, InitError::DegenerateScale(_)));
    }

    #[test]
    fn zero_measurements_are_degenerate() {
        let b0 = [0.0, 0.0, 0.0];
        let mask = InclusionMask::from_measurements(&b0, true);
        let err = ScaleFit::fit(&[0.3, 0.1, 0.7], &b0, &mask).unwrap_err();
        assert!(matches!(err, InitError::DegenerateScale(_)));
    }
}
