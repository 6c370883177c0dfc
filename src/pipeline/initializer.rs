use std::fmt;
use std::time::{Duration, Instant};

use log::{Level, debug, log};
use serde::{Deserialize, Serialize};

use crate::error::{InitError, InitResult};
use crate::operator::{CVector, MeasurementOperator};
use crate::spectral::{
    DominantEigensolver, EigenOptions, HermitianOperator, InclusionMask, SolverKind,
    WeightedOperator, rescale,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Drop measurements whose energy exceeds nine times the mean energy.
    pub truncated: bool,
    /// Fit the eigenvector's norm to the measurement magnitudes.
    pub scaled: bool,
    /// Report progress at info level instead of debug. Never affects the result.
    pub verbose: bool,
    pub solver: SolverKind,
    pub eigen: EigenOptions,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            truncated: false,
            scaled: true,
            verbose: true,
            solver: SolverKind::default(),
            eigen: EigenOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub estimate: CVector,
    pub mask: InclusionMask,
    pub eigenvalue: f64,
    /// Fitted scale, `None` when scaling was not requested.
    pub scale: Option<f64>,
    pub iterations: usize,
    pub residual: f64,
    pub solver: &'static str,
    pub elapsed: Duration,
}

/// Normalize -> truncate -> weighted operator -> dominant eigenvector -> optional rescale.
pub struct SpectralInitializer {
    config: InitConfig,
    solver: Box<dyn DominantEigensolver>,
}

impl SpectralInitializer {
    pub fn new(config: InitConfig) -> Self {
        let solver = config.solver.build(config.eigen);
        Self { config, solver }
    }

    /// Replaces the eigensolver chosen by `config.solver`.
    pub fn with_solver(mut self, solver: impl DominantEigensolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    pub fn config(&self) -> &InitConfig {
        &self.config
    }

    pub fn initialize(
        &self,
        operator: &MeasurementOperator,
        b0: &[f64],
    ) -> InitResult<InitOutcome> {
        let start = Instant::now();
        let level = if self.config.verbose {
            Level::Info
        } else {
            Level::Debug
        };

        validate_measurements(b0)?;
        let normalized = operator.normalize(b0.len())?;
        debug!(
            "normalized operator: {} measurements, signal dimension {}",
            normalized.measurements(),
            normalized.dim()
        );

        let mask = InclusionMask::from_measurements(b0, self.config.truncated);
        if self.config.truncated {
            log!(
                level,
                "truncation kept {}/{} measurements (lambda0={:.4e})",
                mask.included_count(),
                mask.len(),
                mask.lambda0()
            );
        }

        let weighted = WeightedOperator::new(&normalized, b0, &mask)?;
        log!(
            level,
            "estimating dominant eigenvector of {}x{} weighted operator with {}",
            weighted.dim(),
            weighted.dim(),
            self.solver.name()
        );
        let pair = self.solver.dominant_eigenpair(&weighted)?;
        debug!(
            "eigenvalue {:.6e} after {} applications (residual {:.3e})",
            pair.value, pair.iterations, pair.residual
        );

        let (estimate, scale) = if self.config.scaled {
            let (scaled, fit) = rescale(&normalized, &pair.vector, b0, &mask)?;
            log!(
                level,
                "rescaled estimate by {:.6e} (fit residual {:.3e})",
                fit.scale,
                fit.residual
            );
            (scaled, Some(fit.scale))
        } else {
            (pair.vector, None)
        };

        let elapsed = start.elapsed();
        log!(level, "spectral initialization finished in {:?}", elapsed);
        Ok(InitOutcome {
            estimate,
            mask,
            eigenvalue: pair.value,
            scale,
            iterations: pair.iterations,
            residual: pair.residual,
            solver: self.solver.name(),
            elapsed,
        })
    }
}

impl Default for SpectralInitializer {
    fn default() -> Self {
        Self::new(InitConfig::default())
    }
}

impl fmt::Debug for SpectralInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralInitializer")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .finish()
    }
}

/// One-shot entry point with default solver settings and quiet logging.
pub fn spectral_initialize(
    operator: &MeasurementOperator,
    b0: &[f64],
    truncated: bool,
    scaled: bool,
) -> InitResult<CVector> {
    let config = InitConfig {
        truncated,
        scaled,
        verbose: false,
        ..InitConfig::default()
    };
    SpectralInitializer::new(config)
        .initialize(operator, b0)
        .map(|outcome| outcome.estimate)
}

fn validate_measurements(b0: &[f64]) -> InitResult<()> {
    if b0.is_empty() {
        return Err(InitError::invalid("measurement vector is empty"));
    }
    if let Some((index, value)) = b0
        .iter()
        .enumerate()
        .find(|(_, b)| !b.is_finite() || **b < 0.0)
    {
        return Err(InitError::invalid(format!(
            "measurement {} is {}, magnitudes must be finite and non-negative",
            index, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;
    use num_complex::Complex64;

    use super::*;
    use crate::operator::CallableOperator;

    fn sign_design() -> DMatrix<f64> {
        // Every +-1 pattern over four coordinates.
        DMatrix::from_fn(16, 4, |i, j| if (i >> j) & 1 == 1 { 1.0 } else { -1.0 })
    }

    fn measurements(matrix: &DMatrix<f64>, signal: &[f64]) -> Vec<f64> {
        (0..matrix.nrows())
            .map(|i| {
                (0..matrix.ncols())
                    .map(|j| matrix[(i, j)] * signal[j])
                    .sum::<f64>()
                    .abs()
            })
            .collect()
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = InitConfig::default();
        assert!(!config.truncated);
        assert!(config.scaled);
        assert!(config.verbose);
        assert_eq!(config.solver, SolverKind::Lanczos);
    }

    #[test]
    fn rejects_negative_and_empty_measurements() {
        let operator = MeasurementOperator::from_real(&sign_design());
        let initializer = SpectralInitializer::default();

        let mut b0 = vec![1.0; 16];
        b0[3] = -0.5;
        let err = initializer.initialize(&operator, &b0).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));

        let err = initializer.initialize(&operator, &[]).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));

        let b0 = vec![1.0; 16 + 1];
        let err = initializer.initialize(&operator, &b0).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));
    }

    #[test]
    fn closure_without_adjoint_is_rejected() {
        let design = sign_design().map(|v| Complex64::new(v, 0.0));
        let forward = CallableOperator::new(move |x: &CVector| &design * x).with_dim(4);
        let operator = MeasurementOperator::callable(forward);
        let err = spectral_initialize(&operator, &[1.0; 16], false, true).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));
    }

    #[test]
    fn recovers_signal_on_sign_design() {
        let design = sign_design();
        let signal = [
            std::f64::consts::FRAC_1_SQRT_2,
            std::f64::consts::FRAC_1_SQRT_2,
            0.0,
            0.0,
        ];
        let b0 = measurements(&design, &signal);
        let operator = MeasurementOperator::from_real(&design);
        let outcome = SpectralInitializer::default()
            .initialize(&operator, &b0)
            .expect("initialize");

        assert!((outcome.eigenvalue - 2.0).abs() < 1e-9);
        assert!((outcome.scale.expect("scaled") - 1.0).abs() < 1e-9);
        let overlap: Complex64 = outcome
            .estimate
            .iter()
            .zip(signal.iter())
            .map(|(x, s)| x.conj() * *s)
            .sum();
        assert!((overlap.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn verbose_flag_does_not_change_result() {
        let design = sign_design();
        let b0 = measurements(&design, &[0.6, 0.8, 0.0, 0.0]);
        let operator = MeasurementOperator::from_real(&design);
        let loud = SpectralInitializer::new(InitConfig::default())
            .initialize(&operator, &b0)
            .expect("verbose run");
        let quiet = SpectralInitializer::new(InitConfig {
            verbose: false,
            ..InitConfig::default()
        })
        .initialize(&operator, &b0)
        .expect("quiet run");
        assert_eq!(loud.estimate, quiet.estimate);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = InitConfig {
            truncated: true,
            solver: SolverKind::Power,
            ..InitConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: InitConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, config);

        let partial: InitConfig = serde_json::from_str(r#"{"truncated": true}"#).expect("partial");
        assert!(partial.truncated);
        assert!(partial.scaled);
    }
}
