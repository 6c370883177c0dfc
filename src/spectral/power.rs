use log::debug;
use num_complex::Complex64;

use crate::error::{InitError, InitResult};
use crate::spectral::eigen::{
    DominantEigensolver, EigenOptions, Eigenpair, HermitianOperator, check_dimension, normalize,
    random_unit_vector, rayleigh_quotient, relative_residual,
};

/// Shifted power iteration `v <- (Y + shift I) v`. With a zero shift it targets
/// the largest eigenvalue of a positive semidefinite operator.
#[derive(Debug, Clone)]
pub struct PowerIteration {
    options: EigenOptions,
    shift: f64,
}

impl PowerIteration {
    pub fn new(options: EigenOptions) -> Self {
        Self {
            options,
            shift: 0.0,
        }
    }

    /// A positive shift at least as large as the most negative eigenvalue makes
    /// the largest real eigenvalue dominant for indefinite operators.
    pub fn with_shift(mut self, shift: f64) -> Self {
        self.shift = shift;
        self
    }
}

impl Default for PowerIteration {
    fn default() -> Self {
        Self::new(EigenOptions::default())
    }
}

impl DominantEigensolver for PowerIteration {
    fn name(&self) -> &'static str {
        "power"
    }

    fn dominant_eigenpair(&self, operator: &dyn HermitianOperator) -> InitResult<Eigenpair> {
        let n = check_dimension(operator)?;
        let mut vector = random_unit_vector(n, self.options.seed);
        let mut image = operator.apply(&vector)?;
        let mut applications = 1usize;

        loop {
            let value = rayleigh_quotient(&vector, &image);
            let residual = relative_residual(&vector, &image, value);
            if residual <= self.options.tolerance {
                debug!(
                    "power iteration converged after {} applications, eigenvalue {:.6e}",
                    applications, value
                );
                return Ok(Eigenpair {
                    value,
                    vector,
                    iterations: applications,
                    residual,
                });
            }
            if applications >= self.options.max_iterations {
                return Err(InitError::ConvergenceFailure {
                    iterations: applications,
                    residual,
                });
            }

            let mut next = image;
            if self.shift != 0.0 {
                next.axpy(
                    Complex64::new(self.shift, 0.0),
                    &vector,
                    Complex64::new(1.0, 0.0),
                );
            }
            if normalize(&mut next).is_none() {
                return Err(InitError::ConvergenceFailure {
                    iterations: applications,
                    residual,
                });
            }
            vector = next;
            image = operator.apply(&vector)?;
            applications += 1;
        }
    }
}
