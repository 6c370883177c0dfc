use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{InitError, InitResult};
use crate::operator::CVector;
use crate::spectral::lanczos::LanczosEigensolver;
use crate::spectral::power::PowerIteration;

const DEFAULT_MAX_ITERATIONS: usize = 1000;
const DEFAULT_TOLERANCE: f64 = 1e-10;
const DEFAULT_KRYLOV_DIM: usize = 20;
const DEFAULT_SEED: u64 = 0x5eed;

/// Operator on the signal space that is Hermitian up to rounding. Only its
/// action is available.
pub trait HermitianOperator: Sync {
    fn dim(&self) -> usize;
    fn apply(&self, x: &CVector) -> InitResult<CVector>;
}

/// Computes the eigenpair whose eigenvalue has the largest real part, using
/// nothing but operator applications.
pub trait DominantEigensolver: Send + Sync {
    fn name(&self) -> &'static str;
    fn dominant_eigenpair(&self, operator: &dyn HermitianOperator) -> InitResult<Eigenpair>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenOptions {
    /// Budget of operator applications before giving up.
    pub max_iterations: usize,
    /// Bound on `||Y v - theta v|| / ||Y v||`, independent of the scale of `Y`.
    pub tolerance: f64,
    /// Subspace size per Lanczos cycle. Ignored by power iteration.
    pub krylov_dim: usize,
    /// Seed for the deterministic start vector.
    pub seed: u64,
}

impl Default for EigenOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            krylov_dim: DEFAULT_KRYLOV_DIM,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Lanczos,
    Power,
}

impl SolverKind {
    pub fn build(self, options: EigenOptions) -> Box<dyn DominantEigensolver> {
        match self {
            SolverKind::Lanczos => Box::new(LanczosEigensolver::new(options)),
            SolverKind::Power => Box::new(PowerIteration::new(options)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Eigenpair {
    pub value: f64,
    /// Unit-norm eigenvector.
    pub vector: CVector,
    /// Operator applications spent.
    pub iterations: usize,
    pub residual: f64,
}

pub(crate) fn check_dimension(operator: &dyn HermitianOperator) -> InitResult<usize> {
    match operator.dim() {
        0 => Err(InitError::invalid(
            "eigensolver needs a positive signal dimension",
        )),
        n => Ok(n),
    }
}

pub(crate) fn random_unit_vector(dim: usize, seed: u64) -> CVector {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut vector = CVector::from_fn(dim, |_, _| {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        Complex64::new(re, im)
    });
    if normalize(&mut vector).is_none() {
        vector.fill(Complex64::new(0.0, 0.0));
        vector[0] = Complex64::new(1.0, 0.0);
    }
    vector
}

pub(crate) fn normalize(vector: &mut CVector) -> Option<f64> {
    let norm = vector.norm();
    if !norm.is_finite() || norm <= f64::MIN_POSITIVE {
        return None;
    }
    vector.unscale_mut(norm);
    Some(norm)
}

/// `Re(v^H Y v)` for a unit vector `v` and its image `yv`.
pub(crate) fn rayleigh_quotient(vector: &CVector, image: &CVector) -> f64 {
    vector.dotc(image).re
}

/// `||Y v - theta v|| / ||Y v||` for a unit vector `v`. A vanishing image means
/// `v` lies in the null space of `Y`, which is an exact eigenpair.
pub(crate) fn relative_residual(vector: &CVector, image: &CVector, value: f64) -> f64 {
    let image_norm = image.norm();
    if image_norm == 0.0 {
        return 0.0;
    }
    let residual = image - vector * Complex64::new(value, 0.0);
    residual.norm() / image_norm
}

#[cfg(test)]
pub(crate) mod test_support {
    use nalgebra::DMatrix;

    use super::*;

    /// Explicit Hermitian matrix wrapped as an operator, for solver tests.
    pub struct MatrixOperator {
        pub matrix: DMatrix<Complex64>,
    }

    impl MatrixOperator {
        pub fn diagonal(values: &[f64]) -> Self {
            let n = values.len();
            let matrix = DMatrix::from_fn(n, n, |i, j| {
                if i == j {
                    Complex64::new(values[i], 0.0)
                } else {
                    Complex64::new(0.0, 0.0)
                }
            });
            Self { matrix }
        }

        /// `Q diag(values) Q^H` with a unitary Householder reflector `Q`; returns `Q`
        /// too, whose columns are the eigenvectors.
        pub fn rotated(values: &[f64], direction: &CVector) -> (Self, DMatrix<Complex64>) {
            let n = values.len();
            let mut u = direction.clone();
            normalize(&mut u).expect("direction must be non-zero");
            let identity = DMatrix::<Complex64>::identity(n, n);
            let q = identity - (&u * u.adjoint()) * Complex64::new(2.0, 0.0);
            let d = Self::diagonal(values).matrix;
            let matrix = &q * d * q.adjoint();
            (Self { matrix }, q)
        }
    }

    impl HermitianOperator for MatrixOperator {
        fn dim(&self) -> usize {
            self.matrix.ncols()
        }

        fn apply(&self, x: &CVector) -> InitResult<CVector> {
            Ok(&self.matrix * x)
        }
    }
}
