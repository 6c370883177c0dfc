use log::{debug, trace};
use nalgebra::{DMatrix, SymmetricEigen};
use num_complex::Complex64;

use crate::error::{InitError, InitResult};
use crate::operator::CVector;
use crate::spectral::eigen::{
    DominantEigensolver, EigenOptions, Eigenpair, HermitianOperator, check_dimension, normalize,
    random_unit_vector, rayleigh_quotient, relative_residual,
};

const BREAKDOWN_TOLERANCE: f64 = 1e-12;

/// Explicitly restarted Lanczos with full reorthogonalization. Each cycle
/// builds a Krylov basis of at most `krylov_dim` vectors, projects the operator
/// onto a real symmetric tridiagonal matrix, and restarts from the Ritz vector
/// of the largest Ritz value.
#[derive(Debug, Clone)]
pub struct LanczosEigensolver {
    options: EigenOptions,
}

impl LanczosEigensolver {
    pub fn new(options: EigenOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EigenOptions {
        &self.options
    }
}

impl Default for LanczosEigensolver {
    fn default() -> Self {
        Self::new(EigenOptions::default())
    }
}

impl DominantEigensolver for LanczosEigensolver {
    fn name(&self) -> &'static str {
        "lanczos"
    }

    fn dominant_eigenpair(&self, operator: &dyn HermitianOperator) -> InitResult<Eigenpair> {
        let n = check_dimension(operator)?;
        let krylov_dim = self.options.krylov_dim.max(2).min(n);
        let mut applications = 0usize;
        let mut start = random_unit_vector(n, self.options.seed);
        let mut start_image: Option<CVector> = None;
        let mut cycles = 0usize;

        loop {
            let budget = self.options.max_iterations.saturating_sub(applications);
            let cycle = lanczos_cycle(
                operator,
                &start,
                start_image.take(),
                krylov_dim,
                budget,
                &mut applications,
            )?;
            cycles += 1;

            let mut ritz = cycle.ritz_vector;
            if normalize(&mut ritz).is_none() {
                return Err(InitError::ConvergenceFailure {
                    iterations: applications,
                    residual: f64::INFINITY,
                });
            }
            let image = operator.apply(&ritz)?;
            applications += 1;
            let value = rayleigh_quotient(&ritz, &image);
            let residual = relative_residual(&ritz, &image, value);
            trace!(
                "lanczos cycle {}: steps={} ritz={:.6e} residual={:.3e}",
                cycles, cycle.steps, value, residual
            );

            if residual <= self.options.tolerance {
                debug!(
                    "lanczos converged after {} cycles ({} applications), eigenvalue {:.6e}",
                    cycles, applications, value
                );
                return Ok(Eigenpair {
                    value,
                    vector: ritz,
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

            start = ritz;
            start_image = Some(image);
        }
    }
}

struct LanczosCycle {
    ritz_vector: CVector,
    steps: usize,
}

fn lanczos_cycle(
    operator: &dyn HermitianOperator,
    start: &CVector,
    start_image: Option<CVector>,
    krylov_dim: usize,
    budget: usize,
    applications: &mut usize,
) -> InitResult<LanczosCycle> {
    let mut basis: Vec<CVector> = Vec::with_capacity(krylov_dim);
    let mut alphas: Vec<f64> = Vec::with_capacity(krylov_dim);
    let mut betas: Vec<f64> = Vec::with_capacity(krylov_dim);
    let mut scale = 0.0f64;
    let mut spent = 0usize;

    basis.push(start.clone());
    let mut pending_image = start_image;

    for j in 0..krylov_dim {
        let mut w = match pending_image.take() {
            Some(image) => image,
            None => {
                if spent >= budget && j > 0 {
                    break;
                }
                let image = operator.apply(&basis[j])?;
                spent += 1;
                *applications += 1;
                image
            }
        };

        let alpha = basis[j].dotc(&w).re;
        alphas.push(alpha);
        w.axpy(Complex64::new(-alpha, 0.0), &basis[j], Complex64::new(1.0, 0.0));
        if j > 0 {
            w.axpy(
                Complex64::new(-betas[j - 1], 0.0),
                &basis[j - 1],
                Complex64::new(1.0, 0.0),
            );
        }

        // Two passes of classical Gram-Schmidt keep the basis orthonormal.
        for _ in 0..2 {
            for v in &basis {
                let coefficient = v.dotc(&w);
                w.axpy(-coefficient, v, Complex64::new(1.0, 0.0));
            }
        }

        let beta = w.norm();
        scale = scale.max(alpha.abs()).max(beta);
        if j + 1 == krylov_dim || beta <= BREAKDOWN_TOLERANCE * scale.max(f64::MIN_POSITIVE) {
            break;
        }
        betas.push(beta);
        w.unscale_mut(beta);
        basis.push(w);
    }

    let steps = alphas.len();
    let tridiagonal = build_tridiagonal(&alphas, &betas[..steps.saturating_sub(1)]);
    let eigen = SymmetricEigen::new(tridiagonal);
    let (top, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |best, (idx, &value)| {
            if value > best.1 { (idx, value) } else { best }
        });
    let coefficients = eigen.eigenvectors.column(top);

    let mut ritz_vector = CVector::zeros(start.len());
    for (v, &c) in basis.iter().take(steps).zip(coefficients.iter()) {
        ritz_vector.axpy(Complex64::new(c, 0.0), v, Complex64::new(1.0, 0.0));
    }

    Ok(LanczosCycle { ritz_vector, steps })
}

fn build_tridiagonal(alphas: &[f64], betas: &[f64]) -> DMatrix<f64> {
    let n = alphas.len();
    let mut matrix = DMatrix::zeros(n, n);
    for i in 0..n {
        matrix[(i, i)] = alphas[i];
        if i + 1 < n {
            let b = betas.get(i).copied().unwrap_or(0.0);
            matrix[(i, i + 1)] = b;
            matrix[(i + 1, i)] = b;
        }
    }
    matrix
}
