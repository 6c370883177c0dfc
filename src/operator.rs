use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{InitError, InitResult};

pub type CVector = DVector<Complex64>;

/// Shared closure type for matrix-free forward and adjoint actions.
pub type LinearMap = Arc<dyn Fn(&CVector) -> CVector + Send + Sync>;

/// Forward action supplied as a closure, with the adjoint and signal dimension
/// the caller must provide alongside it.
#[derive(Clone)]
pub struct CallableOperator {
    forward: LinearMap,
    adjoint: Option<LinearMap>,
    dim: Option<usize>,
}

impl CallableOperator {
    pub fn new<F>(forward: F) -> Self
    where
        F: Fn(&CVector) -> CVector + Send + Sync + 'static,
    {
        Self {
            forward: Arc::new(forward),
            adjoint: None,
            dim: None,
        }
    }

    pub fn with_adjoint<G>(mut self, adjoint: G) -> Self
    where
        G: Fn(&CVector) -> CVector + Send + Sync + 'static,
    {
        self.adjoint = Some(Arc::new(adjoint));
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = Some(dim);
        self
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn has_adjoint(&self) -> bool {
        self.adjoint.is_some()
    }
}

impl fmt::Debug for CallableOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableOperator")
            .field("adjoint", &self.adjoint.is_some())
            .field("dim", &self.dim)
            .finish()
    }
}

/// Measurement operator mapping the signal space (dimension n) into the
/// measurement space (dimension m).
#[derive(Debug, Clone)]
pub enum MeasurementOperator {
    Dense(DMatrix<Complex64>),
    Callable(CallableOperator),
}

impl MeasurementOperator {
    pub fn dense(matrix: DMatrix<Complex64>) -> Self {
        MeasurementOperator::Dense(matrix)
    }

    /// Promotes a real matrix to the complex representation used throughout.
    pub fn from_real(matrix: &DMatrix<f64>) -> Self {
        MeasurementOperator::Dense(matrix.map(|v| Complex64::new(v, 0.0)))
    }

    pub fn callable(operator: CallableOperator) -> Self {
        MeasurementOperator::Callable(operator)
    }

    /// Signal dimension if it is known without normalizing.
    pub fn signal_dim(&self) -> Option<usize> {
        match self {
            MeasurementOperator::Dense(matrix) => Some(matrix.ncols()),
            MeasurementOperator::Callable(op) => op.dim,
        }
    }

    /// Resolves the operator into a uniform forward/adjoint pair checked against
    /// `measurements` (the length of the measurement vector).
    pub fn normalize(&self, measurements: usize) -> InitResult<NormalizedOperator<'_>> {
        match self {
            MeasurementOperator::Dense(matrix) => {
                if matrix.nrows() != measurements {
                    return Err(InitError::invalid(format!(
                        "operator has {} rows but {} measurements were supplied",
                        matrix.nrows(),
                        measurements
                    )));
                }
                if matrix.ncols() == 0 {
                    return Err(InitError::invalid("operator has zero columns"));
                }
                Ok(NormalizedOperator {
                    forward: Box::new(move |x: &CVector| matrix * x),
                    adjoint: Box::new(move |y: &CVector| matrix.ad_mul(y)),
                    dim: matrix.ncols(),
                    measurements,
                })
            }
            MeasurementOperator::Callable(op) => {
                let adjoint = op.adjoint.as_ref().ok_or_else(|| {
                    InitError::invalid("an adjoint is required when the operator is a closure")
                })?;
                let dim = op.dim.ok_or_else(|| {
                    InitError::invalid(
                        "the signal dimension is required when the operator is a closure",
                    )
                })?;
                if dim == 0 {
                    return Err(InitError::invalid("signal dimension must be positive"));
                }
                let forward = &op.forward;
                Ok(NormalizedOperator {
                    forward: Box::new(move |x: &CVector| forward(x)),
                    adjoint: Box::new(move |y: &CVector| adjoint(y)),
                    dim,
                    measurements,
                })
            }
        }
    }
}

impl From<DMatrix<Complex64>> for MeasurementOperator {
    fn from(matrix: DMatrix<Complex64>) -> Self {
        MeasurementOperator::Dense(matrix)
    }
}

impl From<CallableOperator> for MeasurementOperator {
    fn from(operator: CallableOperator) -> Self {
        MeasurementOperator::Callable(operator)
    }
}

type BorrowedMap<'a> = Box<dyn Fn(&CVector) -> CVector + Send + Sync + 'a>;

/// Canonical forward/adjoint pair consumed by every later stage.
pub struct NormalizedOperator<'a> {
    forward: BorrowedMap<'a>,
    adjoint: BorrowedMap<'a>,
    dim: usize,
    measurements: usize,
}

impl NormalizedOperator<'_> {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn measurements(&self) -> usize {
        self.measurements
    }

    pub fn apply(&self, x: &CVector) -> InitResult<CVector> {
        if x.len() != self.dim {
            return Err(InitError::invalid(format!(
                "forward input has length {}, expected {}",
                x.len(),
                self.dim
            )));
        }
        let y = (self.forward)(x);
        if y.len() != self.measurements {
            return Err(InitError::invalid(format!(
                "forward operator returned {} values for {} measurements",
                y.len(),
                self.measurements
            )));
        }
        Ok(y)
    }

    pub fn apply_adjoint(&self, y: &CVector) -> InitResult<CVector> {
        if y.len() != self.measurements {
            return Err(InitError::invalid(format!(
                "adjoint input has length {}, expected {}",
                y.len(),
                self.measurements
            )));
        }
        let x = (self.adjoint)(y);
        if x.len() != self.dim {
            return Err(InitError::invalid(format!(
                "adjoint operator returned {} values for signal dimension {}",
                x.len(),
                self.dim
            )));
        }
        Ok(x)
    }
}

impl fmt::Debug for NormalizedOperator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedOperator")
            .field("dim", &self.dim)
            .field("measurements", &self.measurements)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_matrix() -> DMatrix<Complex64> {
        DMatrix::from_row_slice(
            3,
            2,
            &[
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 1.0),
                Complex64::new(2.0, -1.0),
                Complex64::new(0.5, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(-1.0, 3.0),
            ],
        )
    }

    #[test]
    fn dense_operator_infers_dimension_and_adjoint() {
        let matrix = small_matrix();
        let operator = MeasurementOperator::dense(matrix.clone());
        let normalized = operator.normalize(3).expect("normalize");
        assert_eq!(normalized.dim(), 2);

        let x = DVector::from_vec(vec![Complex64::new(1.0, 2.0), Complex64::new(-0.5, 0.25)]);
        let y = DVector::from_vec(vec![
            Complex64::new(0.3, -1.0),
            Complex64::new(1.5, 0.0),
            Complex64::new(0.0, 2.0),
        ]);
        let ax = normalized.apply(&x).expect("apply");
        let aty = normalized.apply_adjoint(&y).expect("adjoint");

        // <Ax, y> == <x, A^H y>
        let lhs = ax.dotc(&y);
        let rhs = x.dotc(&aty);
        assert!((lhs - rhs).norm() < 1e-12);
    }

    #[test]
    fn dense_operator_rejects_row_mismatch() {
        let operator = MeasurementOperator::dense(small_matrix());
        let err = operator.normalize(4).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));
    }

    #[test]
    fn callable_requires_adjoint_and_dim() {
        let matrix = small_matrix();
        let forward_only = CallableOperator::new(move |x: &CVector| &matrix * x).with_dim(2);
        let err = MeasurementOperator::callable(forward_only)
            .normalize(3)
            .unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));

        let matrix = small_matrix();
        let adjoint_matrix = small_matrix();
        let no_dim = CallableOperator::new(move |x: &CVector| &matrix * x)
            .with_adjoint(move |y: &CVector| adjoint_matrix.ad_mul(y));
        let err = MeasurementOperator::callable(no_dim).normalize(3).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));
    }

    #[test]
    fn callable_output_length_is_checked() {
        let wrong = CallableOperator::new(|_x: &CVector| CVector::zeros(5))
            .with_adjoint(|_y: &CVector| CVector::zeros(2))
            .with_dim(2);
        let operator = MeasurementOperator::callable(wrong);
        let normalized = operator.normalize(3).expect("normalize");
        let err = normalized.apply(&CVector::zeros(2)).unwrap_err();
        assert!(matches!(err, InitError::InvalidArgument(_)));
    }

    #[test]
    fn real_matrix_is_promoted() {
        let real = DMatrix::from_row_slice(2, 2, &[1.0, -2.0, 0.5, 4.0]);
        let operator = MeasurementOperator::from_real(&real);
        assert_eq!(operator.signal_dim(), Some(2));
        match operator {
            MeasurementOperator::Dense(matrix) => {
                assert_eq!(matrix[(0, 1)], Complex64::new(-2.0, 0.0));
                assert!(matrix.iter().all(|v| v.im == 0.0));
            }
            MeasurementOperator::Callable(_) => panic!("expected dense operator"),
        }
    }
}
