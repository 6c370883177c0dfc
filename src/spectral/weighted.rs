use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{InitError, InitResult};
use crate::operator::{CVector, NormalizedOperator};
use crate::spectral::eigen::HermitianOperator;
use crate::spectral::truncation::InclusionMask;

const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Implicit operator `Y = (1/m) sum_i idx_i * b0_i^2 * a_i a_i^H`, applied as
/// `A^H (w .* (A x))` without ever forming `Y`.
pub struct WeightedOperator<'a> {
    operator: &'a NormalizedOperator<'a>,
    weights: Vec<f64>,
}

impl<'a> WeightedOperator<'a> {
    pub fn new(
        operator: &'a NormalizedOperator<'a>,
        b0: &[f64],
        mask: &InclusionMask,
    ) -> InitResult<Self> {
        let m = b0.len();
        if m == 0 {
            return Err(InitError::invalid("measurement vector is empty"));
        }
        if mask.len() != m || operator.measurements() != m {
            return Err(InitError::invalid(format!(
                "mask ({}) and operator ({}) must match the {} measurements",
                mask.len(),
                operator.measurements(),
                m
            )));
        }

        let inv_m = 1.0 / m as f64;
        let weights = b0
            .iter()
            .zip(mask.as_slice())
            .map(|(b, &keep)| if keep { b * b * inv_m } else { 0.0 })
            .collect();
        Ok(Self { operator, weights })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl HermitianOperator for WeightedOperator<'_> {
    fn dim(&self) -> usize {
        self.operator.dim()
    }

    fn apply(&self, x: &CVector) -> InitResult<CVector> {
        let mut ax = self.operator.apply(x)?;
        scale_in_place(ax.as_mut_slice(), &self.weights);
        self.operator.apply_adjoint(&ax)
    }
}

fn scale_in_place(values: &mut [Complex64], weights: &[f64]) {
    if values.len() >= PARALLEL_THRESHOLD {
        values
            .par_iter_mut()
            .zip(weights.par_iter())
            .for_each(|(v, w)| *v *= *w);
    } else {
        values
            .iter_mut()
            .zip(weights.iter())
            .for_each(|(v, w)| *v *= *w);
    }
}
