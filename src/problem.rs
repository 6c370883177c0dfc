use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::operator::{CVector, MeasurementOperator};
use crate::pipeline::{InitConfig, InitOutcome};
use crate::synthetic::SyntheticProblem;

/// On-disk problem layout. The matrix is stored row-major as separate real and
/// imaginary parts; `imag` may be omitted for real operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProblem {
    pub rows: usize,
    pub cols: usize,
    pub real: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imag: Option<Vec<f64>>,
    pub measurements: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<RawVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<InitConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVector {
    pub real: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imag: Option<Vec<f64>>,
}

impl RawVector {
    pub fn from_vector(vector: &CVector) -> Self {
        let imag: Vec<f64> = vector.iter().map(|v| v.im).collect();
        Self {
            real: vector.iter().map(|v| v.re).collect(),
            imag: if imag.iter().all(|v| *v == 0.0) {
                None
            } else {
                Some(imag)
            },
        }
    }

    pub fn to_vector(&self) -> Result<CVector> {
        let values = combine_parts(&self.real, self.imag.as_deref())?;
        Ok(CVector::from_vec(values))
    }
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub matrix: DMatrix<Complex64>,
    pub measurements: Vec<f64>,
    /// Reference signal, when known.
    pub signal: Option<CVector>,
    pub config: Option<InitConfig>,
}

impl Problem {
    pub fn operator(&self) -> MeasurementOperator {
        MeasurementOperator::dense(self.matrix.clone())
    }

    pub fn from_synthetic(problem: &SyntheticProblem) -> Self {
        Self {
            matrix: problem.matrix.clone(),
            measurements: problem.measurements.clone(),
            signal: Some(problem.signal.clone()),
            config: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProblemLoader;

impl ProblemLoader {
    pub fn from_json_str(json: &str) -> Result<Problem> {
        let raw: RawProblem = serde_json::from_str(json).context("parse problem JSON")?;
        Self::from_raw(raw)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Problem> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }

    pub fn from_path(path: &Path) -> Result<Problem> {
        let file = File::open(path).with_context(|| format!("open problem file {:?}", path))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("load problem from {:?}", path))
    }

    pub fn from_raw(raw: RawProblem) -> Result<Problem> {
        let expected = raw
            .rows
            .checked_mul(raw.cols)
            .ok_or_else(|| anyhow!("Matrix shape {}x{} overflows", raw.rows, raw.cols))?;
        if raw.real.len() != expected {
            return Err(anyhow!(
                "Matrix has {} real entries, expected {}x{} = {}",
                raw.real.len(),
                raw.rows,
                raw.cols,
                expected
            ));
        }
        if raw.measurements.len() != raw.rows {
            return Err(anyhow!(
                "Problem has {} measurements for {} matrix rows",
                raw.measurements.len(),
                raw.rows
            ));
        }

        let entries = combine_parts(&raw.real, raw.imag.as_deref())?;
        let matrix = DMatrix::from_row_slice(raw.rows, raw.cols, &entries);

        let signal = match raw.signal {
            Some(signal) => {
                let vector = signal.to_vector()?;
                if vector.len() != raw.cols {
                    return Err(anyhow!(
                        "Reference signal has length {}, expected {}",
                        vector.len(),
                        raw.cols
                    ));
                }
                Some(vector)
            }
            None => None,
        };

        Ok(Problem {
            matrix,
            measurements: raw.measurements,
            signal,
            config: raw.config,
        })
    }
}

/// Exports problems in the format `ProblemLoader` reads.
pub struct ProblemWriter;

impl ProblemWriter {
    pub fn to_raw(problem: &Problem) -> RawProblem {
        let (rows, cols) = problem.matrix.shape();
        let mut real = Vec::with_capacity(rows * cols);
        let mut imag = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                let value = problem.matrix[(i, j)];
                real.push(value.re);
                imag.push(value.im);
            }
        }
        let is_real = imag.iter().all(|v| *v == 0.0);
        RawProblem {
            rows,
            cols,
            real,
            imag: if is_real { None } else { Some(imag) },
            measurements: problem.measurements.clone(),
            signal: problem.signal.as_ref().map(RawVector::from_vector),
            config: problem.config.clone(),
        }
    }

    pub fn to_json_string(problem: &Problem) -> Result<String> {
        let raw = Self::to_raw(problem);
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn write_to_path(problem: &Problem, path: &Path) -> Result<()> {
        let json = Self::to_json_string(problem)?;
        let mut file = File::create(path).with_context(|| format!("create {:?}", path))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEstimate {
    pub estimate: RawVector,
    pub eigenvalue: f64,
    pub scale: Option<f64>,
    pub iterations: usize,
    pub residual: f64,
    pub solver: String,
    pub included: Vec<bool>,
    pub lambda0: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
    pub elapsed_ms: f64,
}

pub struct EstimateWriter;

impl EstimateWriter {
    pub fn to_raw(outcome: &InitOutcome, correlation: Option<f64>) -> RawEstimate {
        RawEstimate {
            estimate: RawVector::from_vector(&outcome.estimate),
            eigenvalue: outcome.eigenvalue,
            scale: outcome.scale,
            iterations: outcome.iterations,
            residual: outcome.residual,
            solver: outcome.solver.to_string(),
            included: outcome.mask.as_slice().to_vec(),
            lambda0: outcome.mask.lambda0(),
            correlation,
            elapsed_ms: outcome.elapsed.as_secs_f64() * 1e3,
        }
    }

    pub fn write_to_path(
        outcome: &InitOutcome,
        correlation: Option<f64>,
        path: &Path,
    ) -> Result<()> {
        let raw = Self::to_raw(outcome, correlation);
        let file = File::create(path).with_context(|| format!("create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &raw)?;
        writer.flush()?;
        Ok(())
    }
}

fn combine_parts(real: &[f64], imag: Option<&[f64]>) -> Result<Vec<Complex64>> {
    match imag {
        Some(imag) => {
            if imag.len() != real.len() {
                return Err(anyhow!(
                    "Imaginary part has {} entries, real part has {}",
                    imag.len(),
                    real.len()
                ));
            }
            Ok(real
                .iter()
                .zip(imag)
                .map(|(re, im)| Complex64::new(*re, *im))
                .collect())
        }
        None => Ok(real.iter().map(|re| Complex64::new(*re, 0.0)).collect()),
    }
}
