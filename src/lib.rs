pub mod error;
pub mod operator;
pub mod pipeline;
pub mod problem;
pub mod spectral;
pub mod synthetic;
pub mod verify;

pub use error::{InitError, InitResult};
pub use operator::{CVector, CallableOperator, MeasurementOperator, NormalizedOperator};
pub use pipeline::{InitConfig, InitOutcome, SpectralInitializer, spectral_initialize};
pub use problem::{EstimateWriter, Problem, ProblemLoader, ProblemWriter};
pub use spectral::{
    DominantEigensolver, EigenOptions, Eigenpair, HermitianOperator, InclusionMask,
    LanczosEigensolver, PowerIteration, SolverKind,
};
pub use synthetic::{SyntheticConfig, SyntheticProblem};
