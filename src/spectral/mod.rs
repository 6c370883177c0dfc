pub mod eigen;
pub mod lanczos;
pub mod power;
pub mod scaling;
pub mod truncation;
pub mod weighted;

pub use eigen::{DominantEigensolver, EigenOptions, Eigenpair, HermitianOperator, SolverKind};
pub use lanczos::LanczosEigensolver;
pub use power::PowerIteration;
pub use scaling::{ScaleFit, fit_residual, rescale};
pub use truncation::{InclusionMask, TRUNCATION_ALPHA};
pub use weighted::WeightedOperator;
