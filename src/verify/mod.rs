pub mod correlation;
pub mod scale_fit;

pub use correlation::{CorrelationCheck, CorrelationReport, align_phase, correlation, relative_error};
pub use scale_fit::{ScaleFitCheck, ScaleFitReport};
