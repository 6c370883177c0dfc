pub mod initializer;

pub use initializer::{InitConfig, InitOutcome, SpectralInitializer, spectral_initialize};
