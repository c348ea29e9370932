pub mod analysis;

pub use analysis::{AnalysisConfig, MasteryAnalysisClient, parse_estimates};
