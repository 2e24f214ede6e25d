pub mod activity_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod correlation;
pub mod error;
pub mod image_source;
pub mod kernel;
pub mod models;
pub mod regions;
pub mod series;
pub mod spikes;

// Main entry point
pub mod cli_main;

// Re-export commonly used items
pub use error::AnalysisError;
pub use kernel::Kernel;
pub use regions::{IntensityGrid, RegionCounter, RegionOutcome};
pub use series::{MissingPolicy, Sample, Series};
