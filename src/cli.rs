use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "heliotrace")]
#[command(about = "Solar activity series analysis and bright-region counting", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "heliotrace.toml")]
    pub config: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count bright regions in an image or a directory of images
    Count {
        /// Image file or directory
        path: String,

        /// Write results to this file instead of stdout (log lines are appended, JSON replaces)
        #[arg(short, long)]
        output: Option<String>,

        /// Intensity threshold (overrides [regions].threshold)
        #[arg(long)]
        threshold: Option<f32>,

        /// Smoothing radius in pixels (overrides [regions].smoothing_radius)
        #[arg(long)]
        radius: Option<u32>,

        /// Output format (log, json)
        #[arg(short, long, default_value = "log")]
        format: String,
    },

    /// Estimate the phase offset and extrapolate the next spike
    Analyze {
        /// Activity log file
        log: String,

        /// Override the series epoch (YYYY-MM-DD)
        #[arg(long)]
        epoch: Option<NaiveDate>,

        /// Override the smallest scanned offset
        #[arg(long, requires = "offset_max", allow_hyphen_values = true)]
        offset_min: Option<i64>,

        /// Override the largest scanned offset
        #[arg(long, requires = "offset_min", allow_hyphen_values = true)]
        offset_max: Option<i64>,

        /// Override the cycle length subtracted from the extrapolated index
        #[arg(long, allow_hyphen_values = true)]
        cycle_length: Option<i64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the seasonal activity profile as CSV
    Profile {
        /// Activity log file
        log: String,

        /// Cycle length in days (overrides [phase].profile_period)
        #[arg(long)]
        period: Option<usize>,
    },
}
