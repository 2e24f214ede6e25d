use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Anchor, AnchorSet};
use crate::regions::{Connectivity, RegionCounterConfig, SmoothingKernel};
use crate::series::MissingPolicy;
use crate::spikes::SpikeBand;

/// Main configuration structure for Heliotrace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Series construction
    pub series: SeriesConfig,
    /// Phase scan parameters
    pub phase: PhaseConfig,
    /// Spike location and extrapolation
    pub spikes: SpikeConfig,
    /// Optional region counting parameters (CLI flags may supply them instead)
    pub regions: Option<RegionsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Date of the first sample
    pub epoch: NaiveDate,
    /// Value used for missing and invalid days (default: zero)
    #[serde(default)]
    pub missing_policy: MissingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Odd window length
    pub kernel_length: i64,
    /// Smallest offset scanned, in days
    pub offset_min: i64,
    /// Largest offset scanned, in days
    pub offset_max: i64,
    /// Expected pattern positions
    pub anchors: Vec<Anchor>,
    /// Cycle length for the seasonal profile (default: 365)
    pub profile_period: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeConfig {
    pub band_low: f64,
    pub band_high: f64,
    /// First series index scanned (default: 0)
    #[serde(default)]
    pub start_index: usize,
    /// Days skipped after each recorded spike
    pub min_gap: usize,
    /// Number of spikes fitted
    pub target_count: usize,
    /// Subtracted from the extrapolated index
    pub cycle_length: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsConfig {
    pub threshold: Option<f32>,
    pub smoothing_radius: Option<u32>,
    /// Smoothing filter (default: disk)
    pub smoothing: Option<SmoothingKernel>,
    /// Pixel connectivity (default: four)
    pub connectivity: Option<Connectivity>,
    /// Prefix of emitted log lines (default: "efz")
    pub line_prefix: Option<String>,
}

impl PhaseConfig {
    pub fn anchor_set(&self) -> AnchorSet {
        AnchorSet::new(self.anchors.clone())
    }

    pub fn get_profile_period(&self) -> usize {
        self.profile_period.unwrap_or(365)
    }
}

impl SpikeConfig {
    pub fn band(&self) -> SpikeBand {
        SpikeBand {
            low: self.band_low,
            high: self.band_high,
        }
    }
}

impl RegionsConfig {
    /// Resolve region counter settings, prioritizing CLI values.
    pub fn resolve(
        config: Option<&RegionsConfig>,
        threshold: Option<f32>,
        smoothing_radius: Option<u32>,
    ) -> Result<RegionCounterConfig> {
        let threshold = threshold
            .or_else(|| config.and_then(|c| c.threshold))
            .context("Region threshold must be given in [regions] or with --threshold")?;
        let smoothing_radius = smoothing_radius
            .or_else(|| config.and_then(|c| c.smoothing_radius))
            .context("Smoothing radius must be given in [regions] or with --radius")?;

        if !threshold.is_finite() {
            return Err(anyhow::anyhow!(
                "Region threshold must be finite, got: {}",
                threshold
            ));
        }

        Ok(RegionCounterConfig {
            threshold,
            smoothing_radius,
            smoothing: config.and_then(|c| c.smoothing).unwrap_or_default(),
            connectivity: config.and_then(|c| c.connectivity).unwrap_or_default(),
        })
    }

    pub fn get_line_prefix(config: Option<&RegionsConfig>) -> String {
        config
            .and_then(|c| c.line_prefix.clone())
            .unwrap_or_else(|| "efz".to_string())
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml_edit::de::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml_edit::ser::to_string_pretty(self)
            .context("Failed to serialize configuration to TOML")?;

        std::fs::write(&path, toml_string)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Merge configuration with command line arguments, prioritizing CLI values
    pub fn merge_with_cli(
        &mut self,
        epoch: Option<NaiveDate>,
        offset_range: Option<(i64, i64)>,
        cycle_length: Option<i64>,
    ) {
        if let Some(epoch) = epoch {
            self.series.epoch = epoch;
        }

        if let Some((min, max)) = offset_range {
            self.phase.offset_min = min;
            self.phase.offset_max = max;
        }

        if let Some(cycle) = cycle_length {
            self.spikes.cycle_length = cycle;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let phase = &self.phase;
        if phase.kernel_length <= 0 || phase.kernel_length % 2 == 0 {
            return Err(anyhow::anyhow!(
                "Kernel length must be odd and positive, got: {}",
                phase.kernel_length
            ));
        }

        if phase.offset_min > phase.offset_max {
            return Err(anyhow::anyhow!(
                "Offset range is empty: {}..={}",
                phase.offset_min,
                phase.offset_max
            ));
        }

        if phase.anchors.is_empty() {
            return Err(anyhow::anyhow!("At least one anchor must be specified"));
        }

        let total_weight: f64 = phase.anchors.iter().map(|a| a.weight).sum();
        if !(total_weight.is_finite() && total_weight > 0.0) {
            return Err(anyhow::anyhow!(
                "Anchor weights must sum to a positive value, got: {}",
                total_weight
            ));
        }

        if phase.get_profile_period() == 0 {
            return Err(anyhow::anyhow!("Profile period must be positive"));
        }

        let spikes = &self.spikes;
        if !(spikes.band_low <= spikes.band_high) {
            return Err(anyhow::anyhow!(
                "Spike band is empty: [{}, {}]",
                spikes.band_low,
                spikes.band_high
            ));
        }

        if spikes.min_gap == 0 {
            return Err(anyhow::anyhow!("Minimum spike gap must be at least 1"));
        }

        if spikes.target_count < 2 {
            return Err(anyhow::anyhow!(
                "Spike target count must be at least 2 for a line fit, got: {}",
                spikes.target_count
            ));
        }

        Ok(())
    }
}
