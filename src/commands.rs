use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::activity_log::{self, format_line, outcome_value};
use crate::config::Config;
use crate::correlation::{scan_phase, seasonal_profile};
use crate::image_source::{is_supported_image, load_grid};
use crate::kernel::Kernel;
use crate::models::{AnalysisReport, SeriesSummary};
use crate::regions::{RegionCounter, RegionCounterConfig, RegionOutcome};
use crate::series::Series;
use crate::spikes::{extrapolate, locate};

/// Load a log file and gap-fill it into a series using the configured epoch.
pub fn load_series(config: &Config, log_path: &Path) -> Result<Series> {
    let entries = activity_log::read_log_file(log_path)
        .with_context(|| format!("Failed to read activity log: {}", log_path.display()))?;

    let series = Series::build(&entries, config.series.epoch, config.series.missing_policy)
        .with_context(|| format!("Failed to build series from {}", log_path.display()))?;

    tracing::info!(
        "📈 Loaded {} days from {} ({} valid, {} missing, {} invalid)",
        series.len(),
        log_path.display(),
        series.count_valid(),
        series.count_missing(),
        series.count_invalid()
    );
    Ok(series)
}

/// Build the series, estimate the phase and extrapolate the next spike.
///
/// A failed extrapolation is recorded in the report rather than aborting, so
/// the phase result is still available.
pub fn analyze(config: &Config, log_path: &Path) -> Result<AnalysisReport> {
    let series = load_series(config, log_path)?;
    let kernel = Kernel::triangular(config.phase.kernel_length)?;
    let anchors = config.phase.anchor_set();

    let phase = scan_phase(
        &series,
        &kernel,
        &anchors,
        config.phase.offset_min..=config.phase.offset_max,
    )
    .context("Phase scan failed")?;
    tracing::info!("🎯 Phase offset {} (score {:.4})", phase.offset, phase.score);

    let spike_cfg = &config.spikes;
    let spikes = locate(
        &series,
        spike_cfg.band(),
        spike_cfg.start_index,
        spike_cfg.min_gap,
        spike_cfg.target_count,
    );

    let fitted = spikes.and_then(|record| {
        extrapolate(&record, spike_cfg.cycle_length).map(|next| (record, next))
    });

    let (spikes, next_spike, spike_error) = match fitted {
        Ok((record, next)) => {
            tracing::info!("🔭 Next spike at index {}", next);
            (Some(record), Some(next), None)
        }
        Err(e) => {
            tracing::warn!("⚠️  Spike extrapolation skipped: {}", e);
            (None, None, Some(e.to_string()))
        }
    };

    Ok(AnalysisReport {
        series: SeriesSummary {
            epoch: series.epoch(),
            days: series.len(),
            valid: series.count_valid(),
            missing: series.count_missing(),
            invalid: series.count_invalid(),
        },
        phase,
        spikes,
        next_spike,
        spike_error,
    })
}

pub fn print_report(report: &AnalysisReport, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => {
            println!("{}", report.phase.offset);
            match report.next_spike {
                Some(next) => println!("{}", next),
                None => println!("nan"),
            }
        }
    }
    Ok(())
}

/// Seasonal profile of the series with the configured kernel.
pub fn profile(config: &Config, log_path: &Path, period: Option<usize>) -> Result<Vec<Option<f64>>> {
    let series = load_series(config, log_path)?;
    let kernel = Kernel::triangular(config.phase.kernel_length)?;
    let period = period.unwrap_or_else(|| config.phase.get_profile_period());

    let profile = seasonal_profile(&series, &kernel, period)?;
    let covered = profile.iter().filter(|v| v.is_some()).count();
    tracing::info!("🗓️  Profile over {} days, {} covered", period, covered);
    Ok(profile)
}

pub fn print_profile(profile: &[Option<f64>]) {
    println!("day,value");
    for (day, value) in profile.iter().enumerate() {
        match value {
            Some(v) => println!("{},{}", day, v),
            None => println!("{},", day),
        }
    }
}

/// Region count for one image file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountedImage {
    pub path: PathBuf,
    pub timestamp: Option<NaiveDateTime>,
    pub outcome: RegionOutcome,
}

/// Image files under `path`, sorted by name. A single file is returned as is.
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read image directory: {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}

/// Count bright regions in every image, in parallel. Unreadable images yield
/// an invalid outcome instead of failing the batch.
pub fn count_images(paths: &[PathBuf], config: RegionCounterConfig) -> Vec<CountedImage> {
    let counter = RegionCounter::new(config);
    let start = Instant::now();

    let results: Vec<CountedImage> = paths
        .par_iter()
        .map(|path| {
            let outcome = counter.count_decoded(load_grid(path));
            if let RegionOutcome::DecodeFailed { reason } | RegionOutcome::Malformed { reason } =
                &outcome
            {
                tracing::warn!("⚠️  {}: {}", path.display(), reason);
            } else {
                tracing::debug!("{}: {:?}", path.display(), outcome);
            }

            let timestamp = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(activity_log::timestamp_from_name);

            CountedImage {
                path: path.clone(),
                timestamp,
                outcome,
            }
        })
        .collect();

    let invalid = results.iter().filter(|r| r.outcome.is_invalid()).count();
    tracing::info!(
        "🔆 Counted {} images in {} ({} invalid)",
        results.len(),
        humantime::format_duration(std::time::Duration::from_millis(
            start.elapsed().as_millis() as u64
        )),
        invalid
    );
    results
}

/// Render counted images as log lines. Images without a timestamp in their
/// name cannot be placed in the series and are skipped.
pub fn count_log_lines(results: &[CountedImage], prefix: &str) -> Vec<String> {
    results
        .iter()
        .filter_map(|result| match result.timestamp {
            Some(ts) => Some(format_line(prefix, ts, &outcome_value(&result.outcome))),
            None => {
                tracing::warn!(
                    "⏭️  No date in file name, skipping: {}",
                    result.path.display()
                );
                None
            }
        })
        .collect()
}

/// Write log lines to stdout, or append them to `output`.
pub fn write_count_log(lines: &[String], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open output log: {}", path.display()))?;
            activity_log::write_lines(file, lines)
                .with_context(|| format!("Failed to write output log: {}", path.display()))?;
            tracing::info!("💾 Appended {} lines to {}", lines.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            activity_log::write_lines(stdout.lock(), lines)?;
        }
    }
    Ok(())
}

/// Write counted images as pretty JSON to stdout, or replace `output` with it.
pub fn write_count_json(results: &[CountedImage], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("Failed to write JSON output: {}", path.display()))?;
            tracing::info!("💾 Wrote {} results to {}", results.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
