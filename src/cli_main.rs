use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use crate::cli::{Cli, Commands};
use crate::commands::{
    analyze, collect_images, count_images, count_log_lines, print_profile, print_report, profile,
    write_count_json, write_count_log,
};
use crate::config::{Config, RegionsConfig};

fn init_tracing(verbose: bool) {
    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load config file: {}", path))?;
    Ok(config)
}

fn load_config_if_present(path: &str) -> Result<Option<Config>> {
    if Path::new(path).exists() {
        load_config(path).map(Some)
    } else {
        Ok(None)
    }
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Count {
            path,
            output,
            threshold,
            radius,
            format,
        } => {
            // Counting only needs [regions], which CLI flags can replace entirely
            let config = load_config_if_present(&cli.config)?;
            let regions = config.as_ref().and_then(|c| c.regions.as_ref());
            let counter_config = RegionsConfig::resolve(regions, threshold, radius)?;
            let prefix = RegionsConfig::get_line_prefix(regions);

            let images = collect_images(Path::new(&path))?;
            if images.is_empty() {
                tracing::warn!("📭 No images found in {}", path);
                return Ok(());
            }
            tracing::info!(
                "🔍 Counting {} images (threshold {}, radius {})",
                images.len(),
                counter_config.threshold,
                counter_config.smoothing_radius
            );

            let results = count_images(&images, counter_config);
            let output = output.as_deref().map(Path::new);
            match format.as_str() {
                "json" => write_count_json(&results, output)?,
                _ => {
                    let lines = count_log_lines(&results, &prefix);
                    write_count_log(&lines, output)?;
                }
            }
        }
        Commands::Analyze {
            log,
            epoch,
            offset_min,
            offset_max,
            cycle_length,
            format,
        } => {
            let mut config = load_config(&cli.config)?;
            let offset_range = offset_min.zip(offset_max);
            config.merge_with_cli(epoch, offset_range, cycle_length);
            config
                .validate()
                .context("Configuration validation failed")?;

            let report = analyze(&config, Path::new(&log))?;
            print_report(&report, &format)?;
        }
        Commands::Profile { log, period } => {
            let config = load_config(&cli.config)?;
            config
                .validate()
                .context("Configuration validation failed")?;

            let values = profile(&config, Path::new(&log), period)?;
            print_profile(&values);
        }
    }

    Ok(())
}
