//! Bright-region counting on 2-D intensity grids.
//!
//! Pixels at or above a threshold are kept, the masked grid is smoothed so
//! nearby bright pixels merge into blobs, and the nonzero footprint of the
//! smoothed grid is labelled into connected components.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity as LabelConnectivity};
use serde::{Deserialize, Serialize};

use crate::error::ImageSourceError;

/// Row-major grid of pixel intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityGrid {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl IntensityGrid {
    /// Wrap a row-major buffer. Dimension mismatches are reported when counting.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Build from rows. Ragged rows yield a grid that counts as malformed.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let data = rows.into_iter().flatten().collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn check_shape(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty grid ({}x{})", self.width, self.height));
        }
        if self.width.checked_mul(self.height) != Some(self.data.len()) {
            return Err(format!(
                "grid buffer holds {} values, expected {}x{}",
                self.data.len(),
                self.width,
                self.height
            ));
        }
        if u32::try_from(self.width).is_err() || u32::try_from(self.height).is_err() {
            return Err(format!("grid too large ({}x{})", self.width, self.height));
        }
        Ok(())
    }
}

/// Smoothing filter applied to the masked grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKernel {
    /// Flat disk of the given radius: the footprint grows by exactly the radius.
    #[default]
    Disk,
    /// Gaussian with sigma equal to the radius.
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

impl From<Connectivity> for LabelConnectivity {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => LabelConnectivity::Four,
            Connectivity::Eight => LabelConnectivity::Eight,
        }
    }
}

/// Result of counting one image. Anything but `Counted` is the invalid sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RegionOutcome {
    Counted { regions: usize },
    DecodeFailed { reason: String },
    Malformed { reason: String },
}

impl RegionOutcome {
    pub fn count(&self) -> Option<usize> {
        match self {
            RegionOutcome::Counted { regions } => Some(*regions),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.count().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionCounterConfig {
    pub threshold: f32,
    pub smoothing_radius: u32,
    #[serde(default)]
    pub smoothing: SmoothingKernel,
    #[serde(default)]
    pub connectivity: Connectivity,
}

/// Counts bright regions in intensity grids.
#[derive(Debug, Clone)]
pub struct RegionCounter {
    config: RegionCounterConfig,
}

impl RegionCounter {
    pub fn new(config: RegionCounterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegionCounterConfig {
        &self.config
    }

    /// Count regions in a grid handed over by the image layer, which may have
    /// failed to decode it.
    pub fn count_decoded(&self, decoded: Result<IntensityGrid, ImageSourceError>) -> RegionOutcome {
        match decoded {
            Ok(grid) => self.count(&grid),
            Err(e) => RegionOutcome::DecodeFailed {
                reason: e.to_string(),
            },
        }
    }

    /// Threshold, smooth and label `grid`, returning the number of regions.
    pub fn count(&self, grid: &IntensityGrid) -> RegionOutcome {
        if let Err(reason) = grid.check_shape() {
            return RegionOutcome::Malformed { reason };
        }

        let threshold = self.config.threshold;
        let masked: Vec<f32> = grid
            .data
            .iter()
            .map(|&v| if v >= threshold { v } else { 0.0 })
            .collect();

        let radius = self.config.smoothing_radius;
        let smoothed = if radius == 0 {
            masked
        } else {
            match self.config.smoothing {
                SmoothingKernel::Disk => {
                    disk_smooth(&masked, grid.width, grid.height, radius as usize)
                }
                SmoothingKernel::Gaussian => {
                    let (w, h) = (grid.width as u32, grid.height as u32);
                    match gaussian_smooth(masked, w, h, radius as f32) {
                        Some(smoothed) => smoothed,
                        None => {
                            return RegionOutcome::Malformed {
                                reason: "grid buffer does not match its dimensions".to_string(),
                            }
                        }
                    }
                }
            }
        };

        let footprint = GrayImage::from_fn(grid.width as u32, grid.height as u32, |x, y| {
            let v = smoothed[y as usize * grid.width + x as usize];
            if v != 0.0 && !v.is_nan() {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let labels = connected_components(&footprint, self.config.connectivity.into(), Luma([0u8]));
        let regions = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;

        tracing::trace!(
            "Counted {} regions in {}x{} grid",
            regions,
            grid.width,
            grid.height
        );
        RegionOutcome::Counted { regions }
    }
}

/// Mean over a flat disk of `radius`, using per-row prefix sums so each output
/// pixel costs one lookup per disk row.
fn disk_smooth(values: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let half_widths: Vec<usize> = (0..=radius)
        .map(|dy| ((radius * radius - dy * dy) as f64).sqrt().floor() as usize)
        .collect();

    let mut area = 0usize;
    for dy in -(radius as i64)..=radius as i64 {
        area += 2 * half_widths[dy.unsigned_abs() as usize] + 1;
    }
    let norm = 1.0 / area as f64;

    // prefix[y][x] = sum of row y over columns < x
    let mut prefix = vec![0.0f64; height * (width + 1)];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        let base = y * (width + 1);
        for (x, &v) in row.iter().enumerate() {
            prefix[base + x + 1] = prefix[base + x] + v as f64;
        }
    }

    let mut out = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f64;
            let y_lo = y.saturating_sub(radius);
            let y_hi = (y + radius).min(height - 1);
            for yy in y_lo..=y_hi {
                let hw = half_widths[yy.abs_diff(y)];
                let x_lo = x.saturating_sub(hw);
                let x_hi = (x + hw).min(width - 1);
                let base = yy * (width + 1);
                sum += prefix[base + x_hi + 1] - prefix[base + x_lo];
            }
            out[y * width + x] = (sum * norm) as f32;
        }
    }
    out
}

fn gaussian_smooth(values: Vec<f32>, width: u32, height: u32, sigma: f32) -> Option<Vec<f32>> {
    let image: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(width, height, values)?;
    let blurred = imageproc::filter::gaussian_blur_f32(&image, sigma);
    Some(blurred.into_raw())
}
