use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::error::AnalysisError;
use crate::kernel::Kernel;
use crate::models::{AnchorSet, PhaseEstimate};
use crate::series::Series;

/// Dot product of `kernel` with the window of `series` centred at `centre`.
///
/// The window must lie entirely inside the series; it is never clipped.
pub fn local_score(series: &Series, kernel: &Kernel, centre: i64) -> Result<f64, AnalysisError> {
    let h = kernel.half_width();
    let out_of_range = || AnalysisError::IndexOutOfRange {
        centre,
        half_width: h,
        len: series.len(),
    };
    let reach = i64::try_from(h).map_err(|_| out_of_range())?;
    let start = centre.checked_sub(reach).ok_or_else(out_of_range)?;
    let end = centre.checked_add(reach).ok_or_else(out_of_range)?;

    if start < 0 || end >= series.len() as i64 {
        return Err(out_of_range());
    }

    let start = start as usize;
    Ok(kernel
        .weights()
        .iter()
        .enumerate()
        .map(|(i, w)| w * series.value(start + i).unwrap_or(f64::NAN))
        .sum())
}

/// Weighted mean of the local scores at every anchor shifted by `offset`.
/// `None` when any anchor's window falls outside the series, including a
/// shifted index that overflows.
fn offset_score(
    series: &Series,
    kernel: &Kernel,
    anchors: &AnchorSet,
    total_weight: f64,
    offset: i64,
) -> Option<f64> {
    let mut sum = 0.0;
    for anchor in anchors.iter() {
        let centre = anchor.index.checked_add(offset)?;
        sum += anchor.weight * local_score(series, kernel, centre).ok()?;
    }
    Some(sum / total_weight)
}

/// Keep the higher score; equal scores keep the smaller offset.
fn pick_best(a: PhaseEstimate, b: PhaseEstimate) -> PhaseEstimate {
    if b.score > a.score || (b.score == a.score && b.offset < a.offset) {
        b
    } else {
        a
    }
}

/// Find the offset in `offsets` at which the kernel best aligns with the anchors.
///
/// Offsets are scored independently and in parallel. Offsets whose windows
/// leave the series, or whose score is NaN, are skipped. Among equal maxima the
/// smallest offset wins, regardless of evaluation order.
pub fn scan_phase(
    series: &Series,
    kernel: &Kernel,
    anchors: &AnchorSet,
    offsets: RangeInclusive<i64>,
) -> Result<PhaseEstimate, AnalysisError> {
    if anchors.is_empty() {
        return Err(AnalysisError::invalid_argument("anchor set is empty"));
    }
    let total_weight = anchors.total_weight();
    if !(total_weight.is_finite() && total_weight != 0.0) {
        return Err(AnalysisError::invalid_argument(format!(
            "anchor weights must have a finite non-zero total, got {}",
            total_weight
        )));
    }

    let (start, end) = (*offsets.start(), *offsets.end());

    let best = offsets
        .into_par_iter()
        .filter_map(|offset| {
            offset_score(series, kernel, anchors, total_weight, offset)
                .filter(|score| !score.is_nan())
                .map(|score| PhaseEstimate { offset, score })
        })
        .reduce_with(pick_best);

    match best {
        Some(estimate) => {
            tracing::debug!(
                "Phase scan over {}..={}: best offset {} (score {:.6})",
                start,
                end,
                estimate.offset,
                estimate.score
            );
            Ok(estimate)
        }
        None => Err(AnalysisError::NoScorableOffset { start, end }),
    }
}

/// Mean kernel-normalized score for each position within a cycle of `period`
/// days, averaged over every cycle whose window fits in the series.
pub fn seasonal_profile(
    series: &Series,
    kernel: &Kernel,
    period: usize,
) -> Result<Vec<Option<f64>>, AnalysisError> {
    if period == 0 {
        return Err(AnalysisError::invalid_argument("profile period must be positive"));
    }
    let total = kernel.total();
    let cycles = series.len().div_ceil(period);

    let profile = (0..period)
        .into_par_iter()
        .map(|day| {
            let scores: Vec<f64> = (0..cycles)
                .filter_map(|cycle| {
                    local_score(series, kernel, (day + cycle * period) as i64).ok()
                })
                .map(|score| score / total)
                .collect();

            if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            }
        })
        .collect();

    Ok(profile)
}
