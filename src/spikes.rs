use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::SpikeRecord;
use crate::series::Series;

/// Inclusive value range a sample must fall in to count as a spike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeBand {
    pub low: f64,
    pub high: f64,
}

impl SpikeBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Collect the first `target` spikes at or after `start_index`.
///
/// Only `Valid` samples can match. After each spike the scan jumps ahead by
/// `min_gap` days so one event is not recorded twice.
pub fn locate(
    series: &Series,
    band: SpikeBand,
    start_index: usize,
    min_gap: usize,
    target: usize,
) -> Result<SpikeRecord, AnalysisError> {
    if target == 0 {
        return Err(AnalysisError::invalid_argument("spike target count must be positive"));
    }
    if min_gap == 0 {
        return Err(AnalysisError::invalid_argument("minimum spike gap must be at least 1"));
    }
    if !(band.low <= band.high) {
        return Err(AnalysisError::invalid_argument(format!(
            "spike band [{}, {}] is empty",
            band.low, band.high
        )));
    }

    let samples = series.samples();
    let mut indices = Vec::with_capacity(target);
    let mut position = start_index;

    while position < samples.len() && indices.len() < target {
        match samples[position].as_valid() {
            Some(value) if band.contains(value) => {
                indices.push(position);
                position += min_gap;
            }
            _ => position += 1,
        }
    }

    if indices.len() < target {
        return Err(AnalysisError::insufficient_data(target, indices.len()));
    }

    tracing::debug!("Located {} spikes: {:?}", indices.len(), indices);
    Ok(SpikeRecord { indices })
}

/// Predict the next spike index by a least-squares line through
/// `(rank, index)`, evaluated one rank past the record, minus `cycle_length`.
pub fn extrapolate(record: &SpikeRecord, cycle_length: i64) -> Result<i64, AnalysisError> {
    let k = record.len();
    if k < 2 {
        return Err(AnalysisError::insufficient_data(2, k));
    }

    let design = DMatrix::from_fn(k, 2, |row, col| if col == 0 { 1.0 } else { row as f64 });
    let observed = DVector::from_iterator(k, record.indices.iter().map(|&i| i as f64));

    // Normal equations: (XᵀX) β = Xᵀy
    let xtx = design.transpose() * &design;
    let xty = design.transpose() * &observed;
    let inverse = xtx
        .try_inverse()
        .ok_or_else(|| AnalysisError::invalid_argument("degenerate spike ranks"))?;
    let coefficients = inverse * xty;

    let (intercept, slope) = (coefficients[0], coefficients[1]);
    let predicted = (intercept + slope * k as f64).round() as i64;

    tracing::debug!(
        "Spike fit: index = {:.3} + {:.3} * rank, next at {}",
        intercept,
        slope,
        predicted
    );

    Ok(predicted - cycle_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEntry;
    use crate::series::MissingPolicy;
    use chrono::{Days, NaiveDate};

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2005, 1, 1).unwrap()
    }

    fn series_of(values: &[f64]) -> Series {
        Series::from_values(epoch(), values, MissingPolicy::Zero)
    }

    const BAND: SpikeBand = SpikeBand {
        low: 50.0,
        high: 80.0,
    };

    #[test]
    fn test_extrapolate_even_spacing() {
        let record = SpikeRecord {
            indices: vec![100, 400, 700, 1000, 1300],
        };
        assert_eq!(extrapolate(&record, 0).unwrap(), 1600);
        assert_eq!(extrapolate(&record, 365).unwrap(), 1235);
    }

    #[test]
    fn test_extrapolate_least_squares() {
        // Best fit through (0,0) (1,10) (2,14): slope 7, intercept 1; rank 3 -> 22
        let record = SpikeRecord {
            indices: vec![0, 10, 14],
        };
        assert_eq!(extrapolate(&record, 0).unwrap(), 22);
    }

    #[test]
    fn test_extrapolate_is_deterministic() {
        let record = SpikeRecord {
            indices: vec![3, 41, 70, 122, 150, 199],
        };
        let first = extrapolate(&record, 10).unwrap();
        for _ in 0..5 {
            assert_eq!(extrapolate(&record, 10).unwrap(), first);
        }
    }

    #[test]
    fn test_extrapolate_requires_two_points() {
        let record = SpikeRecord { indices: vec![5] };
        assert_eq!(
            extrapolate(&record, 0),
            Err(AnalysisError::InsufficientData {
                required: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_locate_with_gap() {
        let mut values = vec![0.0; 40];
        // One event spanning several days, then two more.
        values[5] = 60.0;
        values[6] = 65.0;
        values[7] = 70.0;
        values[20] = 55.0;
        values[30] = 90.0; // above band
        values[33] = 80.0;
        let series = series_of(&values);

        let record = locate(&series, BAND, 0, 5, 3).unwrap();
        assert_eq!(record.indices, vec![5, 20, 33]);
    }

    #[test]
    fn test_locate_without_gap_records_every_day() {
        let mut values = vec![0.0; 10];
        values[2] = 60.0;
        values[3] = 60.0;
        let series = series_of(&values);

        let record = locate(&series, BAND, 0, 1, 2).unwrap();
        assert_eq!(record.indices, vec![2, 3]);
    }

    #[test]
    fn test_locate_from_start_index() {
        let mut values = vec![0.0; 20];
        values[2] = 60.0;
        values[12] = 60.0;
        values[18] = 60.0;
        let series = series_of(&values);

        let record = locate(&series, BAND, 10, 3, 2).unwrap();
        assert_eq!(record.indices, vec![12, 18]);
    }

    #[test]
    fn test_locate_insufficient() {
        let mut values = vec![0.0; 20];
        values[4] = 70.0;
        let series = series_of(&values);

        assert_eq!(
            locate(&series, BAND, 0, 3, 2),
            Err(AnalysisError::InsufficientData {
                required: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_locate_ignores_filled_samples() {
        // A zero band would match Missing samples under the zero policy if
        // tags were ignored.
        let entries = vec![
            LogEntry {
                date: epoch(),
                raw_field: "5".into(),
            },
            LogEntry {
                date: epoch() + Days::new(3),
                raw_field: "0".into(),
            },
        ];
        let series = Series::build(&entries, epoch(), MissingPolicy::Zero).unwrap();
        let band = SpikeBand {
            low: -1.0,
            high: 1.0,
        };

        let record = locate(&series, band, 0, 1, 1).unwrap();
        assert_eq!(record.indices, vec![3]);
    }

    #[test]
    fn test_locate_rejects_bad_parameters() {
        let series = series_of(&[60.0; 5]);
        assert!(locate(&series, BAND, 0, 0, 1).is_err());
        assert!(locate(&series, BAND, 0, 1, 0).is_err());
        let inverted = SpikeBand {
            low: 10.0,
            high: 1.0,
        };
        assert!(matches!(
            locate(&series, inverted, 0, 1, 1),
            Err(AnalysisError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_locate_then_extrapolate() {
        let mut values = vec![0.0; 1500];
        for i in [100usize, 400, 700, 1000, 1300] {
            values[i] = 75.0;
            values[i + 1] = 72.0;
        }
        let series = series_of(&values);

        let record = locate(&series, BAND, 0, 30, 5).unwrap();
        assert_eq!(record.indices, vec![100, 400, 700, 1000, 1300]);
        assert_eq!(extrapolate(&record, 0).unwrap(), 1600);
    }
}
