use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::LogEntry;

/// One day of the activity series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A parsed, finite observation.
    Valid(f64),
    /// No log entry existed for this day.
    Missing,
    /// A log entry existed but its field was not a finite number.
    Invalid,
}

impl Sample {
    /// Parse a raw log field. Non-finite values (`nan`, `inf`) count as invalid.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Sample::Valid(value),
            _ => Sample::Invalid,
        }
    }

    pub fn as_valid(&self) -> Option<f64> {
        match *self {
            Sample::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Sample::Valid(_))
    }
}

/// Value substituted for `Missing` and `Invalid` samples when a series is read
/// as plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    Zero,
    NotANumber,
    Constant(f64),
}

impl MissingPolicy {
    pub fn fill_value(&self) -> f64 {
        match *self {
            MissingPolicy::Zero => 0.0,
            MissingPolicy::NotANumber => f64::NAN,
            MissingPolicy::Constant(value) => value,
        }
    }
}

/// Contiguous daily series starting at `epoch`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    epoch: NaiveDate,
    samples: Vec<Sample>,
    policy: MissingPolicy,
}

impl Series {
    /// Gap-fill ordered log entries into one sample per day from `epoch`.
    pub fn build(
        entries: &[LogEntry],
        epoch: NaiveDate,
        policy: MissingPolicy,
    ) -> Result<Self, AnalysisError> {
        let mut samples = Vec::with_capacity(entries.len());
        let mut cursor = epoch;
        let mut gaps = 0usize;

        for entry in entries {
            if entry.date < cursor {
                return Err(AnalysisError::Sequence {
                    date: entry.date,
                    cursor,
                });
            }

            let gap = (entry.date - cursor).num_days() as usize;
            samples.extend(std::iter::repeat_n(Sample::Missing, gap));
            gaps += gap;

            samples.push(Sample::parse(&entry.raw_field));
            cursor = entry.date + Days::new(1);
        }

        tracing::debug!(
            "Built series from {}: {} days, {} entries, {} missing",
            epoch,
            samples.len(),
            entries.len(),
            gaps
        );

        Ok(Self {
            epoch,
            samples,
            policy,
        })
    }

    /// Series of valid samples, mainly for callers that already hold numbers.
    pub fn from_values(epoch: NaiveDate, values: &[f64], policy: MissingPolicy) -> Self {
        Self {
            epoch,
            samples: values.iter().copied().map(Sample::Valid).collect(),
            policy,
        }
    }

    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    pub fn policy(&self) -> MissingPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).copied()
    }

    /// Numeric value at `index`, with the missing policy applied.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.samples.get(index).map(|sample| match *sample {
            Sample::Valid(value) => value,
            Sample::Missing | Sample::Invalid => self.policy.fill_value(),
        })
    }

    /// Whole series as numbers, with the missing policy applied.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.value(i)).collect()
    }

    /// Calendar date of the sample at `index`.
    pub fn date_of(&self, index: usize) -> Option<NaiveDate> {
        self.epoch.checked_add_days(Days::new(index as u64))
    }

    pub fn count_valid(&self) -> usize {
        self.samples.iter().filter(|s| s.is_valid()).count()
    }

    pub fn count_missing(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| matches!(s, Sample::Missing))
            .count()
    }

    pub fn count_invalid(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| matches!(s, Sample::Invalid))
            .count()
    }
}
