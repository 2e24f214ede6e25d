use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A dated raw field as read from an activity log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: NaiveDate,
    pub raw_field: String,
}

/// Expected position of a recurring pattern and its relative importance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub index: i64,
    pub weight: f64,
}

/// Ordered anchors used to score phase offsets. Weights need not sum to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    pub fn new(anchors: Vec<Anchor>) -> Self {
        Self { anchors }
    }

    /// Anchors of equal weight at each index.
    pub fn uniform(indices: &[i64]) -> Self {
        Self {
            anchors: indices
                .iter()
                .map(|&index| Anchor { index, weight: 1.0 })
                .collect(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
        self.anchors.iter()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.anchors.iter().map(|a| a.weight).sum()
    }
}

/// Best alignment found by a phase scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseEstimate {
    pub offset: i64,
    pub score: f64,
}

/// Indices of located spikes, in scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeRecord {
    pub indices: Vec<usize>,
}

impl SpikeRecord {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Series statistics included in an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub epoch: NaiveDate,
    pub days: usize,
    pub valid: usize,
    pub missing: usize,
    pub invalid: usize,
}

/// Outcome of the `analyze` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub series: SeriesSummary,
    pub phase: PhaseEstimate,
    pub spikes: Option<SpikeRecord>,
    /// Extrapolated spike index relative to the latest full cycle.
    pub next_spike: Option<i64>,
    /// Reason the extrapolation was not produced, if any.
    pub spike_error: Option<String>,
}
