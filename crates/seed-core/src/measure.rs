//! Wall-clock timing of repeated collaborator runs.
//!
//! These are the only performance numbers seed reports. Every value is
//! derived from an actual run; nothing is estimated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub iterations: usize,
    pub durations_ms: Vec<u64>,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub median_ms: f64,
}

impl Measurement {
    /// Summarize `durations_ms`. Returns `None` for an empty sample.
    pub fn from_durations(durations_ms: Vec<u64>) -> Option<Self> {
        if durations_ms.is_empty() {
            return None;
        }
        let mut sorted = durations_ms.clone();
        sorted.sort_unstable();

        let n = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let median_ms = if n % 2 == 1 {
            sorted[n / 2] as f64
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
        };

        Some(Self {
            iterations: n,
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            mean_ms: sum as f64 / n as f64,
            median_ms,
            durations_ms,
        })
    }
}

/// Change of `current` relative to `baseline`, both measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub baseline_mean_ms: f64,
    pub current_mean_ms: f64,
    pub delta_ms: f64,
    /// `None` when the baseline mean is zero.
    pub delta_pct: Option<f64>,
}

impl Comparison {
    pub fn between(baseline: &Measurement, current: &Measurement) -> Self {
        let delta_ms = current.mean_ms - baseline.mean_ms;
        let delta_pct = (baseline.mean_ms > 0.0).then(|| delta_ms / baseline.mean_ms * 100.0);
        Self {
            baseline_mean_ms: baseline.mean_ms,
            current_mean_ms: current.mean_ms,
            delta_ms,
            delta_pct,
        }
    }
}
