//! JSON snapshot of the metric set

use crate::{Counter, Gauge, Metrics, Timer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every metric at one point in time, keyed by exported name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Gauge values
    pub gauges: BTreeMap<String, i64>,
    /// Timer summaries
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Summary of one timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean, in microseconds
    pub mean: f64,
    /// Observations
    pub count: u64,
    /// Largest observation, in microseconds
    pub max: u64,
    /// Per-bucket counts; the last entry is the overflow bucket
    pub buckets: Vec<u64>,
}

impl MetricsSnapshot {
    /// Capture every metric of `metrics`
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let counters = Counter::ALL
            .iter()
            .map(|c| (c.name().to_string(), metrics.count(*c)))
            .collect();
        let gauges = Gauge::ALL
            .iter()
            .map(|g| (g.name().to_string(), metrics.gauge(*g)))
            .collect();
        let histograms = Timer::ALL
            .iter()
            .map(|t| {
                let h = metrics.timer(*t);
                let summary = HistogramSummary {
                    mean: h.mean(),
                    count: h.total_count(),
                    max: h.max(),
                    buckets: h.bucket_counts(),
                };
                (t.name().to_string(), summary)
            })
            .collect();

        Self {
            counters,
            gauges,
            histograms,
        }
    }

    /// Value of `counter` in this snapshot
    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(counter.name()).copied().unwrap_or(0)
    }

    /// Export as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
