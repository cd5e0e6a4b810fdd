//! Run diagnostics: tick counts, stalls, and per-stage transfer counts.
//!
//! Every [`sim::run`](crate::sim::run) produces a [`RunReport`]. Counts are
//! in ticks and tokens only; the library has no notion of wall-clock time.
//! Callers that want durations measure them around the run.

use serde::{Deserialize, Serialize};

/// Transfer counts for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// Pipeline depth in ticks.
    pub depth: usize,
    /// Valid tokens accepted from upstream.
    pub accepted: u64,
    /// Valid tokens transferred downstream.
    pub emitted: u64,
}

/// Counts collected over one simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Total ticks simulated, including drain.
    pub ticks: u64,
    /// Ticks on which the consumer was not ready.
    pub stalled_ticks: u64,
    /// Valid tokens the source handed to the chain.
    pub accepted: u64,
    /// Valid tokens the chain handed to the sink.
    pub emitted: u64,
    /// Total chain depth.
    pub depth: usize,
    /// Per-stage counts, in stream order.
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// Fraction of ticks lost to backpressure.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stall_ratio(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.stalled_ticks as f64 / self.ticks as f64
        }
    }

    /// Format the report as human-readable text.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Stream Run Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Ticks: {} ({} stalled, {:.1}%)",
            self.ticks,
            self.stalled_ticks,
            self.stall_ratio() * 100.0,
        ));
        lines.push(format!(
            "Tokens in: {}  |  Tokens out: {}  |  Depth: {}",
            self.accepted, self.emitted, self.depth,
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>6} {:>12} {:>12}",
            "Stage", "Depth", "Accepted", "Emitted"
        ));
        lines.push("-".repeat(60));
        for stage in &self.stages {
            lines.push(format!(
                "{:<16} {:>6} {:>12} {:>12}",
                stage.name, stage.depth, stage.accepted, stage.emitted,
            ));
        }

        lines.join("\n")
    }
}
