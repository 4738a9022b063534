//! Queue occupancy metrics.

use serde::{Deserialize, Serialize};

/// Counts of jobs per set, with a breakdown of the terminal set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueMetrics {
    /// Jobs waiting to be dequeued.
    pub pending: u64,
    /// Jobs handed out and not yet reported.
    pub in_flight: u64,
    /// Jobs in a terminal state.
    pub terminal: u64,
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
}

impl QueueMetrics {
    /// Jobs that may still make progress (pending + in-flight).
    pub fn active(&self) -> u64 {
        self.pending + self.in_flight
    }

    /// Every job the queue currently tracks.
    pub fn total(&self) -> u64 {
        self.active() + self.terminal
    }

    /// Completed share of completed + failed, as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let processed = self.completed + self.failed;
        if processed == 0 {
            None
        } else {
            Some((self.completed as f64 / processed as f64) * 100.0)
        }
    }
}
