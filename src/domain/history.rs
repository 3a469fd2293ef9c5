// ============================================================
// Layer 3 — Training History
// ============================================================
// One EpochMetrics row per completed epoch, appended in order.
// The trainer owns the history; the metrics logger and the chart
// reporter only read it.

use serde::{Deserialize, Serialize};

/// Metrics for a single completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Sample-weighted mean MSE (ratio space) over the epoch's batches
    pub loss: f64,

    /// Hidden units of the estimator while this epoch trained
    pub hidden_size: usize,

    /// Samples that reached a successful train step
    pub samples: usize,

    /// Batches skipped because no sample could be generated for them
    /// or their loss was not finite
    pub failed_batches: usize,

    /// Wall-clock duration of the epoch
    pub elapsed_ms: u64,
}

impl EpochMetrics {
    /// Returns true if this epoch improved over `best_loss` by at least
    /// the relative margin `min_improvement`.
    pub fn is_improvement(&self, best_loss: f64, min_improvement: f64) -> bool {
        self.loss < best_loss * (1.0 - min_improvement)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Epoch numbers at which the hidden size was larger than in the
    /// epoch before.
    pub fn growth_epochs(&self) -> Vec<usize> {
        self.epochs
            .windows(2)
            .filter(|w| w[1].hidden_size > w[0].hidden_size)
            .map(|w| w[1].epoch)
            .collect()
    }

    /// Number of trailing epochs, counted from `since_epoch` (exclusive),
    /// that failed to improve on the best loss seen in that window.
    pub fn epochs_without_improvement(&self, since_epoch: usize, min_improvement: f64) -> usize {
        let mut best = f64::INFINITY;
        let mut stale = 0;
        for m in self.epochs.iter().filter(|m| m.epoch > since_epoch) {
            if m.is_improvement(best, min_improvement) || best.is_infinite() {
                best = m.loss;
                stale = 0;
            } else {
                stale += 1;
            }
        }
        stale
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: usize, loss: f64, hidden_size: usize) -> EpochMetrics {
        EpochMetrics { epoch, loss, hidden_size, samples: 10, failed_batches: 0, elapsed_ms: 1 }
    }

    #[test]
    fn test_is_improvement() {
        let m = row(2, 0.9, 10);
        assert!(m.is_improvement(1.0, 0.05));
        // 0.9 is not 20% below 1.0
        assert!(!m.is_improvement(1.0, 0.2));
    }

    #[test]
    fn test_growth_epochs() {
        let mut h = TrainingHistory::new();
        h.push(row(1, 1.0, 10));
        h.push(row(2, 0.9, 10));
        h.push(row(3, 0.8, 18));
        h.push(row(4, 0.7, 26));
        assert_eq!(h.growth_epochs(), vec![3, 4]);
    }

    #[test]
    fn test_plateau_counting() {
        let mut h = TrainingHistory::new();
        h.push(row(1, 1.0, 10));
        h.push(row(2, 0.5, 10));
        h.push(row(3, 0.5, 10));
        h.push(row(4, 0.51, 10));
        assert_eq!(h.epochs_without_improvement(0, 0.01), 2);
        // Only epochs after 3 count: epoch 4 sets the baseline
        assert_eq!(h.epochs_without_improvement(3, 0.01), 0);
    }
}
