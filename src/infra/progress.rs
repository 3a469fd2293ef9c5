// ============================================================
// Layer 6 — Console Progress
// ============================================================
// TrainingObserver for the CLI: one indicatif bar per epoch,
// a summary line when the epoch ends, and (optionally) a row
// in metrics.csv.

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::{history::EpochMetrics, traits::TrainingObserver};
use crate::infra::metrics::MetricsLogger;

const BAR_TEMPLATE: &str =
    "Epoch {prefix} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}";

#[derive(Default)]
pub struct ConsoleObserver {
    bar:     Option<ProgressBar>,
    metrics: Option<MetricsLogger>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every finished epoch to `logger`.
    pub fn with_metrics(mut self, logger: MetricsLogger) -> Self {
        self.metrics = Some(logger);
        self
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl TrainingObserver for ConsoleObserver {
    fn on_epoch_start(&mut self, epoch: usize, total_epochs: usize, batches: usize) {
        let bar = ProgressBar::new(batches as u64);
        bar.set_style(Self::style());
        bar.set_prefix(format!("{epoch}/{total_epochs}"));
        self.bar = Some(bar);
    }

    fn on_batch(&mut self, _epoch: usize, _batch: usize, loss: f32) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("loss={loss:.6}"));
            bar.inc(1);
        }
    }

    fn on_batch_skipped(&mut self, _epoch: usize, _batch: usize, _reason: &str) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_epoch_end(&mut self, m: &EpochMetrics) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!(
            "Epoch {:>3} | loss={:.6} | hidden={} | samples={} | failed_batches={} | {:.1}s",
            m.epoch,
            m.loss,
            m.hidden_size,
            m.samples,
            m.failed_batches,
            m.elapsed_ms as f64 / 1000.0,
        );
        if let Some(logger) = &self.metrics {
            if let Err(e) = logger.log(m) {
                tracing::warn!("Cannot write metrics row: {e:#}");
            }
        }
    }

    fn on_growth(&mut self, epoch: usize, from: usize, to: usize) {
        println!("          grew after epoch {epoch}: {from} → {to} hidden units");
    }

    fn on_checkpoint(&mut self, epoch: usize) {
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }
}
