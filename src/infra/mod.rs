// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — Estimator records (Burn file recorders),
//                   the checkpoint manifest, the run config
//                   snapshot. Writes are atomic per revision.
//
//   metrics.rs    — Per-epoch metrics appended to a CSV file.
//
//   progress.rs   — Console TrainingObserver (indicatif bars,
//                   epoch summary lines, metrics rows).
//
//   chart.rs      — Performance reporter: training history
//                   rendered as an SVG chart with plotters.

/// Estimator checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Console progress observer
pub mod progress;

/// Training-curve chart
pub mod chart;
