// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model and optimizer code built on Burn:
//
//   model.rs     — RatioNet: one growable hidden layer,
//                  sigmoid ratio output
//
//   optimizer.rs — adam | sgd | rmsprop behind one trait,
//                  with record save/restore
//
//   estimator.rs — RatioEstimator: predict, train_step, grow,
//                  save_checkpoint, load_checkpoint
//
//   trainer.rs   — The epoch loop: batches from the sample
//                  generator, growth policy, checkpoints

/// Growable one-hidden-layer network
pub mod model;

/// Optimizer selection and persistence
pub mod optimizer;

/// Compression ratio estimator
pub mod estimator;

/// Online training loop
pub mod trainer;
