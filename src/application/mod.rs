// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal per
// command (train, estimate, synth).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination, with anyhow context naming
//     the stage that failed

// The training workflow
pub mod train_use_case;

// Size estimate for one image from the latest checkpoint
pub mod estimate_use_case;

// Image set generation from a prompt bank
pub mod synth_use_case;
