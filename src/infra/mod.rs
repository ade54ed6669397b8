// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence:
//
//   checkpoint.rs — rolling model + optimizer checkpoint,
//                   training state and saved TrainConfig
//
//   metrics.rs    — per-step CSV summaries for the train and
//                   test phases, windowed/epoch accuracy
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Step summaries and accuracy accounting
pub mod metrics;
