// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model and optimiser code lives here.
//
//   features.rs — the three convolutional front-ends
//                 (common, inception, vgg16) and their
//                 per-frame output shapes
//
//   model.rs    — CNN per frame → LSTM(100) over frames →
//                 mean over time → dense logits, plus the
//                 cross-entropy objective and accuracy
//
//   trainer.rs  — begin_training / begin_test: the step
//                 loop, report cadence, checkpointing
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// Convolutional feature extractors
pub mod features;

/// Action classifier architecture
pub mod model;

/// Train / test loop with checkpointing
pub mod trainer;
