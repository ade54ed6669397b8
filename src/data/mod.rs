// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between segmented clip files on disk and tensors
// on the device:
//
//   *.clips / *.clips.gz
//       │
//       ▼
//   codec        → binary record layout (read / skip / write)
//       │
//       ▼
//   ClipReader   → random labelled clip, cut to the run's shape
//       │
//       ▼
//   ClipBatcher  → [frames, 3, H, W] float + [clips] int labels
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Segmented clip file format
pub mod codec;

/// Random sampling over a segmented set directory
pub mod reader;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
