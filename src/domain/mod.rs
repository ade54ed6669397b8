// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing the problem: a labelled video
// clip, the clip geometry a run is configured for, and which
// convolutional feature extractor to build.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A labelled clip of RGB frames
pub mod clip;

// Feature extractor selection
pub mod cnn_kind;

// Core abstractions (traits) that other layers implement
pub mod traits;
