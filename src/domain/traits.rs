// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop only ever asks for "another random labelled
// clip". Anything that can answer that implements ExampleSource:
//
//   - ClipReader → samples from a directory of .clips files
//   - test doubles in the ml layer's unit tests
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::clip::VideoClip;

/// A source of randomly sampled labelled clips.
pub trait ExampleSource {
    /// Draw one clip at random.
    fn random_example(&mut self) -> Result<VideoClip>;
}
