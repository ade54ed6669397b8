// ============================================================
// Layer 3 — Clip Domain Types
// ============================================================
// A clip is a short run of consecutive RGB frames cut out of a
// video, labelled with the action it shows. Pixels are stored
// frame-major, then row-major, with interleaved RGB channels:
//
//   pixels[((f * height + y) * width + x) * 3 + c]
//
// This matches the byte order of the segmented dataset files.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Number of colour channels per pixel (RGB).
pub const CHANNELS: usize = 3;

/// The geometry every clip fed to the network must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipShape {
    pub frames: usize,
    pub height: usize,
    pub width:  usize,
}

impl ClipShape {
    pub fn new(frames: usize, height: usize, width: usize) -> Self {
        Self { frames, height, width }
    }

    /// Bytes in a single frame.
    pub fn frame_len(&self) -> usize {
        self.height * self.width * CHANNELS
    }

    /// Bytes in the whole clip.
    pub fn pixel_len(&self) -> usize {
        self.frames * self.frame_len()
    }

    /// Like `pixel_len`, but `None` when the product overflows.
    pub fn checked_pixel_len(&self) -> Option<usize> {
        self.frames
            .checked_mul(self.height)?
            .checked_mul(self.width)?
            .checked_mul(CHANNELS)
    }
}

/// One labelled example: `shape.frames` frames plus the action label.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoClip {
    pub label:  u32,
    pub shape:  ClipShape,
    pub pixels: Vec<u8>,
}

impl VideoClip {
    /// Build a clip, checking that the pixel buffer matches the shape.
    pub fn new(label: u32, shape: ClipShape, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != shape.pixel_len() {
            bail!(
                "clip has {} pixel bytes, expected {} for {}x{}x{}x{}",
                pixels.len(),
                shape.pixel_len(),
                shape.frames,
                shape.height,
                shape.width,
                CHANNELS,
            );
        }
        Ok(Self { label, shape, pixels })
    }

    /// Keep `len` consecutive frames starting at `start`.
    ///
    /// Returns an error if the window runs past the end of the clip.
    pub fn window(&self, start: usize, len: usize) -> Result<VideoClip> {
        if len == 0 || start + len > self.shape.frames {
            bail!(
                "frame window {}..{} out of range for a {}-frame clip",
                start,
                start + len,
                self.shape.frames,
            );
        }
        let frame_len = self.shape.frame_len();
        let pixels    = self.pixels[start * frame_len..(start + len) * frame_len].to_vec();
        let shape     = ClipShape { frames: len, ..self.shape };
        Ok(VideoClip { label: self.label, shape, pixels })
    }
}
