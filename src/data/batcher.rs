// ============================================================
// Layer 4 — Clip Batcher
// ============================================================
// Implements Burn's Batcher trait to turn VideoClips into
// tensors the network can consume.
//
//   Input:  Vec of N clips, each F frames of H×W RGB bytes (HWC)
//   Output: frames [N*F, 3, H, W] float in [0, 1]
//           labels [N]            int
//
// The frames of every clip become the batch axis of the
// convolutional extractor; the model folds them back into
// [N, F, features] before the LSTM.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::clip::{VideoClip, CHANNELS};

/// A batch of clips ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ClipBatch<B: Backend> {
    /// All frames of all clips — shape: [clips * frames, 3, height, width]
    pub frames: Tensor<B, 4>,

    /// One action label per clip — shape: [clips]
    pub labels: Tensor<B, 1, Int>,

    /// Frames per clip, needed to regroup frames into sequences
    pub frames_per_clip: usize,
}

#[derive(Clone, Debug)]
pub struct ClipBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClipBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<VideoClip, ClipBatch<B>> for ClipBatcher<B> {
    /// Panics if `items` is empty or the clips disagree on shape;
    /// the reader guarantees every clip matches the configured shape.
    fn batch(&self, items: Vec<VideoClip>) -> ClipBatch<B> {
        let shape = items[0].shape;
        assert!(
            items.iter().all(|c| c.shape == shape),
            "all clips in a batch must share one shape"
        );

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|c| c.pixels.iter().map(|&p| p as f32))
            .collect();
        let labels: Vec<i32> = items.iter().map(|c| c.label as i32).collect();

        let total_frames = items.len() * shape.frames;

        // Stored as HWC; Burn convolutions want CHW.
        let frames = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [total_frames, shape.height, shape.width, CHANNELS]),
            &self.device,
        )
        .permute([0, 3, 1, 2])
        .div_scalar(255.0);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ClipBatch { frames, labels, frames_per_clip: shape.frames }
    }
}
