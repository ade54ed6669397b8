use anyhow::Result;
use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Linear, LinearConfig, Lstm, LstmConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::batcher::ClipBatch;
use crate::domain::cnn_kind::CnnKind;
use crate::ml::features::{output_shape, FeatureExtractor};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct ActionClassifierConfig {
    pub cnn:     CnnKind,
    pub height:  usize,
    pub width:   usize,
    pub classes: usize,
    #[config(default = 100)]
    pub hidden_size: usize,
}

impl ActionClassifierConfig {
    /// Build the network. Fails if the frame size is too small for the
    /// selected extractor.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ActionClassifier<B>> {
        let feature_size = output_shape(self.cnn, self.height, self.width)?.size();
        Ok(ActionClassifier {
            features: FeatureExtractor::new(self.cnn, device),
            lstm:     LstmConfig::new(feature_size, self.hidden_size, true).init(device),
            head:     LinearConfig::new(self.hidden_size, self.classes).init(device),
        })
    }
}

/// CNN per frame → LSTM over frames → mean over time → dense + ReLU logits.
#[derive(Module, Debug)]
pub struct ActionClassifier<B: Backend> {
    pub features: FeatureExtractor<B>,
    pub lstm:     Lstm<B>,
    pub head:     Linear<B>,
}

pub struct ClassificationOutput<B: Backend> {
    pub loss:   Tensor<B, 1>,
    pub logits: Tensor<B, 2>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationOutput<B> {
    pub fn loss_value(&self) -> f64 {
        self.loss.clone().into_scalar().elem::<f64>()
    }

    /// Fraction of clips whose arg-max class equals the label.
    pub fn accuracy(&self) -> f64 {
        let [clips, _] = self.logits.dims();
        let correct: i64 = self
            .logits
            .clone()
            .argmax(1)
            .reshape([clips])
            .equal(self.labels.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct as f64 / clips.max(1) as f64
    }
}

impl<B: Backend> ActionClassifier<B> {
    /// frames: [clips * frames_per_clip, 3, H, W] → logits: [clips, classes]
    pub fn forward(&self, frames: Tensor<B, 4>, frames_per_clip: usize) -> Result<Tensor<B, 2>> {
        let features     = self.features.forward(frames)?;
        let [total, size] = features.dims();
        let clips        = total / frames_per_clip;

        // zero initial state
        let sequence = features.reshape([clips, frames_per_clip, size]);
        let (outputs, _) = self.lstm.forward(sequence, None);

        let [_, _, hidden] = outputs.dims();
        let pooled = outputs.mean_dim(1).reshape([clips, hidden]);
        // the dense layer keeps its activation, so logits are non-negative
        Ok(relu(self.head.forward(pooled)))
    }

    /// Forward pass plus sparse softmax cross-entropy against the labels.
    pub fn forward_classification(&self, batch: ClipBatch<B>) -> Result<ClassificationOutput<B>> {
        let logits = self.forward(batch.frames, batch.frames_per_clip)?;
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.labels.clone());
        Ok(ClassificationOutput { loss, logits, labels: batch.labels })
    }

    /// Trainable parameter counts per component.
    pub fn param_summary(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("features", self.features.num_params()),
            ("lstm",     self.lstm.num_params()),
            ("dense",    self.head.num_params()),
        ]
    }
}
