// ============================================================
// Layer 5 — Convolutional Feature Extractors
// ============================================================
// Three interchangeable front-ends that turn every frame of a
// clip into a feature map:
//
//   common    — 1×1/2 conv + batch norm, two 3×3 convs, two
//               stride-1 max pools
//   inception — stem, Inception-A block, Reduction-A block
//   vgg16     — the 13 VGG convolutions plus fc6/fc7/fc8,
//               applied per spatial position
//
// Padding follows two conventions:
//   SAME  → output = ceil(n / stride)
//   VALID → output = floor((n - k) / stride) + 1
// SAME is expressed as explicit padding so it also works with
// strided convolutions.
//
// Each extractor can report its per-frame output shape for a
// given input size, so the LSTM input width is known before any
// tensor is created.
//
// Reference: Szegedy et al. (2016) Inception-v4
//            Simonyan & Zisserman (2015) VGG

use anyhow::{bail, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::cnn_kind::CnnKind;

/// Output of an extractor for one frame, channels-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureShape {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl FeatureShape {
    /// Flattened feature length per frame.
    pub fn size(&self) -> usize {
        self.channels * self.height * self.width
    }
}

fn same(n: usize, stride: usize) -> usize {
    n.div_ceil(stride)
}

fn valid(n: usize, kernel: usize, stride: usize) -> Option<usize> {
    (n >= kernel).then(|| (n - kernel) / stride + 1)
}

fn common_side(n: usize) -> Option<usize> {
    let n = valid(same(n, 2), 3, 1)?;
    let n = valid(n, 3, 1)?;
    Some(same(n, 2))
}

fn inception_side(n: usize) -> Option<usize> {
    let n = valid(n, 3, 2)?;
    let n = valid(n, 3, 2)?;
    valid(n, 3, 2)
}

// five 2×2 stride-2 pools
fn vgg_side(n: usize) -> Option<usize> {
    let n = n >> 5;
    (n > 0).then_some(n)
}

fn xavier() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

/// Per-frame output shape of `kind` for `height × width` input frames.
///
/// Errors when the frames are too small to survive the extractor's
/// VALID convolutions and pools.
pub fn output_shape(kind: CnnKind, height: usize, width: usize) -> Result<FeatureShape> {
    let (channels, side): (usize, fn(usize) -> Option<usize>) = match kind {
        CnnKind::Common    => (32, common_side),
        CnnKind::Inception => (384 + 256 + 384, inception_side),
        CnnKind::Vgg16     => (VGG_FC8, vgg_side),
    };
    let shape = side(height)
        .zip(side(width))
        .map(|(height, width)| FeatureShape { channels, height, width });
    match shape {
        Some(s) => Ok(s),
        None    => bail!("{height}x{width} frames are too small for the {kind} extractor"),
    }
}

// ─── Shared building block ────────────────────────────────────────────────────

/// Convolution followed by optional batch norm and ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None       => x,
        };
        relu(x)
    }
}

// Running statistics move by 0.1% per training batch.
const BN_MOMENTUM: f64 = 0.001;
const BN_EPSILON:  f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct ConvSpec {
    channels:  [usize; 2],
    kernel:    usize,
    stride:    usize,
    padding:   usize,
    normalize: bool,
}

impl ConvSpec {
    /// Stride-1 convolution with SAME padding (odd kernels only).
    fn same(channels: [usize; 2], kernel: usize) -> Self {
        Self { channels, kernel, stride: 1, padding: kernel / 2, normalize: false }
    }

    /// Strided convolution with SAME output size.
    fn same_strided(channels: [usize; 2], kernel: usize, stride: usize) -> Self {
        Self { channels, kernel, stride, padding: kernel / 2, normalize: false }
    }

    fn valid(channels: [usize; 2], kernel: usize, stride: usize) -> Self {
        Self { channels, kernel, stride, padding: 0, normalize: false }
    }

    fn with_batch_norm(self) -> Self {
        Self { normalize: true, ..self }
    }

    fn init<B: Backend>(&self, initializer: Initializer, device: &B::Device) -> ConvBlock<B> {
        let conv = Conv2dConfig::new(self.channels, [self.kernel, self.kernel])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_initializer(initializer)
            // batch norm supplies the shift
            .with_bias(!self.normalize)
            .init(device);
        let norm = self.normalize.then(|| {
            BatchNormConfig::new(self.channels[1])
                .with_momentum(BN_MOMENTUM)
                .with_epsilon(BN_EPSILON)
                .init::<B, 2>(device)
        });
        ConvBlock { conv, norm }
    }
}

fn max_pool(kernel: usize, stride: usize) -> MaxPool2d {
    MaxPool2dConfig::new([kernel, kernel])
        .with_strides([stride, stride])
        .with_padding(PaddingConfig2d::Valid)
        .init()
}

fn run<B: Backend>(blocks: &[ConvBlock<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
    blocks.iter().fold(x, |x, block| block.forward(x))
}

// ─── common ───────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct CommonCnn<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub pool1: MaxPool2d,
    pub conv2: ConvBlock<B>,
    pub pool2: MaxPool2d,
    pub conv3: ConvBlock<B>,
}

impl<B: Backend> CommonCnn<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            conv1: ConvSpec::same_strided([3, 32], 1, 2).with_batch_norm().init(xavier(), device),
            pool1: max_pool(3, 1),
            conv2: ConvSpec::same([32, 32], 3).init(xavier(), device),
            pool2: max_pool(3, 1),
            conv3: ConvSpec::same_strided([32, 32], 3, 2).init(xavier(), device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.pool1.forward(self.conv1.forward(x));
        let x = self.pool2.forward(self.conv2.forward(x));
        self.conv3.forward(x)
    }
}

// ─── inception ────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct InceptionA<B: Backend> {
    pub branch0:      ConvBlock<B>,
    pub branch1:      Vec<ConvBlock<B>>,
    pub branch2:      Vec<ConvBlock<B>>,
    pub branch3_pool: AvgPool2d,
    pub branch3:      ConvBlock<B>,
}

impl<B: Backend> InceptionA<B> {
    fn new(in_channels: usize, device: &B::Device) -> Self {
        let c = in_channels;
        Self {
            branch0: ConvSpec::same([c, 96], 1).init(xavier(), device),
            branch1: vec![
                ConvSpec::same([c, 64], 1).init(xavier(), device),
                ConvSpec::same([64, 96], 3).init(xavier(), device),
            ],
            branch2: vec![
                ConvSpec::same([c, 64], 1).init(xavier(), device),
                ConvSpec::same([64, 96], 3).init(xavier(), device),
                ConvSpec::same([96, 96], 3).init(xavier(), device),
            ],
            branch3_pool: AvgPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_count_include_pad(false)
                .init(),
            branch3: ConvSpec::same([c, 96], 1).init(xavier(), device),
        }
    }

    /// [N, C, H, W] → [N, 384, H, W]
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b0 = self.branch0.forward(x.clone());
        let b1 = run(&self.branch1, x.clone());
        let b2 = run(&self.branch2, x.clone());
        let b3 = self.branch3.forward(self.branch3_pool.forward(x));
        Tensor::cat(vec![b0, b1, b2, b3], 1)
    }
}

#[derive(Module, Debug)]
pub struct ReductionA<B: Backend> {
    pub branch0: ConvBlock<B>,
    pub branch1: Vec<ConvBlock<B>>,
    pub branch2: MaxPool2d,
}

impl<B: Backend> ReductionA<B> {
    fn new(in_channels: usize, device: &B::Device) -> Self {
        let c = in_channels;
        Self {
            branch0: ConvSpec::valid([c, 384], 3, 2).init(xavier(), device),
            branch1: vec![
                ConvSpec::same([c, 192], 1).init(xavier(), device),
                ConvSpec::same([192, 224], 3).init(xavier(), device),
                ConvSpec::valid([224, 256], 3, 2).init(xavier(), device),
            ],
            branch2: max_pool(3, 2),
        }
    }

    /// [N, C, H, W] → [N, 640 + C, H', W']
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b0 = self.branch0.forward(x.clone());
        let b1 = run(&self.branch1, x.clone());
        let b2 = self.branch2.forward(x);
        Tensor::cat(vec![b0, b1, b2], 1)
    }
}

#[derive(Module, Debug)]
pub struct InceptionCnn<B: Backend> {
    pub stem:        Vec<ConvBlock<B>>,
    pub block_a:     InceptionA<B>,
    pub reduction_a: ReductionA<B>,
}

impl<B: Backend> InceptionCnn<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            stem: vec![
                ConvSpec::valid([3, 32], 3, 2).init(xavier(), device),
                ConvSpec::valid([32, 32], 3, 2).init(xavier(), device),
                ConvSpec::same([32, 64], 3).init(xavier(), device),
            ],
            block_a:     InceptionA::new(64, device),
            reduction_a: ReductionA::new(384, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = run(&self.stem, x);
        let x = self.block_a.forward(x);
        self.reduction_a.forward(x)
    }
}

// ─── vgg16 ────────────────────────────────────────────────────────────────────

const VGG_FC:   usize = 4096;
const VGG_FC8:  usize = 1000;
const VGG_PLAN: [(usize, usize); 5] = [(2, 64), (2, 128), (3, 256), (3, 512), (3, 512)];

fn vgg_init() -> Initializer {
    Initializer::Normal { mean: 0.0, std: 0.01 }
}

#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    pub convs: Vec<ConvBlock<B>>,
    pub pool:  MaxPool2d,
}

#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    pub blocks:  Vec<VggBlock<B>>,
    pub fc6:     Linear<B>,
    pub fc7:     Linear<B>,
    pub fc8:     Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> Vgg16<B> {
    pub fn new(device: &B::Device) -> Self {
        let mut blocks      = Vec::with_capacity(VGG_PLAN.len());
        let mut in_channels = 3;
        for (repeat, channels) in VGG_PLAN {
            let convs = (0..repeat)
                .map(|i| {
                    let c_in = if i == 0 { in_channels } else { channels };
                    ConvSpec::same([c_in, channels], 3).init(vgg_init(), device)
                })
                .collect();
            blocks.push(VggBlock { convs, pool: max_pool(2, 2) });
            in_channels = channels;
        }

        let linear = |d_in, d_out| {
            LinearConfig::new(d_in, d_out).with_initializer(vgg_init()).init(device)
        };
        Self {
            blocks,
            fc6:     linear(in_channels, VGG_FC),
            fc7:     linear(VGG_FC, VGG_FC),
            fc8:     linear(VGG_FC, VGG_FC8),
            dropout: DropoutConfig::new(0.5).init(),
        }
    }

    /// [N, 3, H, W] → [N, 1000, H/32, W/32]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .blocks
            .iter()
            .fold(x, |x, block| block.pool.forward(run(&block.convs, x)));

        // fc layers act on the channel axis at every spatial position
        let x = x.permute([0, 2, 3, 1]);
        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        let x = self.dropout.forward(relu(self.fc7.forward(x)));
        self.fc8.forward(x).permute([0, 3, 1, 2])
    }
}

// ─── selection ────────────────────────────────────────────────────────────────

/// Holds exactly one of the three extractors.
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub common:    Option<CommonCnn<B>>,
    pub inception: Option<InceptionCnn<B>>,
    pub vgg16:     Option<Vgg16<B>>,
}

impl<B: Backend> FeatureExtractor<B> {
    pub fn new(kind: CnnKind, device: &B::Device) -> Self {
        let mut extractor = Self { common: None, inception: None, vgg16: None };
        match kind {
            CnnKind::Common    => extractor.common    = Some(CommonCnn::new(device)),
            CnnKind::Inception => extractor.inception = Some(InceptionCnn::new(device)),
            CnnKind::Vgg16     => extractor.vgg16     = Some(Vgg16::new(device)),
        }
        extractor
    }

    /// [N, 3, H, W] → [N, features]
    ///
    /// Errors when no extractor is present, which happens if a record
    /// saved for a different extractor was loaded into this one.
    pub fn forward(&self, frames: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let maps = if let Some(cnn) = &self.common {
            cnn.forward(frames)
        } else if let Some(cnn) = &self.inception {
            cnn.forward(frames)
        } else if let Some(cnn) = &self.vgg16 {
            cnn.forward(frames)
        } else {
            bail!("Feature extractor has no weights; was the checkpoint saved with another --cnn?");
        };
        Ok(maps.flatten(1, 3))
    }
}
