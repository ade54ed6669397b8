// ============================================================
// Layer 3 — Feature Extractor Selection
// ============================================================
// The three interchangeable convolutional front-ends. Parsed
// from the command line through FromStr and stored in the
// saved training config, so no clap types leak in here.

use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CnnKind {
    /// Small three-convolution block with batch norm on the first layer
    #[default]
    Common,
    /// Stem + Inception-A + Reduction-A
    Inception,
    /// VGG16 including its fully connected layers
    Vgg16,
}

impl CnnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CnnKind::Common    => "common",
            CnnKind::Inception => "inception",
            CnnKind::Vgg16     => "vgg16",
        }
    }
}

impl fmt::Display for CnnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CnnKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "common" | "cnn" => Ok(CnnKind::Common),
            "inception"      => Ok(CnnKind::Inception),
            "vgg16" | "vgg"  => Ok(CnnKind::Vgg16),
            other => bail!("unknown cnn type '{other}' (expected common, inception or vgg16)"),
        }
    }
}
