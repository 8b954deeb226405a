use serde::{Deserialize, Serialize};

use super::InferTensor;

pub const ENSEMBLE_PLATFORM: &str = "ensemble";

/// `GET v2/models/{name}` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub inputs: Vec<InferTensor>,
    #[serde(default)]
    pub outputs: Vec<InferTensor>,
}

/// Memory layout of an image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    #[default]
    #[serde(rename = "FORMAT_NONE")]
    None,
    #[serde(rename = "FORMAT_NHWC")]
    Nhwc,
    #[serde(rename = "FORMAT_NCHW")]
    Nchw,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelInputConfig {
    pub name: String,
    #[serde(default)]
    pub format: InputFormat,
    #[serde(default)]
    pub dims: Vec<i64>,
}

/// `GET v2/models/{name}/config` response, reduced to what request building needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub max_batch_size: i64,
    #[serde(default)]
    pub input: Vec<ModelInputConfig>,
}

impl ModelConfig {
    pub fn is_ensemble(&self) -> bool {
        self.platform == ENSEMBLE_PLATFORM
    }

    pub fn input_format(&self) -> InputFormat {
        self.input.first().map(|input| input.format).unwrap_or_default()
    }
}
