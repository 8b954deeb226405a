//! Batched tensors decoded from one inference response.
//!
//! Every variant keeps the batch dimension outermost, and all arrays inside
//! one variant share the same batch length. [`crate::task_output`] turns
//! these into one structured item per batch element.

use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassificationOutput {
    /// `score:label` or `score:index:label`, one per batch element.
    pub labels: Vec<String>,
}

/// Still contains padding rows (label `"0"`); they are dropped per item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionOutput {
    /// `[x1, y1, x2, y2, score]` per detection.
    pub boxes: Vec<Vec<Vec<f32>>>,
    pub labels: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcrOutput {
    /// `[left, top, width, height]` per text line.
    pub boxes: Vec<Vec<Vec<f32>>>,
    pub texts: Vec<Vec<String>>,
    /// `-1` when the model reports no scores.
    pub scores: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointOutput {
    /// `[x, y, visibility]` per point, per object.
    pub keypoints: Vec<Vec<Vec<Vec<f32>>>>,
    pub boxes: Vec<Vec<Vec<f32>>>,
    pub scores: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceSegmentationOutput {
    pub rles: Vec<Vec<String>>,
    pub boxes: Vec<Vec<Vec<f32>>>,
    pub scores: Vec<Vec<f32>>,
    pub labels: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SemanticSegmentationOutput {
    pub rles: Vec<Vec<String>>,
    pub categories: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageOutput {
    /// Base64 JPEG images, grouped per request. Only a single group is produced today.
    pub images: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextOutput {
    pub texts: Vec<String>,
}

/// One output of a model without task-specific decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspecifiedTensor {
    pub name: String,
    /// Shape of one batch element; the full shape for 1D outputs.
    pub shape: Vec<i64>,
    pub data_type: String,
    /// One JSON value per batch element.
    pub batches: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InferOutput {
    Classification(ClassificationOutput),
    Detection(DetectionOutput),
    Keypoint(KeypointOutput),
    Ocr(OcrOutput),
    InstanceSegmentation(InstanceSegmentationOutput),
    SemanticSegmentation(SemanticSegmentationOutput),
    TextToImage(ImageOutput),
    ImageToImage(ImageOutput),
    TextGeneration(TextOutput),
    TextGenerationChat(TextOutput),
    VisualQuestionAnswering(TextOutput),
    Unspecified(Vec<UnspecifiedTensor>),
}

impl InferOutput {
    pub fn task(&self) -> Task {
        match self {
            InferOutput::Classification(_) => Task::Classification,
            InferOutput::Detection(_) => Task::Detection,
            InferOutput::Keypoint(_) => Task::Keypoint,
            InferOutput::Ocr(_) => Task::Ocr,
            InferOutput::InstanceSegmentation(_) => Task::InstanceSegmentation,
            InferOutput::SemanticSegmentation(_) => Task::SemanticSegmentation,
            InferOutput::TextToImage(_) => Task::TextToImage,
            InferOutput::ImageToImage(_) => Task::ImageToImage,
            InferOutput::TextGeneration(_) => Task::TextGeneration,
            InferOutput::TextGenerationChat(_) => Task::TextGenerationChat,
            InferOutput::VisualQuestionAnswering(_) => Task::VisualQuestionAnswering,
            InferOutput::Unspecified(_) => Task::Unspecified,
        }
    }
}
