use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The kind of model a trigger runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Task {
    Classification,
    Detection,
    Keypoint,
    Ocr,
    InstanceSegmentation,
    SemanticSegmentation,
    TextToImage,
    ImageToImage,
    TextGeneration,
    TextGenerationChat,
    VisualQuestionAnswering,
    Unspecified,
}

/// Groups of tasks sharing one request layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFamily {
    /// A batch of encoded images in a single bytes tensor.
    Vision,
    /// Prompt plus diffusion parameters.
    ImageGeneration,
    /// Prompt plus sampling parameters.
    TextGeneration,
    /// Raw byte batch, decoded generically.
    Unspecified,
}

impl Task {
    pub fn family(&self) -> TaskFamily {
        match self {
            Task::Classification
            | Task::Detection
            | Task::Keypoint
            | Task::Ocr
            | Task::InstanceSegmentation
            | Task::SemanticSegmentation => TaskFamily::Vision,
            Task::TextToImage | Task::ImageToImage => TaskFamily::ImageGeneration,
            Task::TextGeneration | Task::TextGenerationChat | Task::VisualQuestionAnswering => {
                TaskFamily::TextGeneration
            }
            Task::Unspecified => TaskFamily::Unspecified,
        }
    }

    /// Minimum number of outputs a model must declare for its response to be decodable.
    pub fn required_outputs(&self) -> usize {
        match self {
            Task::InstanceSegmentation => 4,
            Task::Keypoint => 3,
            Task::Detection | Task::Ocr | Task::SemanticSegmentation => 2,
            Task::Classification
            | Task::TextToImage
            | Task::ImageToImage
            | Task::TextGeneration
            | Task::TextGenerationChat
            | Task::VisualQuestionAnswering => 1,
            Task::Unspecified => 0,
        }
    }
}
