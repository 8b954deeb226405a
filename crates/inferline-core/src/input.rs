use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::task::Task;

/// Encoded images (JPEG, PNG, ...) forming one request batch.
///
/// Serialized as a list of standard base64 strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageBatch {
    #[serde(serialize_with = "serialize_images", deserialize_with = "deserialize_images")]
    pub images: Vec<Vec<u8>>,
}

impl ImageBatch {
    pub fn new(images: Vec<Vec<u8>>) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn serialize_images<S: Serializer>(images: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(images.iter().map(|image| STANDARD.encode(image)))
}

fn deserialize_images<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
        .collect()
}

/// Parameters of a diffusion request (text-to-image and image-to-image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenerationInput {
    pub prompt: String,
    /// Reference image, passed through verbatim (usually a URL or base64 string).
    pub prompt_image: String,
    pub steps: u32,
    /// Kept wider than the wire type; see [`crate::request`] for how it is narrowed.
    pub cfg_scale: f64,
    pub seed: i64,
    pub samples: u32,
    pub extra_params: String,
}

impl Default for ImageGenerationInput {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            prompt_image: String::new(),
            steps: 10,
            cfg_scale: 7.0,
            seed: 1024,
            samples: 1,
            extra_params: String::new(),
        }
    }
}

/// Parameters of a language-model request (plain, chat and visual question answering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextGenerationInput {
    pub prompt: String,
    pub prompt_images: String,
    pub chat_history: String,
    pub system_message: String,
    /// Falls back to a per-task default when absent.
    pub max_new_tokens: Option<u32>,
    pub temperature: f32,
    pub top_k: u32,
    pub seed: i64,
    pub extra_params: String,
}

impl Default for TextGenerationInput {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            prompt_images: String::new(),
            chat_history: String::new(),
            system_message: String::new(),
            max_new_tokens: None,
            temperature: 0.7,
            top_k: 10,
            seed: 1024,
            extra_params: String::new(),
        }
    }
}

/// Structured input of one trigger, one variant per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "input", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InferInput {
    Classification(ImageBatch),
    Detection(ImageBatch),
    Keypoint(ImageBatch),
    Ocr(ImageBatch),
    InstanceSegmentation(ImageBatch),
    SemanticSegmentation(ImageBatch),
    TextToImage(ImageGenerationInput),
    ImageToImage(ImageGenerationInput),
    TextGeneration(TextGenerationInput),
    TextGenerationChat(TextGenerationInput),
    VisualQuestionAnswering(TextGenerationInput),
    Unspecified(ImageBatch),
}

impl InferInput {
    pub fn task(&self) -> Task {
        match self {
            InferInput::Classification(_) => Task::Classification,
            InferInput::Detection(_) => Task::Detection,
            InferInput::Keypoint(_) => Task::Keypoint,
            InferInput::Ocr(_) => Task::Ocr,
            InferInput::InstanceSegmentation(_) => Task::InstanceSegmentation,
            InferInput::SemanticSegmentation(_) => Task::SemanticSegmentation,
            InferInput::TextToImage(_) => Task::TextToImage,
            InferInput::ImageToImage(_) => Task::ImageToImage,
            InferInput::TextGeneration(_) => Task::TextGeneration,
            InferInput::TextGenerationChat(_) => Task::TextGenerationChat,
            InferInput::VisualQuestionAnswering(_) => Task::VisualQuestionAnswering,
            InferInput::Unspecified(_) => Task::Unspecified,
        }
    }

    /// Number of items the engine will receive in the batch dimension.
    pub fn batch_size(&self) -> usize {
        match self {
            InferInput::Classification(batch)
            | InferInput::Detection(batch)
            | InferInput::Keypoint(batch)
            | InferInput::Ocr(batch)
            | InferInput::InstanceSegmentation(batch)
            | InferInput::SemanticSegmentation(batch)
            | InferInput::Unspecified(batch) => batch.len(),
            InferInput::TextToImage(_)
            | InferInput::ImageToImage(_)
            | InferInput::TextGeneration(_)
            | InferInput::TextGenerationChat(_)
            | InferInput::VisualQuestionAnswering(_) => 1,
        }
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
