//! Structured, per-batch-element results.
//!
//! These are what gets validated against the task schema and persisted.

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::output::{
    ClassificationOutput, DetectionOutput, ImageOutput, InferOutput, InstanceSegmentationOutput,
    KeypointOutput, OcrOutput, SemanticSegmentationOutput, TextOutput, UnspecifiedTensor,
};
use crate::task::Task;

/// Label the engine uses for rows that only pad a batch to a rectangle.
pub const PADDING_LABEL: &str = "0";
/// Coordinate the engine uses for padded boxes, points and scores.
pub const PADDING_VALUE: f32 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, new)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionObject {
    pub category: String,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub objects: Vec<DetectionObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub v: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointObject {
    pub keypoints: Vec<Keypoint>,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeypointResult {
    pub objects: Vec<KeypointObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrObject {
    pub text: String,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub objects: Vec<OcrObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSegmentationObject {
    pub rle: String,
    pub category: String,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceSegmentationResult {
    pub objects: Vec<InstanceSegmentationObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSegmentationStuff {
    pub rle: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SemanticSegmentationResult {
    pub stuffs: Vec<SemanticSegmentationStuff>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageGenerationResult {
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextGenerationResult {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub name: String,
    pub shape: Vec<i64>,
    pub data_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnspecifiedResult {
    pub raw_outputs: Vec<RawOutput>,
}

/// One structured result, serialized as `{ "<task>": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutput {
    Classification(ClassificationResult),
    Detection(DetectionResult),
    Keypoint(KeypointResult),
    Ocr(OcrResult),
    InstanceSegmentation(InstanceSegmentationResult),
    SemanticSegmentation(SemanticSegmentationResult),
    TextToImage(ImageGenerationResult),
    ImageToImage(ImageGenerationResult),
    TextGeneration(TextGenerationResult),
    TextGenerationChat(TextGenerationResult),
    VisualQuestionAnswering(TextGenerationResult),
    Unspecified(UnspecifiedResult),
}

impl TaskOutput {
    /// The item produced when the engine returns nothing for a request.
    pub fn empty(task: Task) -> Self {
        match task {
            Task::Classification => TaskOutput::Classification(Default::default()),
            Task::Detection => TaskOutput::Detection(Default::default()),
            Task::Keypoint => TaskOutput::Keypoint(Default::default()),
            Task::Ocr => TaskOutput::Ocr(Default::default()),
            Task::InstanceSegmentation => TaskOutput::InstanceSegmentation(Default::default()),
            Task::SemanticSegmentation => TaskOutput::SemanticSegmentation(Default::default()),
            Task::TextToImage => TaskOutput::TextToImage(Default::default()),
            Task::ImageToImage => TaskOutput::ImageToImage(Default::default()),
            Task::TextGeneration => TaskOutput::TextGeneration(Default::default()),
            Task::TextGenerationChat => TaskOutput::TextGenerationChat(Default::default()),
            Task::VisualQuestionAnswering => {
                TaskOutput::VisualQuestionAnswering(Default::default())
            }
            Task::Unspecified => TaskOutput::Unspecified(Default::default()),
        }
    }

    pub fn task(&self) -> Task {
        match self {
            TaskOutput::Classification(_) => Task::Classification,
            TaskOutput::Detection(_) => Task::Detection,
            TaskOutput::Keypoint(_) => Task::Keypoint,
            TaskOutput::Ocr(_) => Task::Ocr,
            TaskOutput::InstanceSegmentation(_) => Task::InstanceSegmentation,
            TaskOutput::SemanticSegmentation(_) => Task::SemanticSegmentation,
            TaskOutput::TextToImage(_) => Task::TextToImage,
            TaskOutput::ImageToImage(_) => Task::ImageToImage,
            TaskOutput::TextGeneration(_) => Task::TextGeneration,
            TaskOutput::TextGenerationChat(_) => Task::TextGenerationChat,
            TaskOutput::VisualQuestionAnswering(_) => Task::VisualQuestionAnswering,
            TaskOutput::Unspecified(_) => Task::Unspecified,
        }
    }

    /// The task-specific body, without the task key.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            TaskOutput::Classification(result) => serde_json::to_value(result),
            TaskOutput::Detection(result) => serde_json::to_value(result),
            TaskOutput::Keypoint(result) => serde_json::to_value(result),
            TaskOutput::Ocr(result) => serde_json::to_value(result),
            TaskOutput::InstanceSegmentation(result) => serde_json::to_value(result),
            TaskOutput::SemanticSegmentation(result) => serde_json::to_value(result),
            TaskOutput::TextToImage(result) | TaskOutput::ImageToImage(result) => {
                serde_json::to_value(result)
            }
            TaskOutput::TextGeneration(result)
            | TaskOutput::TextGenerationChat(result)
            | TaskOutput::VisualQuestionAnswering(result) => serde_json::to_value(result),
            TaskOutput::Unspecified(result) => serde_json::to_value(result),
        }
    }
}

fn malformed(tensor: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::MalformedOutput {
        tensor: tensor.to_string(),
        reason: reason.into(),
    }
}

fn parse_classification(label: &str) -> Result<ClassificationResult, DecodeError> {
    let parts: Vec<&str> = label.split(':').collect();
    let (score, category) = match parts.as_slice() {
        [score, category] | [score, _, category] => (*score, *category),
        _ => {
            return Err(malformed(
                "classification",
                format!("expected 'score:label' or 'score:index:label', got '{label}'"),
            ));
        }
    };
    let score = score
        .trim()
        .parse::<f32>()
        .map_err(|e| malformed("classification", format!("invalid score in '{label}': {e}")))?;

    Ok(ClassificationResult {
        category: category.to_string(),
        score,
    })
}

fn classification(output: ClassificationOutput) -> Result<Vec<TaskOutput>, DecodeError> {
    output
        .labels
        .iter()
        .map(|label| parse_classification(label).map(TaskOutput::Classification))
        .collect()
}

fn detection(output: DetectionOutput) -> Result<Vec<TaskOutput>, DecodeError> {
    output
        .boxes
        .into_iter()
        .zip(output.labels)
        .map(|(boxes, labels)| {
            let objects = boxes
                .iter()
                .zip(labels)
                .filter(|(_, label)| label != PADDING_LABEL)
                .map(|(row, category)| match row.as_slice() {
                    [x1, y1, x2, y2, score, ..] => Ok(DetectionObject {
                        category,
                        score: *score,
                        bounding_box: BoundingBox::new(*x1, *y1, x2 - x1, y2 - y1),
                    }),
                    _ => Err(malformed("detection boxes", "box rows need 5 values")),
                })
                .collect::<Result<_, _>>()?;
            Ok(TaskOutput::Detection(DetectionResult { objects }))
        })
        .collect()
}

fn xywh(row: &[f32], tensor: &str) -> Result<BoundingBox, DecodeError> {
    match row {
        [left, top, width, height, ..] => Ok(BoundingBox::new(*left, *top, *width, *height)),
        _ => Err(malformed(tensor, "box rows need 4 values")),
    }
}

fn ocr(output: OcrOutput) -> Result<Vec<TaskOutput>, DecodeError> {
    output
        .boxes
        .into_iter()
        .zip(output.texts)
        .zip(output.scores)
        .map(|((boxes, texts), scores)| {
            let mut objects = Vec::new();
            for ((row, text), score) in boxes.iter().zip(texts).zip(scores) {
                if text.is_empty() || row.first() == Some(&PADDING_VALUE) {
                    continue;
                }
                objects.push(OcrObject {
                    text,
                    score,
                    bounding_box: xywh(row, "ocr boxes")?,
                });
            }
            Ok(TaskOutput::Ocr(OcrResult { objects }))
        })
        .collect()
}

fn keypoint(output: KeypointOutput) -> Result<Vec<TaskOutput>, DecodeError> {
    output
        .keypoints
        .into_iter()
        .zip(output.boxes)
        .zip(output.scores)
        .map(|((objects, boxes), scores)| {
            let mut results = Vec::new();
            for ((points, row), score) in objects.iter().zip(&boxes).zip(scores) {
                if score == PADDING_VALUE {
                    continue;
                }
                let keypoints = points
                    .iter()
                    .filter_map(|point| match point.as_slice() {
                        [x, y, v, ..] if [*x, *y, *v] == [PADDING_VALUE; 3] => None,
                        [x, y, v, ..] => Some(Ok(Keypoint {
                            x: *x,
                            y: *y,
                            v: *v,
                        })),
                        _ => Some(Err(malformed("keypoints", "points need 3 values"))),
                    })
                    .collect::<Result<_, _>>()?;
                results.push(KeypointObject {
                    keypoints,
                    score,
                    bounding_box: xywh(row, "keypoint boxes")?,
                });
            }
            Ok(TaskOutput::Keypoint(KeypointResult { objects: results }))
        })
        .collect()
}

fn instance_segmentation(output: InstanceSegmentationOutput) -> Result<Vec<TaskOutput>, DecodeError> {
    let InstanceSegmentationOutput {
        rles,
        boxes,
        scores,
        labels,
    } = output;

    rles.into_iter()
        .zip(boxes)
        .zip(scores)
        .zip(labels)
        .map(|(((rles, boxes), scores), labels)| {
            let mut objects = Vec::new();
            for (((rle, row), score), category) in rles.into_iter().zip(&boxes).zip(scores).zip(labels) {
                if rle.is_empty() || category.is_empty() {
                    continue;
                }
                objects.push(InstanceSegmentationObject {
                    rle,
                    category,
                    score,
                    bounding_box: xywh(row, "instance segmentation boxes")?,
                });
            }
            Ok(TaskOutput::InstanceSegmentation(InstanceSegmentationResult {
                objects,
            }))
        })
        .collect()
}

fn semantic_segmentation(output: SemanticSegmentationOutput) -> Vec<TaskOutput> {
    output
        .rles
        .into_iter()
        .zip(output.categories)
        .map(|(rles, categories)| {
            let stuffs = rles
                .into_iter()
                .zip(categories)
                .filter(|(rle, category)| !rle.is_empty() && !category.is_empty())
                .map(|(rle, category)| SemanticSegmentationStuff { rle, category })
                .collect();
            TaskOutput::SemanticSegmentation(SemanticSegmentationResult { stuffs })
        })
        .collect()
}

fn images(output: ImageOutput, wrap: fn(ImageGenerationResult) -> TaskOutput) -> Vec<TaskOutput> {
    output
        .images
        .into_iter()
        .map(|images| wrap(ImageGenerationResult { images }))
        .collect()
}

fn texts(output: TextOutput, wrap: fn(TextGenerationResult) -> TaskOutput) -> Vec<TaskOutput> {
    output
        .texts
        .into_iter()
        .map(|text| wrap(TextGenerationResult { text }))
        .collect()
}

fn unspecified(tensors: Vec<UnspecifiedTensor>) -> Vec<TaskOutput> {
    let batch = tensors.first().map_or(0, |tensor| tensor.batches.len());
    (0..batch)
        .map(|index| {
            let raw_outputs = tensors
                .iter()
                .filter_map(|tensor| {
                    tensor.batches.get(index).map(|data| RawOutput {
                        name: tensor.name.clone(),
                        shape: tensor.shape.clone(),
                        data_type: tensor.data_type.clone(),
                        data: data.clone(),
                    })
                })
                .collect();
            TaskOutput::Unspecified(UnspecifiedResult { raw_outputs })
        })
        .collect()
}

impl InferOutput {
    /// Splits the batch into one structured item per element, dropping padding entries.
    ///
    /// Never returns an empty list: an empty batch yields a single empty item.
    pub fn into_task_outputs(self) -> Result<Vec<TaskOutput>, DecodeError> {
        let task = self.task();
        let outputs = match self {
            InferOutput::Classification(output) => classification(output)?,
            InferOutput::Detection(output) => detection(output)?,
            InferOutput::Keypoint(output) => keypoint(output)?,
            InferOutput::Ocr(output) => ocr(output)?,
            InferOutput::InstanceSegmentation(output) => instance_segmentation(output)?,
            InferOutput::SemanticSegmentation(output) => semantic_segmentation(output),
            InferOutput::TextToImage(output) => images(output, TaskOutput::TextToImage),
            InferOutput::ImageToImage(output) => images(output, TaskOutput::ImageToImage),
            InferOutput::TextGeneration(output) => texts(output, TaskOutput::TextGeneration),
            InferOutput::TextGenerationChat(output) => texts(output, TaskOutput::TextGenerationChat),
            InferOutput::VisualQuestionAnswering(output) => {
                texts(output, TaskOutput::VisualQuestionAnswering)
            }
            InferOutput::Unspecified(tensors) => unspecified(tensors),
        };

        if outputs.is_empty() {
            return Ok(vec![TaskOutput::empty(task)]);
        }
        Ok(outputs)
    }
}
