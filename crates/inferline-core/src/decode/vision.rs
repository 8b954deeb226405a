use crate::error::DecodeError;
use crate::output::{
    ClassificationOutput, DetectionOutput, InstanceSegmentationOutput, KeypointOutput, OcrOutput,
    SemanticSegmentationOutput,
};
use crate::task_output::PADDING_VALUE;

use super::tensors::{OutputTensors, ensure_batch, ensure_objects};

pub(super) fn classification(
    tensors: &OutputTensors,
    labels: &str,
) -> Result<ClassificationOutput, DecodeError> {
    let (tensor, _) = tensors.raw(labels)?;
    let labels = tensors.strings(labels, tensor.element_count())?;
    Ok(ClassificationOutput { labels })
}

pub(super) fn detection(
    tensors: &OutputTensors,
    boxes: &str,
    labels: &str,
) -> Result<DetectionOutput, DecodeError> {
    let batched_boxes = tensors.floats_3d(boxes)?;
    let batched_labels = tensors.strings_2d(labels)?;
    ensure_batch(boxes, &batched_boxes, labels, &batched_labels)?;
    ensure_objects(boxes, &batched_boxes, labels, &batched_labels)?;

    Ok(DetectionOutput {
        boxes: batched_boxes,
        labels: batched_labels,
    })
}

/// Without a scores output every score is reported as `-1`.
pub(super) fn ocr(
    tensors: &OutputTensors,
    boxes: &str,
    texts: &str,
    scores: Option<&str>,
) -> Result<OcrOutput, DecodeError> {
    let batched_boxes = tensors.floats_3d(boxes)?;
    let batched_texts = tensors.strings_2d(texts)?;
    ensure_batch(boxes, &batched_boxes, texts, &batched_texts)?;
    ensure_objects(boxes, &batched_boxes, texts, &batched_texts)?;

    let batched_scores = match scores {
        Some(scores) => {
            let batched_scores = tensors.floats_2d(scores)?;
            ensure_batch(boxes, &batched_boxes, scores, &batched_scores)?;
            ensure_objects(boxes, &batched_boxes, scores, &batched_scores)?;
            batched_scores
        }
        None => batched_texts
            .iter()
            .map(|texts| vec![PADDING_VALUE; texts.len()])
            .collect(),
    };

    Ok(OcrOutput {
        boxes: batched_boxes,
        texts: batched_texts,
        scores: batched_scores,
    })
}

pub(super) fn keypoint(
    tensors: &OutputTensors,
    keypoints: &str,
    boxes: &str,
    scores: &str,
) -> Result<KeypointOutput, DecodeError> {
    let batched_keypoints = tensors.floats_4d(keypoints)?;
    let batched_boxes = tensors.floats_3d(boxes)?;
    let batched_scores = tensors.floats_2d(scores)?;
    ensure_batch(keypoints, &batched_keypoints, boxes, &batched_boxes)?;
    ensure_batch(keypoints, &batched_keypoints, scores, &batched_scores)?;
    ensure_objects(keypoints, &batched_keypoints, boxes, &batched_boxes)?;
    ensure_objects(keypoints, &batched_keypoints, scores, &batched_scores)?;

    Ok(KeypointOutput {
        keypoints: batched_keypoints,
        boxes: batched_boxes,
        scores: batched_scores,
    })
}

pub(super) fn instance_segmentation(
    tensors: &OutputTensors,
    rles: &str,
    boxes: &str,
    labels: &str,
    scores: &str,
) -> Result<InstanceSegmentationOutput, DecodeError> {
    let batched_labels = tensors.strings_2d(labels)?;
    let batched_rles = tensors.strings_2d(rles)?;
    let batched_boxes = tensors.floats_3d(boxes)?;
    let batched_scores = tensors.floats_2d(scores)?;
    ensure_batch(rles, &batched_rles, boxes, &batched_boxes)?;
    ensure_batch(rles, &batched_rles, labels, &batched_labels)?;
    ensure_batch(rles, &batched_rles, scores, &batched_scores)?;
    ensure_objects(rles, &batched_rles, boxes, &batched_boxes)?;
    ensure_objects(rles, &batched_rles, labels, &batched_labels)?;
    ensure_objects(rles, &batched_rles, scores, &batched_scores)?;

    Ok(InstanceSegmentationOutput {
        rles: batched_rles,
        boxes: batched_boxes,
        scores: batched_scores,
        labels: batched_labels,
    })
}

pub(super) fn semantic_segmentation(
    tensors: &OutputTensors,
    rles: &str,
    categories: &str,
) -> Result<SemanticSegmentationOutput, DecodeError> {
    let batched_categories = tensors.strings_2d(categories)?;
    let batched_rles = tensors.strings_2d(rles)?;
    ensure_batch(rles, &batched_rles, categories, &batched_categories)?;
    ensure_objects(rles, &batched_rles, categories, &batched_categories)?;

    Ok(SemanticSegmentationOutput {
        rles: batched_rles,
        categories: batched_categories,
    })
}
