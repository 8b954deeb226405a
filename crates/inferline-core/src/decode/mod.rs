//! Response decoding: raw output tensors into batched per-task arrays.
//!
//! Output roles are positional. The model metadata declares the outputs in the
//! order each task expects them, e.g. `[boxes, labels]` for detection.

mod generation;
mod tensors;
mod unspecified;
mod vision;

use inferline_api::schemas::{InferResponse, ModelMetadata};

use crate::error::DecodeError;
use crate::output::InferOutput;
use crate::task::Task;

use tensors::OutputTensors;

/// Decodes `response` according to `task`, naming outputs from `metadata`.
pub fn decode_response(
    task: Task,
    metadata: &ModelMetadata,
    response: &InferResponse,
) -> Result<InferOutput, DecodeError> {
    let declared = metadata.outputs.len();
    let expected = task.required_outputs();
    if declared < expected {
        return Err(DecodeError::InsufficientOutputs {
            task,
            expected,
            declared,
        });
    }

    let names: Vec<&str> = metadata
        .outputs
        .iter()
        .map(|output| output.name.as_str())
        .collect();
    let tensors = OutputTensors::new(response);

    let output = match task {
        Task::Classification => {
            InferOutput::Classification(vision::classification(&tensors, names[0])?)
        }
        Task::Detection => InferOutput::Detection(vision::detection(&tensors, names[0], names[1])?),
        Task::Keypoint => InferOutput::Keypoint(vision::keypoint(
            &tensors, names[0], names[1], names[2],
        )?),
        Task::Ocr => InferOutput::Ocr(vision::ocr(
            &tensors,
            names[0],
            names[1],
            names.get(2).copied(),
        )?),
        Task::InstanceSegmentation => {
            InferOutput::InstanceSegmentation(vision::instance_segmentation(
                &tensors, names[0], names[1], names[2], names[3],
            )?)
        }
        Task::SemanticSegmentation => InferOutput::SemanticSegmentation(
            vision::semantic_segmentation(&tensors, names[0], names[1])?,
        ),
        Task::TextToImage => InferOutput::TextToImage(generation::images(&tensors, names[0])?),
        Task::ImageToImage => InferOutput::ImageToImage(generation::images(&tensors, names[0])?),
        Task::TextGeneration => InferOutput::TextGeneration(generation::texts(&tensors, names[0])?),
        Task::TextGenerationChat => {
            InferOutput::TextGenerationChat(generation::texts(&tensors, names[0])?)
        }
        Task::VisualQuestionAnswering => {
            InferOutput::VisualQuestionAnswering(generation::texts(&tensors, names[0])?)
        }
        Task::Unspecified => {
            InferOutput::Unspecified(unspecified::unspecified(&tensors, &metadata.outputs)?)
        }
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::serialize_bytes_tensor;
    use crate::error::CodecError;
    use crate::output::{DetectionOutput, OcrOutput};
    use crate::task_output::TaskOutput;
    use inferline_api::schemas::InferTensor;
    use serde_json::json;

    fn tensor(name: &str, datatype: &str, shape: Vec<i64>) -> InferTensor {
        InferTensor::new(name.to_string(), datatype.to_string(), shape)
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn i32_bytes(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn strings(values: &[&str]) -> Vec<u8> {
        serialize_bytes_tensor(values).unwrap()
    }

    /// Metadata declaring the response's outputs, in response order.
    fn setup(outputs: Vec<(InferTensor, Vec<u8>)>) -> (ModelMetadata, InferResponse) {
        let (tensors, raw): (Vec<_>, Vec<_>) = outputs.into_iter().unzip();
        let metadata = ModelMetadata {
            name: "model".to_string(),
            outputs: tensors.clone(),
            ..Default::default()
        };
        let response = InferResponse {
            model_name: "model".to_string(),
            model_version: "1".to_string(),
            outputs: tensors,
            raw_output_contents: raw,
        };
        (metadata, response)
    }

    mod vision {
        use super::*;

        #[test]
        fn test_detection() {
            let (metadata, response) = setup(vec![
                (
                    tensor("boxes", "FP32", vec![1, 2, 5]),
                    f32_bytes(&[0.0, 0.0, 4.0, 2.0, 0.5, -1.0, -1.0, -1.0, -1.0, -1.0]),
                ),
                (tensor("labels", "BYTES", vec![1, 2]), strings(&["cat", "0"])),
            ]);

            let output = decode_response(Task::Detection, &metadata, &response).unwrap();
            assert_eq!(
                output,
                InferOutput::Detection(DetectionOutput {
                    boxes: vec![vec![
                        vec![0.0, 0.0, 4.0, 2.0, 0.5],
                        vec![-1.0, -1.0, -1.0, -1.0, -1.0],
                    ]],
                    labels: vec![vec!["cat".to_string(), "0".to_string()]],
                })
            );

            let items = output.into_task_outputs().unwrap();
            let TaskOutput::Detection(result) = &items[0] else {
                panic!("unexpected output {items:?}");
            };
            assert_eq!(result.objects.len(), 1);
            assert_eq!(result.objects[0].bounding_box.width, 4.0);
        }

        #[test]
        fn test_detection_inconsistent_batch() {
            let (metadata, response) = setup(vec![
                (tensor("boxes", "FP32", vec![2, 1, 5]), f32_bytes(&[0.0; 10])),
                (tensor("labels", "BYTES", vec![1, 1]), strings(&["cat"])),
            ]);

            let err = decode_response(Task::Detection, &metadata, &response).unwrap_err();
            assert_eq!(
                err,
                DecodeError::InconsistentBatchSize {
                    first: "boxes".to_string(),
                    first_len: 2,
                    other: "labels".to_string(),
                    other_len: 1,
                }
            );
        }

        #[test]
        fn test_detection_requires_two_outputs() {
            let (metadata, response) = setup(vec![(
                tensor("boxes", "FP32", vec![1, 1, 5]),
                f32_bytes(&[0.0; 5]),
            )]);

            let err = decode_response(Task::Detection, &metadata, &response).unwrap_err();
            assert_eq!(
                err,
                DecodeError::InsufficientOutputs {
                    task: Task::Detection,
                    expected: 2,
                    declared: 1,
                }
            );
        }

        #[test]
        fn test_classification() {
            let (metadata, response) = setup(vec![(
                tensor("output", "BYTES", vec![2, 1]),
                strings(&["0.9:cat", "0.4:12:dog"]),
            )]);

            let items = decode_response(Task::Classification, &metadata, &response)
                .unwrap()
                .into_task_outputs()
                .unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(
                serde_json::to_value(&items[1]).unwrap(),
                json!({ "classification": { "category": "dog", "score": 0.4f32 } })
            );
        }

        #[test]
        fn test_ocr_without_scores() {
            let (metadata, response) = setup(vec![
                (tensor("boxes", "INT32", vec![1, 1, 4]), i32_bytes(&[1, 2, 3, 4])),
                (tensor("texts", "BYTES", vec![1, 1]), strings(&["hello"])),
            ]);

            let output = decode_response(Task::Ocr, &metadata, &response).unwrap();
            assert_eq!(
                output,
                InferOutput::Ocr(OcrOutput {
                    boxes: vec![vec![vec![1.0, 2.0, 3.0, 4.0]]],
                    texts: vec![vec!["hello".to_string()]],
                    scores: vec![vec![-1.0]],
                })
            );
        }

        #[test]
        fn test_ocr_with_scores() {
            let (metadata, response) = setup(vec![
                (tensor("boxes", "FP32", vec![1, 1, 4]), f32_bytes(&[1.0, 2.0, 3.0, 4.0])),
                (tensor("texts", "BYTES", vec![1, 1]), strings(&["hello"])),
                (tensor("scores", "FP32", vec![1, 1]), f32_bytes(&[0.75])),
            ]);

            let InferOutput::Ocr(output) =
                decode_response(Task::Ocr, &metadata, &response).unwrap()
            else {
                panic!("expected OCR output");
            };
            assert_eq!(output.scores, vec![vec![0.75]]);
        }

        #[test]
        fn test_reshape_failure_is_a_shape_mismatch() {
            let (metadata, response) = setup(vec![
                (tensor("keypoints", "FP32", vec![1, 1, 2, 3]), f32_bytes(&[0.0; 5])),
                (tensor("boxes", "FP32", vec![1, 1, 4]), f32_bytes(&[0.0; 4])),
                (tensor("scores", "FP32", vec![1, 1]), f32_bytes(&[0.0])),
            ]);

            let err = decode_response(Task::Keypoint, &metadata, &response).unwrap_err();
            assert!(matches!(err, DecodeError::ShapeMismatch { ref tensor, .. } if tensor == "keypoints"));
        }

        #[test]
        fn test_missing_output_and_content() {
            let (metadata, mut response) = setup(vec![
                (tensor("rles", "BYTES", vec![1, 1]), vec![]),
                (tensor("categories", "BYTES", vec![1, 1]), strings(&["sky"])),
            ]);

            let err = decode_response(Task::SemanticSegmentation, &metadata, &response).unwrap_err();
            assert_eq!(err, DecodeError::OutputContentMissing("rles".to_string()));

            response.outputs.remove(0);
            response.raw_output_contents.remove(0);
            let err = decode_response(Task::SemanticSegmentation, &metadata, &response).unwrap_err();
            assert_eq!(err, DecodeError::OutputNotFound("rles".to_string()));
        }

        #[test]
        fn test_unsupported_box_datatype() {
            let (metadata, response) = setup(vec![
                (tensor("boxes", "FP64", vec![1, 1, 5]), vec![0; 40]),
                (tensor("labels", "BYTES", vec![1, 1]), strings(&["cat"])),
            ]);

            let err = decode_response(Task::Detection, &metadata, &response).unwrap_err();
            assert!(matches!(err, DecodeError::UnsupportedDatatype { .. }));
        }
    }

    mod generation {
        use super::*;
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        #[test]
        fn test_text_to_image_single_group() {
            let pixels = [0.0f32, 0.5, 1.0].repeat(2 * 2 * 2);
            let (metadata, response) = setup(vec![(
                tensor("images", "FP32", vec![2, 2, 2, 3]),
                f32_bytes(&pixels),
            )]);

            let output = decode_response(Task::TextToImage, &metadata, &response).unwrap();
            let InferOutput::TextToImage(images) = &output else {
                panic!("expected images");
            };
            assert_eq!(images.images.len(), 1);
            assert_eq!(images.images[0].len(), 2);

            let jpeg = STANDARD.decode(&images.images[0][0]).unwrap();
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

            let items = output.into_task_outputs().unwrap();
            assert_eq!(items.len(), 1);
        }

        #[test]
        fn test_jpeg_keeps_dimensions() {
            let (metadata, response) = setup(vec![(
                tensor("images", "FP32", vec![1, 2, 3, 3]),
                f32_bytes(&[1.0; 18]),
            )]);

            let output = decode_response(Task::ImageToImage, &metadata, &response).unwrap();
            let InferOutput::ImageToImage(images) = output else {
                panic!("expected images");
            };
            let jpeg = STANDARD.decode(&images.images[0][0]).unwrap();
            let decoded = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg)
                .unwrap()
                .to_rgb8();

            assert_eq!(decoded.dimensions(), (3, 2));
            assert!(decoded.pixels().all(|pixel| pixel.0.iter().all(|&c| c > 250)));
        }

        #[test]
        fn test_image_too_short() {
            let (metadata, response) = setup(vec![(
                tensor("images", "FP32", vec![1, 2, 2, 3]),
                f32_bytes(&[0.5; 6]),
            )]);

            let err = decode_response(Task::ImageToImage, &metadata, &response).unwrap_err();
            assert!(matches!(
                err,
                DecodeError::ShapeMismatch {
                    source: CodecError::ShapeMismatch { len: 6, .. },
                    ..
                }
            ));
        }

        #[test]
        fn test_text_generation() {
            let (metadata, response) = setup(vec![(
                tensor("text", "BYTES", vec![1]),
                strings(&["Once upon a time"]),
            )]);

            let items = decode_response(Task::TextGenerationChat, &metadata, &response)
                .unwrap()
                .into_task_outputs()
                .unwrap();
            assert_eq!(
                serde_json::to_value(&items).unwrap(),
                json!([{ "text_generation_chat": { "text": "Once upon a time" } }])
            );
        }
    }

    mod unspecified {
        use super::*;

        #[test]
        fn test_generic_outputs_split_per_batch() {
            let (metadata, response) = setup(vec![
                (tensor("probs", "FP32", vec![2, 2]), f32_bytes(&[0.1, 0.9, 0.6, 0.4])),
                (tensor("ids", "INT32", vec![2, 1]), i32_bytes(&[7, 8])),
                (tensor("names", "BYTES", vec![2, 1]), strings(&["a", "b"])),
            ]);

            let InferOutput::Unspecified(decoded) =
                decode_response(Task::Unspecified, &metadata, &response).unwrap()
            else {
                panic!("expected generic output");
            };
            assert_eq!(decoded[0].shape, vec![2]);
            assert_eq!(decoded[1].batches, vec![json!([7]), json!([8])]);
            assert_eq!(decoded[2].batches, vec![json!(["a"]), json!(["b"])]);

            let items = InferOutput::Unspecified(decoded).into_task_outputs().unwrap();
            assert_eq!(items.len(), 2);
        }

        #[test]
        fn test_one_dimensional_output_is_a_single_element() {
            let (metadata, response) = setup(vec![(
                tensor("scores", "FP32", vec![3]),
                f32_bytes(&[1.0, 2.0, 3.0]),
            )]);

            let InferOutput::Unspecified(decoded) =
                decode_response(Task::Unspecified, &metadata, &response).unwrap()
            else {
                panic!("expected generic output");
            };
            assert_eq!(decoded[0].shape, vec![3]);
            assert_eq!(decoded[0].batches, vec![json!([1.0, 2.0, 3.0])]);
        }

        #[test]
        fn test_unsupported_datatype_and_rank() {
            let (metadata, response) =
                setup(vec![(tensor("mask", "UINT8", vec![1, 4]), vec![0; 4])]);
            let err = decode_response(Task::Unspecified, &metadata, &response).unwrap_err();
            assert_eq!(
                err,
                DecodeError::UnsupportedDatatype {
                    tensor: "mask".to_string(),
                    datatype: "UINT8".to_string(),
                }
            );

            let (metadata, response) =
                setup(vec![(tensor("ids", "INT32", vec![1, 1, 1]), i32_bytes(&[1]))]);
            let err = decode_response(Task::Unspecified, &metadata, &response).unwrap_err();
            assert!(matches!(err, DecodeError::ShapeMismatch { .. }));
        }

        #[test]
        fn test_no_outputs_yields_default_item() {
            let (metadata, response) = setup(vec![]);
            let items = decode_response(Task::Unspecified, &metadata, &response)
                .unwrap()
                .into_task_outputs()
                .unwrap();
            assert_eq!(items, vec![TaskOutput::empty(Task::Unspecified)]);
        }
    }
}
