//! Request building: structured [`InferInput`] into tensor declarations and raw payloads.
//!
//! Generation tasks send one scalar or single-element bytes tensor per declared
//! input, in a fixed positional order. Vision tasks send the encoded image batch
//! as a single bytes tensor.

use inferline_api::schemas::{
    InferParameter, InferRequest, InferTensor, InputFormat, ModelConfig, ModelMetadata,
    RequestedOutput,
};

use crate::codec::{encode_f32, encode_u32, encode_u64, serialize_bytes_tensor};
use crate::error::RequestError;
use crate::input::{ImageBatch, ImageGenerationInput, InferInput, TextGenerationInput};
use crate::task::{Task, TaskFamily};

pub const NEGATIVE_PROMPT_PLACEHOLDER: &str = "NONE";
pub const SCHEDULER: &str = "DPMSolverMultistepScheduler";
/// Output parameter asking the engine to pre-rank classification results.
pub const CLASSIFICATION_PARAMETER: &str = "classification";
const CLASSIFICATION_TOP_K: i64 = 1;

const GENERATION_INPUTS: usize = 9;
const DEFAULT_MAX_NEW_TOKENS: u32 = 50;
const DEFAULT_CHAT_MAX_NEW_TOKENS: u32 = 512;

/// Builds the engine request for `input`, which must match `task`.
///
/// `config` drives the image tensor layout of non-ensemble vision models. Without
/// one every input is declared as `[batch, 1]`.
pub fn build_request(
    model: &str,
    version: &str,
    task: Task,
    input: &InferInput,
    metadata: &ModelMetadata,
    config: Option<&ModelConfig>,
) -> Result<InferRequest, RequestError> {
    if input.task() != task {
        return Err(RequestError::TaskMismatch {
            task,
            input: input.task(),
        });
    }

    let raw_input_contents = match input {
        InferInput::TextToImage(params) | InferInput::ImageToImage(params) => {
            image_generation_contents(params)?
        }
        InferInput::TextGeneration(params)
        | InferInput::TextGenerationChat(params)
        | InferInput::VisualQuestionAnswering(params) => text_generation_contents(task, params)?,
        InferInput::Classification(batch)
        | InferInput::Detection(batch)
        | InferInput::Keypoint(batch)
        | InferInput::Ocr(batch)
        | InferInput::InstanceSegmentation(batch)
        | InferInput::SemanticSegmentation(batch)
        | InferInput::Unspecified(batch) => image_batch_contents(batch)?,
    };

    let declared = metadata.inputs.len();
    if declared != raw_input_contents.len() {
        return Err(RequestError::InputCountMismatch {
            task,
            expected: raw_input_contents.len(),
            declared,
        });
    }

    let shape = input_shape(task, input.batch_size(), metadata, config)?;
    let inputs = metadata
        .inputs
        .iter()
        .map(|declared| InferTensor::new(declared.name.clone(), declared.datatype.clone(), shape.clone()))
        .collect();

    let outputs = metadata
        .outputs
        .iter()
        .map(|output| {
            let requested = RequestedOutput::new(output.name.clone());
            if task == Task::Classification {
                requested.with_parameter(
                    CLASSIFICATION_PARAMETER,
                    InferParameter::Int64(CLASSIFICATION_TOP_K),
                )
            } else {
                requested
            }
        })
        .collect();

    Ok(InferRequest {
        model_name: model.to_string(),
        model_version: version.to_string(),
        inputs,
        outputs,
        raw_input_contents,
    })
}

fn input_shape(
    task: Task,
    batch_size: usize,
    metadata: &ModelMetadata,
    config: Option<&ModelConfig>,
) -> Result<Vec<i64>, RequestError> {
    let batch = batch_size as i64;
    match task.family() {
        TaskFamily::ImageGeneration | TaskFamily::TextGeneration => Ok(vec![1]),
        TaskFamily::Unspecified => Ok(vec![batch, 1]),
        TaskFamily::Vision => match config {
            Some(config) if !config.is_ensemble() => image_shape(task, metadata, config),
            _ => Ok(vec![batch, 1]),
        },
    }
}

/// `[1, C, H, W]` or `[1, H, W, C]`, read from the first declared input.
fn image_shape(
    task: Task,
    metadata: &ModelMetadata,
    config: &ModelConfig,
) -> Result<Vec<i64>, RequestError> {
    let Some(input) = metadata.inputs.first() else {
        return Err(RequestError::InputCountMismatch {
            task,
            expected: 1,
            declared: 0,
        });
    };
    let offset = usize::from(config.max_batch_size > 0);
    let invalid = || RequestError::InvalidImageShape {
        input: input.name.clone(),
        shape: input.shape.clone(),
    };
    let dims = input.shape.get(offset..offset + 3).ok_or_else(invalid)?;

    let shape = match config.input_format() {
        InputFormat::Nhwc => {
            let (h, w, c) = (dims[0], dims[1], dims[2]);
            vec![1, h, w, c]
        }
        InputFormat::Nchw | InputFormat::None => {
            let (c, h, w) = (dims[0], dims[1], dims[2]);
            vec![1, c, h, w]
        }
    };
    Ok(shape)
}

fn image_batch_contents(batch: &ImageBatch) -> Result<Vec<Vec<u8>>, RequestError> {
    Ok(vec![serialize_bytes_tensor(&batch.images)?])
}

fn bytes_scalar(value: &str) -> Result<Vec<u8>, RequestError> {
    Ok(serialize_bytes_tensor(&[value])?)
}

fn image_generation_contents(params: &ImageGenerationInput) -> Result<Vec<Vec<u8>>, RequestError> {
    let contents = vec![
        bytes_scalar(&params.prompt)?,
        bytes_scalar(NEGATIVE_PROMPT_PLACEHOLDER)?,
        bytes_scalar(&params.prompt_image)?,
        encode_u32(params.samples),
        bytes_scalar(SCHEDULER)?,
        encode_u32(params.steps),
        encode_f32(narrow_guidance_scale(params.cfg_scale)),
        encode_u64(params.seed as u64),
        bytes_scalar(&params.extra_params)?,
    ];
    debug_assert_eq!(contents.len(), GENERATION_INPUTS);
    Ok(contents)
}

fn text_generation_contents(
    task: Task,
    params: &TextGenerationInput,
) -> Result<Vec<Vec<u8>>, RequestError> {
    let max_new_tokens = params.max_new_tokens.unwrap_or(match task {
        Task::TextGeneration => DEFAULT_MAX_NEW_TOKENS,
        _ => DEFAULT_CHAT_MAX_NEW_TOKENS,
    });

    let contents = vec![
        bytes_scalar(&params.prompt)?,
        bytes_scalar(&params.prompt_images)?,
        bytes_scalar(&params.chat_history)?,
        bytes_scalar(&params.system_message)?,
        encode_u32(max_new_tokens),
        encode_f32(params.temperature),
        encode_u32(params.top_k),
        encode_u64(params.seed as u64),
        bytes_scalar(&params.extra_params)?,
    ];
    debug_assert_eq!(contents.len(), GENERATION_INPUTS);
    Ok(contents)
}

/// The wire carries `f32`; out-of-range scales saturate at `f32::MAX`.
fn narrow_guidance_scale(value: f64) -> f32 {
    if value.abs() > f64::from(f32::MAX) {
        log::warn!("Guidance scale {value} overflows f32, clamping");
        (value.signum() as f32) * f32::MAX
    } else {
        value as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferline_api::schemas::ModelInputConfig;

    fn metadata(inputs: &[(&str, &str, Vec<i64>)], outputs: &[&str]) -> ModelMetadata {
        ModelMetadata {
            name: "model".to_string(),
            inputs: inputs
                .iter()
                .map(|(name, datatype, shape)| {
                    InferTensor::new(name.to_string(), datatype.to_string(), shape.clone())
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|name| InferTensor::new(name.to_string(), "BYTES".to_string(), vec![-1]))
                .collect(),
            ..Default::default()
        }
    }

    fn generation_metadata() -> ModelMetadata {
        let names = [
            "prompt", "negative", "image", "samples", "scheduler", "steps", "scale", "seed", "extra",
        ];
        let inputs: Vec<_> = names.iter().map(|name| (*name, "BYTES", vec![1])).collect();
        metadata(&inputs, &["images"])
    }

    fn config(platform: &str, max_batch_size: i64, format: InputFormat) -> ModelConfig {
        ModelConfig {
            name: "model".to_string(),
            platform: platform.to_string(),
            max_batch_size,
            input: vec![ModelInputConfig {
                name: "images".to_string(),
                format,
                dims: vec![],
            }],
        }
    }

    mod generation {
        use super::*;

        #[test]
        fn test_text_to_image_layout() {
            let input = InferInput::TextToImage(ImageGenerationInput {
                prompt: "a cat".to_string(),
                seed: -1,
                ..Default::default()
            });

            let request = build_request(
                "sd",
                "1",
                Task::TextToImage,
                &input,
                &generation_metadata(),
                None,
            )
            .unwrap();

            let raw = &request.raw_input_contents;
            assert_eq!(raw.len(), 9);
            assert_eq!(raw[0], serialize_bytes_tensor(&["a cat"]).unwrap());
            assert_eq!(raw[1], serialize_bytes_tensor(&["NONE"]).unwrap());
            assert_eq!(raw[3], 1u32.to_le_bytes());
            assert_eq!(
                raw[4],
                serialize_bytes_tensor(&["DPMSolverMultistepScheduler"]).unwrap()
            );
            assert_eq!(raw[5], 10u32.to_le_bytes());
            assert_eq!(raw[6], 7.0f32.to_le_bytes());
            assert_eq!(raw[7], u64::MAX.to_le_bytes());
            assert!(request.inputs.iter().all(|input| input.shape == vec![1]));
            assert!(request.outputs[0].parameters.is_empty());
        }

        #[test]
        fn test_guidance_scale_is_clamped() {
            assert_eq!(narrow_guidance_scale(1e300), f32::MAX);
            assert_eq!(narrow_guidance_scale(-1e300), -f32::MAX);
            assert_eq!(narrow_guidance_scale(7.5), 7.5);
        }

        #[test]
        fn test_text_generation_layout_and_defaults() {
            let params = TextGenerationInput {
                prompt: "hi".to_string(),
                ..Default::default()
            };
            let metadata = generation_metadata();

            let request = build_request(
                "llm",
                "1",
                Task::TextGeneration,
                &InferInput::TextGeneration(params.clone()),
                &metadata,
                None,
            )
            .unwrap();
            let raw = &request.raw_input_contents;
            assert_eq!(raw[4], 50u32.to_le_bytes());
            assert_eq!(raw[5], 0.7f32.to_le_bytes());
            assert_eq!(raw[6], 10u32.to_le_bytes());
            assert_eq!(raw[7], 1024u64.to_le_bytes());

            let request = build_request(
                "llm",
                "1",
                Task::TextGenerationChat,
                &InferInput::TextGenerationChat(params),
                &metadata,
                None,
            )
            .unwrap();
            assert_eq!(request.raw_input_contents[4], 512u32.to_le_bytes());
        }

        #[test]
        fn test_generation_requires_all_inputs() {
            let metadata = metadata(&[("prompt", "BYTES", vec![1])], &["text"]);
            let err = build_request(
                "llm",
                "1",
                Task::TextGeneration,
                &InferInput::TextGeneration(Default::default()),
                &metadata,
                None,
            )
            .unwrap_err();
            assert_eq!(
                err,
                RequestError::InputCountMismatch {
                    task: Task::TextGeneration,
                    expected: 9,
                    declared: 1,
                }
            );
        }
    }

    mod vision {
        use super::*;

        fn batch() -> InferInput {
            InferInput::Detection(ImageBatch::new(vec![vec![1, 2], vec![3]]))
        }

        #[test]
        fn test_ensemble_or_unknown_config_uses_batch_shape() {
            let metadata = metadata(&[("images", "BYTES", vec![-1, 3, 640, 640])], &["boxes", "labels"]);

            for model_config in [None, Some(config("ensemble", 0, InputFormat::Nchw))] {
                let request = build_request(
                    "yolo",
                    "1",
                    Task::Detection,
                    &batch(),
                    &metadata,
                    model_config.as_ref(),
                )
                        .unwrap();
                assert_eq!(request.inputs[0].shape, vec![2, 1]);
                assert_eq!(
                    request.raw_input_contents,
                    vec![serialize_bytes_tensor(&[vec![1u8, 2], vec![3]]).unwrap()]
                );
            }
        }

        #[test]
        fn test_image_layout_from_config() {
            let nchw = metadata(&[("images", "UINT8", vec![-1, 3, 224, 200])], &["out"]);
            let request = build_request(
                "resnet",
                "1",
                Task::Detection,
                &batch(),
                &nchw,
                Some(&config("onnxruntime_onnx", 8, InputFormat::Nchw)),
            )
            .unwrap();
            assert_eq!(request.inputs[0].shape, vec![1, 3, 224, 200]);
            assert_eq!(request.inputs[0].datatype, "UINT8");

            let nhwc = metadata(&[("images", "UINT8", vec![224, 200, 3])], &["out"]);
            let request = build_request(
                "resnet",
                "1",
                Task::Detection,
                &batch(),
                &nhwc,
                Some(&config("tensorflow", 0, InputFormat::Nhwc)),
            )
            .unwrap();
            assert_eq!(request.inputs[0].shape, vec![1, 224, 200, 3]);
        }

        #[test]
        fn test_image_layout_needs_three_dims() {
            let metadata = metadata(&[("images", "UINT8", vec![-1, 3])], &["out"]);
            let err = build_request(
                "resnet",
                "1",
                Task::Detection,
                &batch(),
                &metadata,
                Some(&config("onnxruntime_onnx", 8, InputFormat::Nchw)),
            )
            .unwrap_err();
            assert!(matches!(err, RequestError::InvalidImageShape { .. }));
        }

        #[test]
        fn test_classification_requests_top_one() {
            let metadata = metadata(&[("images", "BYTES", vec![-1, 1])], &["labels"]);
            let input = InferInput::Classification(ImageBatch::new(vec![vec![0]]));
            let request =
                build_request("cls", "1", Task::Classification, &input, &metadata, None).unwrap();
            assert_eq!(
                request.outputs[0].parameters.get(CLASSIFICATION_PARAMETER),
                Some(&InferParameter::Int64(1))
            );
        }

        #[test]
        fn test_task_mismatch_fails_fast() {
            let metadata = metadata(&[("images", "BYTES", vec![-1, 1])], &["labels"]);
            let err =
                build_request("cls", "1", Task::Classification, &batch(), &metadata, None).unwrap_err();
            assert_eq!(
                err,
                RequestError::TaskMismatch {
                    task: Task::Classification,
                    input: Task::Detection,
                }
            );
        }
    }
}
