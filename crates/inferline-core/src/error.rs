use thiserror::Error;

use crate::task::Task;

/// Malformed binary tensor content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Truncated tensor: element {index} needs {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        index: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Tensor buffer of {len} bytes is not a multiple of {width}")]
    Misaligned { len: usize, width: usize },
    #[error("Element of {0} bytes does not fit a 4-byte length prefix")]
    ElementTooLarge(usize),
    #[error("Expected a {expected}D shape, got {}D shape {shape:?}", .shape.len())]
    RankMismatch { expected: usize, shape: Vec<i64> },
    #[error("Cannot reshape array of length {len} into shape {shape:?}")]
    ShapeMismatch { len: usize, shape: Vec<i64> },
}

impl CodecError {
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            CodecError::RankMismatch { .. } | CodecError::ShapeMismatch { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Unable to find inference output '{0}'")]
    OutputNotFound(String),
    #[error("Unable to find output content for '{0}'")]
    OutputContentMissing(String),
    #[error("Malformed content for output '{tensor}': {source}")]
    Encoding {
        tensor: String,
        #[source]
        source: CodecError,
    },
    #[error("Unable to reshape output '{tensor}': {source}")]
    ShapeMismatch {
        tensor: String,
        #[source]
        source: CodecError,
    },
    #[error("Inconsistent batch size: '{first}' has {first_len} but '{other}' has {other_len}")]
    InconsistentBatchSize {
        first: String,
        first_len: usize,
        other: String,
        other_len: usize,
    },
    #[error("Unsupported datatype {datatype} for output '{tensor}'")]
    UnsupportedDatatype { tensor: String, datatype: String },
    #[error("Wrong output format of {task} task: {declared} outputs declared, {expected} required")]
    InsufficientOutputs {
        task: Task,
        expected: usize,
        declared: usize,
    },
    #[error("Unable to decode output '{tensor}': {reason}")]
    MalformedOutput { tensor: String, reason: String },
    #[error("Failed to encode generated image: {0}")]
    ImageEncoding(String),
}

impl DecodeError {
    pub(crate) fn codec(tensor: &str, source: CodecError) -> Self {
        if source.is_shape_error() {
            DecodeError::ShapeMismatch {
                tensor: tensor.to_string(),
                source,
            }
        } else {
            DecodeError::Encoding {
                tensor: tensor.to_string(),
                source,
            }
        }
    }
}

/// Failures while turning an [`InferInput`](crate::InferInput) into a wire request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Input for task {input} cannot be sent to a {task} model")]
    TaskMismatch { task: Task, input: Task },
    #[error("Model declares {declared} inputs, {task} requests need {expected}")]
    InputCountMismatch {
        task: Task,
        expected: usize,
        declared: usize,
    },
    #[error("Model input '{input}' has shape {shape:?}, unable to derive image dimensions")]
    InvalidImageShape { input: String, shape: Vec<i64> },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Any failure of one inference call, from request building to decoding.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to build request: {0}")]
    Request(#[from] RequestError),
    #[error("Inference engine error: {0}")]
    Engine(#[from] inferline_api::ClientError),
    #[error("Failed to decode inference output: {0}")]
    Decode(#[from] DecodeError),
}
