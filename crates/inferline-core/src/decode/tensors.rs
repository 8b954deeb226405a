use inferline_api::schemas::{DataType, InferResponse, InferTensor};

use crate::codec::{
    deserialize_f32_tensor, deserialize_i32_tensor, deserialize_string_tensor, reshape_2d,
    reshape_3d, reshape_4d,
};
use crate::error::{CodecError, DecodeError};

/// Typed access to the named outputs of one response.
pub(crate) struct OutputTensors<'a> {
    response: &'a InferResponse,
}

impl<'a> OutputTensors<'a> {
    pub fn new(response: &'a InferResponse) -> Self {
        Self { response }
    }

    pub fn raw(&self, name: &str) -> Result<(&'a InferTensor, &'a [u8]), DecodeError> {
        let (tensor, raw) = self
            .response
            .output(name)
            .ok_or_else(|| DecodeError::OutputNotFound(name.to_string()))?;
        let raw = raw.ok_or_else(|| DecodeError::OutputContentMissing(name.to_string()))?;
        Ok((tensor, raw))
    }

    /// Bytes tensor with exactly `count` elements.
    pub fn strings(&self, name: &str, count: usize) -> Result<Vec<String>, DecodeError> {
        let (tensor, raw) = self.raw(name)?;
        ensure_text(tensor)?;
        deserialize_string_tensor(raw, count).map_err(|e| DecodeError::codec(name, e))
    }

    pub fn strings_2d(&self, name: &str) -> Result<Vec<Vec<String>>, DecodeError> {
        let (tensor, _) = self.raw(name)?;
        let flat = self.strings(name, tensor.element_count())?;
        reshape_2d(&flat, &tensor.shape).map_err(|e| DecodeError::codec(name, e))
    }

    /// Numeric tensor as `f32`. `INT32` payloads are converted.
    pub fn floats(&self, name: &str) -> Result<(&'a InferTensor, Vec<f32>), DecodeError> {
        let (tensor, raw) = self.raw(name)?;
        let values = match tensor.data_type() {
            Some(DataType::Fp32) => deserialize_f32_tensor(raw),
            Some(DataType::Int32) => {
                deserialize_i32_tensor(raw).map(|values| values.into_iter().map(|v| v as f32).collect())
            }
            _ => return Err(unsupported(tensor)),
        };
        let values = values.map_err(|e| DecodeError::codec(name, e))?;
        Ok((tensor, values))
    }

    pub fn floats_2d(&self, name: &str) -> Result<Vec<Vec<f32>>, DecodeError> {
        let (tensor, flat) = self.floats(name)?;
        reshape_2d(&flat, &tensor.shape).map_err(|e| DecodeError::codec(name, e))
    }

    pub fn floats_3d(&self, name: &str) -> Result<Vec<Vec<Vec<f32>>>, DecodeError> {
        let (tensor, flat) = self.floats(name)?;
        reshape_3d(&flat, &tensor.shape).map_err(|e| DecodeError::codec(name, e))
    }

    pub fn floats_4d(&self, name: &str) -> Result<Vec<Vec<Vec<Vec<f32>>>>, DecodeError> {
        let (tensor, flat) = self.floats(name)?;
        reshape_4d(&flat, &tensor.shape).map_err(|e| DecodeError::codec(name, e))
    }
}

fn ensure_text(tensor: &InferTensor) -> Result<(), DecodeError> {
    match tensor.data_type() {
        Some(DataType::Bytes | DataType::String) => Ok(()),
        _ => Err(unsupported(tensor)),
    }
}

pub(crate) fn unsupported(tensor: &InferTensor) -> DecodeError {
    DecodeError::UnsupportedDatatype {
        tensor: tensor.name.clone(),
        datatype: tensor.datatype.clone(),
    }
}

/// Converts one dimension of a declared shape into a count.
pub(crate) fn dim(tensor: &InferTensor, axis: usize) -> Result<usize, DecodeError> {
    let shape_error = |source| DecodeError::codec(&tensor.name, source);
    let value = tensor.shape.get(axis).ok_or_else(|| {
        shape_error(CodecError::RankMismatch {
            expected: axis + 1,
            shape: tensor.shape.clone(),
        })
    })?;
    usize::try_from(*value).map_err(|_| {
        shape_error(CodecError::ShapeMismatch {
            len: 0,
            shape: tensor.shape.clone(),
        })
    })
}

/// Outputs of one task must agree on the batch dimension.
pub(crate) fn ensure_batch<A, B>(
    first: &str,
    first_batch: &[A],
    other: &str,
    other_batch: &[B],
) -> Result<(), DecodeError> {
    if first_batch.len() != other_batch.len() {
        log::warn!(
            "Output '{first}' has batch size {} but '{other}' has {}",
            first_batch.len(),
            other_batch.len()
        );
        return Err(DecodeError::InconsistentBatchSize {
            first: first.to_string(),
            first_len: first_batch.len(),
            other: other.to_string(),
            other_len: other_batch.len(),
        });
    }
    Ok(())
}

/// Per-element outputs of one task must describe the same number of objects.
pub(crate) fn ensure_objects<A, B>(
    first: &str,
    first_batch: &[Vec<A>],
    other: &str,
    other_batch: &[Vec<B>],
) -> Result<(), DecodeError> {
    let first_objects = first_batch.first().map_or(0, Vec::len);
    let other_objects = other_batch.first().map_or(0, Vec::len);
    if first_objects != other_objects {
        return Err(DecodeError::MalformedOutput {
            tensor: other.to_string(),
            reason: format!(
                "{other_objects} entries per element, '{first}' has {first_objects}"
            ),
        });
    }
    Ok(())
}
