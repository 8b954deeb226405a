use inferline_api::schemas::{DataType, InferTensor};
use serde_json::Value;

use crate::codec::{
    deserialize_f32_tensor, deserialize_i32_tensor, deserialize_string_tensor, reshape_2d,
    reshape_3d,
};
use crate::error::{CodecError, DecodeError};
use crate::output::UnspecifiedTensor;

use super::tensors::{OutputTensors, dim, ensure_batch, unsupported};

/// Decodes every declared output generically, splitting along the batch dimension.
pub(super) fn unspecified(
    tensors: &OutputTensors,
    outputs: &[InferTensor],
) -> Result<Vec<UnspecifiedTensor>, DecodeError> {
    let decoded = outputs
        .iter()
        .map(|output| decode_tensor(tensors, &output.name))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(first) = decoded.first() {
        for other in &decoded[1..] {
            ensure_batch(&first.name, &first.batches, &other.name, &other.batches)?;
        }
    }

    Ok(decoded)
}

fn decode_tensor(tensors: &OutputTensors, name: &str) -> Result<UnspecifiedTensor, DecodeError> {
    let (tensor, raw) = tensors.raw(name)?;
    let codec_error = |e| DecodeError::codec(name, e);
    let rank = tensor.shape.len();

    let batches = match (tensor.data_type(), rank) {
        (Some(DataType::Bytes), 1) => {
            let strings = deserialize_string_tensor(raw, dim(tensor, 0)?).map_err(codec_error)?;
            vec![Value::from(strings)]
        }
        (Some(DataType::Bytes | DataType::String), 2) => {
            let strings =
                deserialize_string_tensor(raw, tensor.element_count()).map_err(codec_error)?;
            rows(reshape_2d(&strings, &tensor.shape).map_err(codec_error)?)
        }
        (Some(DataType::Fp32), 1) => {
            vec![Value::from(deserialize_f32_tensor(raw).map_err(codec_error)?)]
        }
        (Some(DataType::Fp32), 2) => {
            let values = deserialize_f32_tensor(raw).map_err(codec_error)?;
            rows(reshape_2d(&values, &tensor.shape).map_err(codec_error)?)
        }
        (Some(DataType::Fp32), 3) => {
            let values = deserialize_f32_tensor(raw).map_err(codec_error)?;
            rows(reshape_3d(&values, &tensor.shape).map_err(codec_error)?)
        }
        (Some(DataType::Int32), 1) => {
            vec![Value::from(deserialize_i32_tensor(raw).map_err(codec_error)?)]
        }
        (Some(DataType::Int32), 2) => {
            let values = deserialize_i32_tensor(raw).map_err(codec_error)?;
            rows(reshape_2d(&values, &tensor.shape).map_err(codec_error)?)
        }
        (Some(DataType::Bytes), _) => return Err(rank_error(tensor, 2)),
        (Some(DataType::String), _) => return Err(rank_error(tensor, 2)),
        (Some(DataType::Fp32), _) => return Err(rank_error(tensor, 3)),
        (Some(DataType::Int32), _) => return Err(rank_error(tensor, 2)),
        _ => return Err(unsupported(tensor)),
    };

    let shape = if rank == 1 {
        tensor.shape.clone()
    } else {
        tensor.shape[1..].to_vec()
    };

    Ok(UnspecifiedTensor {
        name: tensor.name.clone(),
        shape,
        data_type: tensor.datatype.clone(),
        batches,
    })
}

fn rows<T: Into<Value>>(batched: Vec<T>) -> Vec<Value> {
    batched.into_iter().map(Into::into).collect()
}

fn rank_error(tensor: &InferTensor, expected: usize) -> DecodeError {
    DecodeError::codec(
        &tensor.name,
        CodecError::RankMismatch {
            expected,
            shape: tensor.shape.clone(),
        },
    )
}
