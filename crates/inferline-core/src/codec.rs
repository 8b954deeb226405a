//! Binary tensor wire format.
//!
//! Bytes tensors are a concatenation of `[u32 little-endian length][payload]`
//! records with no terminator; the element count must come from the tensor
//! shape. Numeric tensors are packed little-endian values.

use crate::error::CodecError;

const LENGTH_PREFIX: usize = 4;

pub fn serialize_bytes_tensor<T: AsRef<[u8]>>(batch: &[T]) -> Result<Vec<u8>, CodecError> {
    let capacity = batch
        .iter()
        .map(|element| LENGTH_PREFIX + element.as_ref().len())
        .sum();
    let mut buffer = Vec::with_capacity(capacity);

    for element in batch {
        let element = element.as_ref();
        let len =
            u32::try_from(element.len()).map_err(|_| CodecError::ElementTooLarge(element.len()))?;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(element);
    }

    Ok(buffer)
}

/// Reads exactly `count` length-prefixed elements. Trailing bytes are ignored.
pub fn deserialize_bytes_tensor(buffer: &[u8], count: usize) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut elements = Vec::with_capacity(count.min(buffer.len() / LENGTH_PREFIX));
    let mut offset = 0;

    for index in 0..count {
        let prefix = read_array::<LENGTH_PREFIX>(buffer, offset).ok_or(CodecError::Truncated {
            index,
            offset,
            needed: LENGTH_PREFIX,
            available: buffer.len() - offset,
        })?;
        offset += LENGTH_PREFIX;

        let len = u32::from_le_bytes(prefix) as usize;
        let available = buffer.len() - offset;
        if len > available {
            return Err(CodecError::Truncated {
                index,
                offset,
                needed: len,
                available,
            });
        }
        elements.push(buffer[offset..offset + len].to_vec());
        offset += len;
    }

    Ok(elements)
}

/// Bytes tensor decoded as text. Invalid UTF-8 is replaced rather than rejected.
pub fn deserialize_string_tensor(buffer: &[u8], count: usize) -> Result<Vec<String>, CodecError> {
    Ok(deserialize_bytes_tensor(buffer, count)?
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .collect())
}

pub fn deserialize_f32_tensor(buffer: &[u8]) -> Result<Vec<f32>, CodecError> {
    deserialize_packed(buffer, f32::from_le_bytes)
}

pub fn deserialize_i32_tensor(buffer: &[u8]) -> Result<Vec<i32>, CodecError> {
    deserialize_packed(buffer, i32::from_le_bytes)
}

fn deserialize_packed<T>(buffer: &[u8], from_le: fn([u8; 4]) -> T) -> Result<Vec<T>, CodecError> {
    if buffer.len() % 4 != 0 {
        return Err(CodecError::Misaligned {
            len: buffer.len(),
            width: 4,
        });
    }

    Ok(buffer
        .chunks_exact(4)
        .map(|chunk| from_le([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn read_array<const N: usize>(buffer: &[u8], offset: usize) -> Option<[u8; N]> {
    buffer.get(offset..offset + N)?.try_into().ok()
}

pub fn encode_u32(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn encode_f32(value: f32) -> Vec<u8> {
    value.to_bits().to_le_bytes().to_vec()
}

/// Validates rank and element count, returning the dimensions as `usize`.
fn checked_dims<const R: usize>(len: usize, shape: &[i64]) -> Result<[usize; R], CodecError> {
    let dims: [i64; R] = shape.try_into().map_err(|_| CodecError::RankMismatch {
        expected: R,
        shape: shape.to_vec(),
    })?;

    let mut converted = [0usize; R];
    for (slot, dim) in converted.iter_mut().zip(dims) {
        *slot = usize::try_from(dim).map_err(|_| CodecError::ShapeMismatch {
            len,
            shape: shape.to_vec(),
        })?;
    }

    let product = converted
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim));
    if product != Some(len) {
        return Err(CodecError::ShapeMismatch {
            len,
            shape: shape.to_vec(),
        });
    }

    Ok(converted)
}

fn split_rows<T: Clone>(flat: &[T], rows: usize, width: usize) -> Vec<Vec<T>> {
    (0..rows)
        .map(|row| flat[row * width..(row + 1) * width].to_vec())
        .collect()
}

/// Row-major reshape of a flat array into `[d0][d1]`.
pub fn reshape_2d<T: Clone>(flat: &[T], shape: &[i64]) -> Result<Vec<Vec<T>>, CodecError> {
    let [d0, d1] = checked_dims::<2>(flat.len(), shape)?;
    Ok(split_rows(flat, d0, d1))
}

pub fn reshape_3d<T: Clone>(flat: &[T], shape: &[i64]) -> Result<Vec<Vec<Vec<T>>>, CodecError> {
    let [d0, d1, d2] = checked_dims::<3>(flat.len(), shape)?;
    let stride = d1 * d2;
    Ok((0..d0)
        .map(|i| split_rows(&flat[i * stride..(i + 1) * stride], d1, d2))
        .collect())
}

pub fn reshape_4d<T: Clone>(
    flat: &[T],
    shape: &[i64],
) -> Result<Vec<Vec<Vec<Vec<T>>>>, CodecError> {
    let [d0, d1, d2, d3] = checked_dims::<4>(flat.len(), shape)?;
    let outer = d1 * d2 * d3;
    let inner = d2 * d3;
    Ok((0..d0)
        .map(|i| {
            let block = &flat[i * outer..(i + 1) * outer];
            (0..d1)
                .map(|j| split_rows(&block[j * inner..(j + 1) * inner], d2, d3))
                .collect()
        })
        .collect())
}
