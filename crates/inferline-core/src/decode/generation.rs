use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use inferline_api::schemas::DataType;

use crate::codec::{deserialize_f32_tensor, deserialize_string_tensor};
use crate::error::{CodecError, DecodeError};
use crate::output::{ImageOutput, TextOutput};

use super::tensors::{OutputTensors, dim, unsupported};

const JPEG_QUALITY: u8 = 100;
const CHANNELS: usize = 3;

/// Decodes `[count, height, width, 3]` float pixels in `[0, 1]` into base64 JPEGs.
///
/// All images land in a single group.
pub(super) fn images(tensors: &OutputTensors, name: &str) -> Result<ImageOutput, DecodeError> {
    let (tensor, raw) = tensors.raw(name)?;
    if tensor.data_type() != Some(DataType::Fp32) {
        return Err(unsupported(tensor));
    }
    let count = dim(tensor, 0)?;
    let height = dim(tensor, 1)?;
    let width = dim(tensor, 2)?;

    let mut group = Vec::with_capacity(count);
    if count == 0 {
        return Ok(ImageOutput {
            images: vec![group],
        });
    }

    let slice_len = raw.len() / count;
    for chunk in raw.chunks_exact(slice_len.max(1)).take(count) {
        let pixels = deserialize_f32_tensor(chunk).map_err(|e| DecodeError::codec(name, e))?;
        let needed = CHANNELS * width * height;
        if pixels.len() < needed {
            return Err(DecodeError::codec(
                name,
                CodecError::ShapeMismatch {
                    len: pixels.len(),
                    shape: tensor.shape.clone(),
                },
            ));
        }

        let rgb: Vec<u8> = pixels[..needed]
            .iter()
            .map(|value| (value * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        group.push(encode_jpeg(&rgb, width, height)?);
    }

    if group.len() != count {
        return Err(DecodeError::codec(
            name,
            CodecError::ShapeMismatch {
                len: raw.len(),
                shape: tensor.shape.clone(),
            },
        ));
    }

    Ok(ImageOutput {
        images: vec![group],
    })
}

fn encode_jpeg(rgb: &[u8], width: usize, height: usize) -> Result<String, DecodeError> {
    let to_u32 = |value: usize| {
        u32::try_from(value).map_err(|_| DecodeError::ImageEncoding(format!("dimension {value} too large")))
    };
    let (width, height) = (to_u32(width)?, to_u32(height)?);

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    encoder
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| DecodeError::ImageEncoding(e.to_string()))?;

    Ok(STANDARD.encode(&buffer))
}

/// One generated string per entry of the first dimension.
pub(super) fn texts(tensors: &OutputTensors, name: &str) -> Result<TextOutput, DecodeError> {
    let (tensor, raw) = tensors.raw(name)?;
    if !matches!(tensor.data_type(), Some(DataType::Bytes | DataType::String)) {
        return Err(unsupported(tensor));
    }
    let count = dim(tensor, 0)?;
    let texts = deserialize_string_tensor(raw, count).map_err(|e| DecodeError::codec(name, e))?;
    Ok(TextOutput { texts })
}
