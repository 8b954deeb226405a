//! Framing of the HTTP binary tensor extension.
//!
//! A body is a JSON header immediately followed by the raw tensor payloads
//! in declaration order. The length of the JSON part travels in the
//! [`INFERENCE_HEADER_CONTENT_LENGTH`] header and each tensor declares its
//! own `binary_data_size`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::schemas::{InferParameter, InferRequest, InferResponse, InferTensor};

pub const INFERENCE_HEADER_CONTENT_LENGTH: &str = "Inference-Header-Content-Length";

#[derive(Serialize)]
struct BinaryDataSize {
    binary_data_size: usize,
}

#[derive(Serialize)]
struct InputHeader<'a> {
    name: &'a str,
    datatype: &'a str,
    shape: &'a [i64],
    parameters: BinaryDataSize,
}

#[derive(Serialize)]
struct OutputHeader<'a> {
    name: &'a str,
    parameters: BTreeMap<&'a str, InferParameter>,
}

#[derive(Serialize)]
struct RequestHeader<'a> {
    inputs: Vec<InputHeader<'a>>,
    outputs: Vec<OutputHeader<'a>>,
}

#[derive(Deserialize, Default)]
struct OutputParameters {
    binary_data_size: Option<usize>,
}

#[derive(Deserialize)]
struct OutputTensorHeader {
    name: String,
    datatype: String,
    shape: Vec<i64>,
    #[serde(default)]
    parameters: Option<OutputParameters>,
}

#[derive(Deserialize)]
struct ResponseHeader {
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    model_version: String,
    #[serde(default)]
    outputs: Vec<OutputTensorHeader>,
}

/// A request body ready to be sent, with the length of its JSON prefix.
#[derive(Debug)]
pub struct EncodedBody {
    pub body: Vec<u8>,
    pub header_length: usize,
}

pub fn encode_request(request: &InferRequest) -> Result<EncodedBody, ClientError> {
    if request.inputs.len() != request.raw_input_contents.len() {
        return Err(ClientError::MalformedBody(format!(
            "{} inputs declared but {} raw contents provided",
            request.inputs.len(),
            request.raw_input_contents.len()
        )));
    }

    let inputs = request
        .inputs
        .iter()
        .zip(&request.raw_input_contents)
        .map(|(input, raw)| InputHeader {
            name: &input.name,
            datatype: &input.datatype,
            shape: &input.shape,
            parameters: BinaryDataSize {
                binary_data_size: raw.len(),
            },
        })
        .collect();

    let outputs = request
        .outputs
        .iter()
        .map(|output| {
            let mut parameters: BTreeMap<&str, InferParameter> = output
                .parameters
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone()))
                .collect();
            parameters.insert("binary_data", InferParameter::Bool(true));
            OutputHeader {
                name: &output.name,
                parameters,
            }
        })
        .collect();

    let mut body = serde_json::to_vec(&RequestHeader { inputs, outputs })?;
    let header_length = body.len();
    for raw in &request.raw_input_contents {
        body.extend_from_slice(raw);
    }

    Ok(EncodedBody {
        body,
        header_length,
    })
}

/// Splits a response body into declared outputs and their positionally aligned payloads.
///
/// Without a header length the whole body is JSON and no payload is attached.
/// Outputs that carry no `binary_data_size` get an empty payload.
pub fn decode_response(
    body: &[u8],
    header_length: Option<usize>,
) -> Result<InferResponse, ClientError> {
    let header_length = header_length.unwrap_or(body.len());
    if header_length > body.len() {
        return Err(ClientError::MalformedBody(format!(
            "header length {header_length} exceeds body length {}",
            body.len()
        )));
    }

    let (header, mut binary) = body.split_at(header_length);
    let header: ResponseHeader = serde_json::from_slice(header)?;

    let mut outputs = Vec::with_capacity(header.outputs.len());
    let mut raw_output_contents = Vec::with_capacity(header.outputs.len());
    for output in header.outputs {
        let size = output
            .parameters
            .and_then(|parameters| parameters.binary_data_size)
            .unwrap_or(0);
        if size > binary.len() {
            return Err(ClientError::MalformedBody(format!(
                "output '{}' declares {size} bytes but only {} remain",
                output.name,
                binary.len()
            )));
        }
        let (raw, rest) = binary.split_at(size);
        raw_output_contents.push(raw.to_vec());
        binary = rest;
        outputs.push(InferTensor::new(output.name, output.datatype, output.shape));
    }

    if !binary.is_empty() {
        log::warn!("Ignoring {} trailing bytes in inference response", binary.len());
    }

    Ok(InferResponse {
        model_name: header.model_name,
        model_version: header.model_version,
        outputs,
        raw_output_contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::RequestedOutput;
    use serde_json::json;

    fn request() -> InferRequest {
        InferRequest {
            model_name: "ocr".to_string(),
            model_version: "1".to_string(),
            inputs: vec![InferTensor::new(
                "images".to_string(),
                "BYTES".to_string(),
                vec![1, 1],
            )],
            outputs: vec![
                RequestedOutput::new("texts".to_string())
                    .with_parameter("classification", InferParameter::Int64(1)),
            ],
            raw_input_contents: vec![vec![3, 0, 0, 0, b'a', b'b', b'c']],
        }
    }

    #[test]
    fn test_encode_request_layout() {
        let encoded = encode_request(&request()).unwrap();
        let (header, binary) = encoded.body.split_at(encoded.header_length);

        assert_eq!(binary, &[3, 0, 0, 0, b'a', b'b', b'c']);
        let header: serde_json::Value = serde_json::from_slice(header).unwrap();
        assert_eq!(
            header,
            json!({
                "inputs": [{
                    "name": "images",
                    "datatype": "BYTES",
                    "shape": [1, 1],
                    "parameters": { "binary_data_size": 7 }
                }],
                "outputs": [{
                    "name": "texts",
                    "parameters": { "binary_data": true, "classification": 1 }
                }]
            })
        );
    }

    #[test]
    fn test_encode_rejects_misaligned_contents() {
        let mut request = request();
        request.raw_input_contents.clear();
        assert!(matches!(
            encode_request(&request),
            Err(ClientError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_decode_response_splits_payloads() {
        let header = serde_json::to_vec(&json!({
            "model_name": "ocr",
            "model_version": "1",
            "outputs": [
                { "name": "boxes", "datatype": "INT32", "shape": [1, 1, 1], "parameters": { "binary_data_size": 4 } },
                { "name": "inline", "datatype": "FP32", "shape": [1], "data": [0.5] },
                { "name": "texts", "datatype": "BYTES", "shape": [1, 1], "parameters": { "binary_data_size": 6 } }
            ]
        }))
        .unwrap();
        let mut body = header.clone();
        body.extend_from_slice(&[7, 0, 0, 0]);
        body.extend_from_slice(&[2, 0, 0, 0, b'h', b'i']);

        let response = decode_response(&body, Some(header.len())).unwrap();
        assert_eq!(response.model_name, "ocr");
        assert_eq!(response.outputs.len(), 3);
        assert_eq!(response.raw_output_contents[0], vec![7, 0, 0, 0]);
        assert!(response.raw_output_contents[1].is_empty());
        assert_eq!(response.raw_output_contents[2], vec![2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_decode_response_rejects_short_body() {
        let header = serde_json::to_vec(&json!({
            "outputs": [
                { "name": "x", "datatype": "FP32", "shape": [2], "parameters": { "binary_data_size": 8 } }
            ]
        }))
        .unwrap();
        let mut body = header.clone();
        body.extend_from_slice(&[0, 0, 0, 0]);

        assert!(matches!(
            decode_response(&body, Some(header.len())),
            Err(ClientError::MalformedBody(_))
        ));
        assert!(matches!(
            decode_response(&body, Some(body.len() + 1)),
            Err(ClientError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_decode_json_only_response() {
        let body = serde_json::to_vec(&json!({ "outputs": [] })).unwrap();
        let response = decode_response(&body, None).unwrap();
        assert!(response.outputs.is_empty());
    }
}
