use std::collections::BTreeMap;

use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Tensor element types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Fp16,
    Fp32,
    Fp64,
    Bf16,
    Bytes,
    /// Legacy spelling of [`DataType::Bytes`] still emitted by some backends.
    String,
}

/// Declared name, element type and shape of one tensor.
///
/// The payload travels separately, positionally aligned with the tensor's
/// place in the request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct InferTensor {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<i64>,
}

impl InferTensor {
    pub fn data_type(&self) -> Option<DataType> {
        self.datatype.parse().ok()
    }

    /// Number of elements implied by the shape. Dynamic (negative) dimensions count as zero.
    pub fn element_count(&self) -> usize {
        self.shape
            .iter()
            .map(|dim| usize::try_from(*dim).unwrap_or(0))
            .product()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InferParameter {
    Bool(bool),
    Int64(i64),
    String(String),
}

/// An output the caller wants back, with optional per-output parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct RequestedOutput {
    pub name: String,
    #[new(default)]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, InferParameter>,
}

impl RequestedOutput {
    pub fn with_parameter(mut self, key: impl Into<String>, value: InferParameter) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferRequest {
    pub model_name: String,
    pub model_version: String,
    pub inputs: Vec<InferTensor>,
    pub outputs: Vec<RequestedOutput>,
    pub raw_input_contents: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferResponse {
    pub model_name: String,
    pub model_version: String,
    pub outputs: Vec<InferTensor>,
    pub raw_output_contents: Vec<Vec<u8>>,
}

impl InferResponse {
    /// Looks up an output by name together with its raw payload.
    ///
    /// The payload is `None` when the engine sent no bytes for a tensor that
    /// should have some.
    pub fn output(&self, name: &str) -> Option<(&InferTensor, Option<&[u8]>)> {
        let index = self.outputs.iter().position(|output| output.name == name)?;
        let tensor = &self.outputs[index];
        let raw = self
            .raw_output_contents
            .get(index)
            .map(Vec::as_slice)
            .filter(|raw| !raw.is_empty() || tensor.element_count() == 0);
        Some((tensor, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> InferResponse {
        InferResponse {
            model_name: "m".to_string(),
            model_version: "1".to_string(),
            outputs: vec![
                InferTensor::new("boxes".to_string(), "FP32".to_string(), vec![1, 2]),
                InferTensor::new("labels".to_string(), "BYTES".to_string(), vec![1, 2]),
                InferTensor::new("empty".to_string(), "BYTES".to_string(), vec![0]),
            ],
            raw_output_contents: vec![vec![0; 8], vec![], vec![]],
        }
    }

    #[test]
    fn test_output_lookup() {
        let response = response();
        let (tensor, raw) = response.output("boxes").unwrap();
        assert_eq!(tensor.data_type(), Some(DataType::Fp32));
        assert_eq!(raw.map(<[u8]>::len), Some(8));
        assert!(response.output("scores").is_none());
    }

    #[test]
    fn test_output_without_payload_reports_missing_content() {
        let response = response();
        let (_, raw) = response.output("labels").unwrap();
        assert!(raw.is_none());

        let (_, raw) = response.output("empty").unwrap();
        assert_eq!(raw, Some(&[][..]));
    }

    #[test]
    fn test_datatype_parsing() {
        assert_eq!("BYTES".parse::<DataType>().ok(), Some(DataType::Bytes));
        assert_eq!("UINT8".parse::<DataType>().ok(), Some(DataType::Uint8));
        assert_eq!(DataType::Fp32.to_string(), "FP32");
        assert!("COMPLEX64".parse::<DataType>().is_err());
    }

    #[test]
    fn test_requested_output_parameters_serialize() {
        let output = RequestedOutput::new("probabilities".to_string())
            .with_parameter("classification", InferParameter::Int64(1));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["parameters"]["classification"], 1);

        let bare = serde_json::to_value(RequestedOutput::new("x".to_string())).unwrap();
        assert!(bare.get("parameters").is_none());
    }
}
