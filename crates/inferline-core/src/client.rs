use std::sync::Arc;

use inferline_api::InferenceEngine;

use crate::decode::decode_response;
use crate::error::InferenceError;
use crate::input::InferInput;
use crate::request::build_request;
use crate::task::{Task, TaskFamily};
use crate::task_output::TaskOutput;

/// Runs structured inference against a shared engine connection.
///
/// Cheap to clone; every clone uses the same engine.
#[derive(Clone)]
pub struct InferenceClient {
    engine: Arc<dyn InferenceEngine>,
}

impl InferenceClient {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Builds the request for `input`, calls the engine and decodes the response
    /// into one item per batch element.
    pub fn infer(
        &self,
        model: &str,
        version: &str,
        task: Task,
        input: &InferInput,
    ) -> Result<Vec<TaskOutput>, InferenceError> {
        let metadata = self.engine.model_metadata(model, version)?;
        let config = match task.family() {
            TaskFamily::Vision => self.engine.model_config(model, version)?,
            _ => None,
        };

        let request = build_request(model, version, task, input, &metadata, config.as_ref())?;
        log::debug!(
            "Sending {task} request to {model}/{version} with {} inputs",
            request.inputs.len()
        );

        let response = self.engine.infer(&request)?;
        let outputs = decode_response(task, &metadata, &response)?.into_task_outputs()?;
        log::debug!("Model {model}/{version} returned {} items", outputs.len());

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use inferline_api::ClientError;
    use inferline_api::schemas::{
        InferRequest, InferResponse, InferTensor, ModelConfig, ModelMetadata, ModelReadiness,
    };

    use crate::codec::serialize_bytes_tensor;
    use crate::input::TextGenerationInput;
    use crate::task_output::TextGenerationResult;

    struct EchoEngine {
        requests: Mutex<Vec<InferRequest>>,
        config_calls: Mutex<usize>,
    }

    impl EchoEngine {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                config_calls: Mutex::new(0),
            }
        }

        fn metadata() -> ModelMetadata {
            let inputs = (0..9)
                .map(|i| InferTensor::new(format!("input_{i}"), "BYTES".to_string(), vec![1]))
                .collect();
            ModelMetadata {
                name: "llm".to_string(),
                inputs,
                outputs: vec![InferTensor::new("text".to_string(), "BYTES".to_string(), vec![-1])],
                ..Default::default()
            }
        }
    }

    impl InferenceEngine for EchoEngine {
        fn model_metadata(&self, _model: &str, _version: &str) -> Result<ModelMetadata, ClientError> {
            Ok(Self::metadata())
        }

        fn model_config(
            &self,
            _model: &str,
            _version: &str,
        ) -> Result<Option<ModelConfig>, ClientError> {
            *self.config_calls.lock().unwrap() += 1;
            Ok(None)
        }

        fn infer(&self, request: &InferRequest) -> Result<InferResponse, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            // Echo the prompt back as the generated text.
            Ok(InferResponse {
                model_name: request.model_name.clone(),
                model_version: request.model_version.clone(),
                outputs: vec![InferTensor::new("text".to_string(), "BYTES".to_string(), vec![1])],
                raw_output_contents: vec![request.raw_input_contents[0].clone()],
            })
        }

        fn model_readiness(&self, _model: &str, _version: &str) -> Result<ModelReadiness, ClientError> {
            Ok(ModelReadiness::active(1))
        }

        fn load_model(&self, _model: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[test]
    fn test_infer_round_trip() {
        let engine = Arc::new(EchoEngine::new());
        let client = InferenceClient::new(engine.clone());
        let input = InferInput::TextGeneration(TextGenerationInput {
            prompt: "hello".to_string(),
            ..Default::default()
        });

        let outputs = client.infer("llm", "v1", Task::TextGeneration, &input).unwrap();

        assert_eq!(
            outputs,
            vec![TaskOutput::TextGeneration(TextGenerationResult {
                text: "hello".to_string()
            })]
        );
        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model_version, "v1");
        assert_eq!(
            requests[0].raw_input_contents[0],
            serialize_bytes_tensor(&["hello"]).unwrap()
        );
        assert_eq!(*engine.config_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_request_errors_do_not_reach_the_engine() {
        let engine = Arc::new(EchoEngine::new());
        let client = InferenceClient::new(engine.clone());
        let input = InferInput::TextGeneration(Default::default());

        let err = client
            .infer("llm", "v1", Task::VisualQuestionAnswering, &input)
            .unwrap_err();

        assert!(matches!(err, InferenceError::Request(_)));
        assert!(engine.requests.lock().unwrap().is_empty());
    }
}
