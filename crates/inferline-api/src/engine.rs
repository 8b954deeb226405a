use crate::error::ClientError;
use crate::schemas::{InferRequest, InferResponse, ModelConfig, ModelMetadata, ModelReadiness};

/// Calls a remote inference engine.
///
/// Implementations are shared across concurrent triggers, so they must be
/// safe to call from many threads at once.
pub trait InferenceEngine: Send + Sync {
    fn model_metadata(&self, model: &str, version: &str) -> Result<ModelMetadata, ClientError>;

    /// Model configuration, or `None` when the engine exposes none for this model.
    fn model_config(&self, model: &str, version: &str) -> Result<Option<ModelConfig>, ClientError>;

    fn infer(&self, request: &InferRequest) -> Result<InferResponse, ClientError>;

    fn model_readiness(&self, model: &str, version: &str) -> Result<ModelReadiness, ClientError>;

    /// Asks the engine to load (deploy) a model.
    fn load_model(&self, model: &str) -> Result<(), ClientError>;
}
