use std::sync::Arc;

use anyhow::Context as _;
use inferline_api::{EngineClient, InferenceEngine};
use inferline_runtime::{
    AcceptAllValidator, CancellationToken, Collaborators, FsObjectStorage, FsRunRepository,
    InferlineConfig, JsonSchemaValidator, LocalActivityExecutor, LocalUsageMeter, NoopUsageMeter,
    SchemaValidator, TriggerActivity, UsageMeter,
};

/// Wiring of config into engine client and local collaborators.
pub struct CliContext {
    config: InferlineConfig,
}

impl CliContext {
    pub fn new(config: InferlineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferlineConfig {
        &self.config
    }

    pub fn engine(&self) -> anyhow::Result<Arc<dyn InferenceEngine>> {
        let engine = &self.config.engine;
        let mut client = EngineClient::new(&engine.endpoint, engine.timeout())
            .with_context(|| format!("Invalid engine endpoint {}", engine.endpoint))?;
        if let Some(serve_endpoint) = &engine.serve_endpoint {
            client = client
                .with_serve_endpoint(serve_endpoint)
                .with_context(|| format!("Invalid serve endpoint {serve_endpoint}"))?;
        }
        Ok(Arc::new(client))
    }

    pub fn collaborators(&self) -> anyhow::Result<Collaborators> {
        let usage: Arc<dyn UsageMeter> = if self.config.usage.enabled {
            Arc::new(LocalUsageMeter::new(self.config.usage.credit_limit_ms))
        } else {
            Arc::new(NoopUsageMeter)
        };
        let validator: Arc<dyn SchemaValidator> = match &self.config.schemas.dir {
            Some(dir) => Arc::new(
                JsonSchemaValidator::from_dir(dir).context("Failed to load output schemas")?,
            ),
            None => Arc::new(AcceptAllValidator),
        };

        Ok(Collaborators::new(
            Arc::new(FsObjectStorage::new(&self.config.storage.root)),
            Arc::new(FsRunRepository::new(&self.config.repository.root)),
            usage,
            validator,
        ))
    }

    pub fn activity(&self) -> anyhow::Result<TriggerActivity> {
        Ok(TriggerActivity::new(self.engine()?, self.collaborators()?)
            .with_poll_interval(self.config.workflow.poll_interval()))
    }

    pub fn executor(&self) -> LocalActivityExecutor {
        LocalActivityExecutor::new(self.config.workflow.retry_policy())
    }

    /// A fresh token, bounded by the configured readiness timeout.
    pub fn token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        match self.config.workflow.readiness_timeout() {
            Some(timeout) => token.with_timeout(timeout),
            None => token,
        }
    }
}
