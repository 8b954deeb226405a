use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use derive_new::new;
use inferline_api::InferenceEngine;
use inferline_core::{InferInput, InferenceClient, InferenceError, Task, TaskOutput};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cancellable::CancellationToken;
use crate::readiness::{PollError, ReadinessPoller};
use crate::repository::{RepositoryError, RunRepository};
use crate::run::{ModelRun, RunSource, RunStatus};
use crate::schema::{SchemaError, SchemaValidator};
use crate::storage::{APPLICATION_JSON, ObjectStorage, StorageError};
use crate::usage::{UsageError, UsageMeter, UsageRecord};

pub const DEFAULT_HARDWARE: &str = "CPU";

fn default_hardware() -> String {
    DEFAULT_HARDWARE.to_string()
}

/// Everything needed to run one trigger. The trigger id doubles as the run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerParams {
    pub trigger_id: Uuid,
    pub model_id: String,
    pub model_version: String,
    pub task: Task,
    pub input_reference: String,
    #[serde(default)]
    pub requester_id: String,
    #[serde(default = "default_hardware")]
    pub hardware: String,
    #[serde(default)]
    pub source: RunSource,
}

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Readiness(#[from] PollError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Failed to decode trigger input: {0}")]
    InputDecode(#[source] serde_json::Error),
    #[error("Trigger input is for {actual}, but the model serves {expected}")]
    TaskMismatch { expected: Task, actual: Task },
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    SchemaValidation(#[from] SchemaError),
    #[error("Failed to serialize output: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("Failed to update run record: {0}")]
    Repository(#[from] RepositoryError),
}

impl TriggerError {
    /// Whether running the same trigger again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TriggerError::Usage(UsageError::QuotaExceeded { .. }) => false,
            TriggerError::Usage(UsageError::Unavailable(_)) => true,
            TriggerError::Readiness(PollError::Transport(_)) => true,
            TriggerError::Readiness(_) => false,
            TriggerError::Inference(InferenceError::Engine(e)) => e.is_transient(),
            TriggerError::Inference(_) => false,
            TriggerError::Storage(_) | TriggerError::Repository(_) => true,
            TriggerError::InputDecode(_)
            | TriggerError::TaskMismatch { .. }
            | TriggerError::SchemaValidation(_)
            | TriggerError::Serialization(_) => false,
        }
    }
}

/// End-user facing failure of one trigger.
#[derive(Error, Debug)]
#[error("Model {model_id} failed to execute. {source}")]
pub struct ActivityError {
    pub model_id: String,
    #[source]
    pub source: TriggerError,
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Serialized body of the stored output object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub task: Task,
    pub task_outputs: Vec<TaskOutput>,
}

/// Object key of a trigger's output. Stable across retries.
pub fn output_key(model_id: &str, trigger_id: Uuid) -> String {
    format!("outputs/{model_id}/{trigger_id}.json")
}

#[derive(Clone, new)]
pub struct Collaborators {
    pub storage: Arc<dyn ObjectStorage>,
    pub repository: Arc<dyn RunRepository>,
    pub usage: Arc<dyn UsageMeter>,
    pub validator: Arc<dyn SchemaValidator>,
}

/// Runs one trigger end to end: quota, readiness, inference, validation and persistence.
#[derive(Clone)]
pub struct TriggerActivity {
    client: InferenceClient,
    poller: ReadinessPoller,
    collaborators: Collaborators,
}

impl TriggerActivity {
    pub fn new(engine: Arc<dyn InferenceEngine>, collaborators: Collaborators) -> Self {
        Self {
            client: InferenceClient::new(engine.clone()),
            poller: ReadinessPoller::new(engine),
            collaborators,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poller = self.poller.with_interval(interval);
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Executes the trigger once. On failure the run is recorded as failed
    /// before the error is returned.
    ///
    /// A trigger whose run is already completed is not executed again; the
    /// stored run is returned as is.
    pub fn execute(
        &self,
        params: &TriggerParams,
        token: &CancellationToken,
    ) -> Result<ModelRun, ActivityError> {
        match self.completed_run(params.trigger_id) {
            Ok(Some(run)) => {
                log::info!("Trigger {} already completed, skipping", params.trigger_id);
                return Ok(run);
            }
            Ok(None) => {}
            Err(e) => {
                let error = ActivityError {
                    model_id: params.model_id.clone(),
                    source: e.into(),
                };
                log::error!("Trigger {} failed: {error}", params.trigger_id);
                return Err(error);
            }
        }

        let mut run = new_run(params);
        log::info!(
            "Trigger {} started for model {}/{}",
            params.trigger_id,
            params.model_id,
            params.model_version
        );

        match self.run_steps(params, &mut run, token) {
            Ok(()) => {
                log::info!(
                    "Trigger {} completed in {}ms",
                    params.trigger_id,
                    run.total_duration_ms.unwrap_or_default()
                );
                Ok(run)
            }
            Err(source) => {
                let error = ActivityError {
                    model_id: params.model_id.clone(),
                    source,
                };
                log::error!("Trigger {} failed: {error}", params.trigger_id);

                // A concurrent execution of the same trigger may have completed meanwhile.
                if let Ok(Some(completed)) = self.completed_run(params.trigger_id) {
                    log::warn!(
                        "Trigger {} was completed by another execution, keeping that run",
                        params.trigger_id
                    );
                    return Ok(completed);
                }

                run.fail(Utc::now(), error.to_string());
                if let Err(e) = self.collaborators.repository.update_run(&run) {
                    log::error!("Failed to mark run {} as {}: {e}", run.id, run.status);
                }
                Err(error)
            }
        }
    }

    fn completed_run(&self, trigger_id: Uuid) -> Result<Option<ModelRun>, RepositoryError> {
        Ok(self
            .collaborators
            .repository
            .get_run(trigger_id)?
            .filter(|run| run.status == RunStatus::Completed))
    }

    fn run_steps(
        &self,
        params: &TriggerParams,
        run: &mut ModelRun,
        token: &CancellationToken,
    ) -> Result<(), TriggerError> {
        let Collaborators {
            storage,
            repository,
            usage,
            validator,
        } = &self.collaborators;

        usage.check(&params.requester_id)?;
        repository.update_run(run)?;

        let readiness =
            self.poller
                .wait_until_ready(&params.model_id, &params.model_version, token)?;
        log::debug!("Model {} is ready: {readiness}", params.model_id);

        let payload = storage.get_object(&params.input_reference)?;
        let input = InferInput::from_json(&payload).map_err(TriggerError::InputDecode)?;
        if input.task() != params.task {
            return Err(TriggerError::TaskMismatch {
                expected: params.task,
                actual: input.task(),
            });
        }

        let task_outputs =
            self.client
                .infer(&params.model_id, &params.model_version, params.task, &input)?;
        for output in &task_outputs {
            let item = output.payload().map_err(TriggerError::Serialization)?;
            validator.validate(params.task, &item)?;
        }

        let response = TriggerResponse {
            task: params.task,
            task_outputs,
        };
        let body = serde_json::to_vec(&response).map_err(TriggerError::Serialization)?;
        let key = output_key(&params.model_id, params.trigger_id);
        let info = storage.put_object(&key, &body, APPLICATION_JSON)?;
        log::debug!("Stored {} bytes of output at {}", info.size, info.key);

        run.complete(Utc::now(), key);
        repository.update_run(run)?;

        let record = UsageRecord {
            trigger_id: params.trigger_id,
            model_id: params.model_id.clone(),
            model_version: params.model_version.clone(),
            hardware: params.hardware.clone(),
            requester_id: params.requester_id.clone(),
            usage_time_ms: run
                .total_duration_ms
                .and_then(|ms| u64::try_from(ms).ok())
                .unwrap_or_default(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = usage.collect(record) {
            log::warn!("Failed to record usage of trigger {}: {e}", params.trigger_id);
        }

        Ok(())
    }
}

fn new_run(params: &TriggerParams) -> ModelRun {
    ModelRun {
        id: params.trigger_id,
        model_id: params.model_id.clone(),
        model_version: params.model_version.clone(),
        task: params.task,
        status: RunStatus::Processing,
        source: params.source,
        requester_id: params.requester_id.clone(),
        hardware: params.hardware.clone(),
        input_reference: params.input_reference.clone(),
        output_reference: None,
        error: None,
        started_at: Utc::now(),
        ended_at: None,
        total_duration_ms: None,
    }
}
