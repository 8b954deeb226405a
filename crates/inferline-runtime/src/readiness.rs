use std::sync::Arc;
use std::time::Duration;

use inferline_api::schemas::{ModelReadiness, ReadinessState};
use inferline_api::{ClientError, InferenceEngine};
use thiserror::Error;

use crate::cancellable::{CancellablePoller, CancellableResult, CancellationToken};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Failed to query model readiness: {0}")]
    Transport(#[source] ClientError),
    #[error("Model upscale failed: unexpected state {0}")]
    UpscaleFailed(String),
    #[error("Waiting for the model was cancelled")]
    Cancelled,
    #[error("Timed out waiting for the model to become ready")]
    TimedOut,
}

/// Waits for a model to have at least one active replica.
#[derive(Clone)]
pub struct ReadinessPoller {
    engine: Arc<dyn InferenceEngine>,
    interval: Duration,
}

impl ReadinessPoller {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Polls until the model is servable.
    ///
    /// Offline, starting, scaling up and active without replicas all keep the
    /// poller waiting. Any state outside that set fails immediately.
    pub fn wait_until_ready(
        &self,
        model: &str,
        version: &str,
        token: &CancellationToken,
    ) -> Result<ModelReadiness, PollError> {
        let poller = CancellablePoller::with_interval(token.clone(), self.interval);
        let mut last_state = None;

        let result = poller.poll_until(|| {
            let readiness = match self.engine.model_readiness(model, version) {
                Ok(readiness) => readiness,
                Err(e) => return Some(Err(PollError::Transport(e))),
            };

            if last_state.as_ref() != Some(&readiness) {
                log::info!("Model {model}/{version} is {readiness}");
                last_state = Some(readiness.clone());
            }

            if readiness.is_servable() {
                return Some(Ok(readiness));
            }
            match readiness.state {
                ReadinessState::Offline
                | ReadinessState::Starting
                | ReadinessState::ScalingUp
                | ReadinessState::Active => None,
                ReadinessState::Unknown(state) => Some(Err(PollError::UpscaleFailed(state))),
            }
        });

        match result {
            CancellableResult::Completed(readiness) => readiness,
            CancellableResult::Cancelled => Err(PollError::Cancelled),
            CancellableResult::TimedOut => Err(PollError::TimedOut),
        }
    }
}
