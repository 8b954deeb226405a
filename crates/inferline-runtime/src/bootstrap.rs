use std::thread;

use inferline_api::InferenceEngine;

use crate::pool::panic_message;

/// Outcome of loading a set of models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub succeeded: Vec<String>,
    /// Model name and failure reason.
    pub failed: Vec<(String, String)>,
}

impl BootstrapReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads every model in parallel and waits for all of them. A failing model
/// never stops the others.
pub fn bootstrap_models(engine: &dyn InferenceEngine, models: &[String]) -> BootstrapReport {
    thread::scope(|scope| {
        let handles = models
            .iter()
            .map(|model| (model, scope.spawn(move || engine.load_model(model))))
            .collect::<Vec<_>>();

        let mut report = BootstrapReport::default();
        for (model, handle) in handles {
            match handle.join() {
                Ok(Ok(())) => {
                    log::info!("Model {model} loaded");
                    report.succeeded.push(model.clone());
                }
                Ok(Err(e)) => {
                    log::error!("Failed to load model {model}: {e}");
                    report.failed.push((model.clone(), e.to_string()));
                }
                Err(payload) => {
                    let reason = format!("Loader thread panicked: {}", panic_message(payload.as_ref()));
                    log::error!("Failed to load model {model}: {reason}");
                    report.failed.push((model.clone(), reason));
                }
            }
        }
        report
    })
}
