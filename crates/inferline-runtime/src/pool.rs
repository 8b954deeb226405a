use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;
use uuid::Uuid;

use crate::cancellable::CancellationToken;
use crate::execution::LocalActivityExecutor;
use crate::run::ModelRun;
use crate::trigger::{ActivityError, TriggerActivity, TriggerParams};

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error("Worker thread panicked: {0}")]
    ThreadPanicked(String),
    #[error("Trigger pool is shut down")]
    Disconnected,
}

type JobResult = Result<ModelRun, JobError>;
type Outstanding = Arc<Mutex<HashMap<Uuid, CancellationToken>>>;

struct Job {
    params: TriggerParams,
    token: CancellationToken,
    reply: Sender<JobResult>,
}

/// Handle on a submitted trigger.
pub struct TriggerHandle {
    trigger_id: Uuid,
    token: CancellationToken,
    result: Receiver<JobResult>,
}

impl TriggerHandle {
    pub fn trigger_id(&self) -> Uuid {
        self.trigger_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks until the trigger finished.
    pub fn join(self) -> JobResult {
        self.result.recv().unwrap_or(Err(JobError::Disconnected))
    }
}

/// Fixed set of worker threads running triggers from a shared queue.
pub struct TriggerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    outstanding: Outstanding,
}

impl TriggerPool {
    pub fn new(workers: usize, activity: TriggerActivity, executor: LocalActivityExecutor) -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded::<Job>();
        let outstanding = Outstanding::default();

        let workers = (0..workers.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                let activity = activity.clone();
                let executor = executor.clone();
                let outstanding = outstanding.clone();
                thread::Builder::new()
                    .name(format!("trigger-worker-{index}"))
                    .spawn(move || worker_loop(receiver, activity, executor, outstanding))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("Failed to spawn trigger worker: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();
        log::debug!("Trigger pool started with {} workers", workers.len());

        Self {
            sender: Some(sender),
            workers,
            outstanding,
        }
    }

    pub fn submit(
        &self,
        params: TriggerParams,
        token: CancellationToken,
    ) -> Result<TriggerHandle, JobError> {
        let sender = self.sender.as_ref().ok_or(JobError::Disconnected)?;
        let (reply, result) = crossbeam::channel::bounded(1);
        let trigger_id = params.trigger_id;

        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trigger_id, token.clone());
        let job = Job {
            params,
            token: token.clone(),
            reply,
        };
        if sender.send(job).is_err() {
            self.outstanding
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&trigger_id);
            return Err(JobError::Disconnected);
        }

        Ok(TriggerHandle {
            trigger_id,
            token,
            result,
        })
    }

    /// Triggers submitted or running and not yet finished.
    pub fn pending(&self) -> usize {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancels outstanding triggers and waits for the workers to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        drop(sender);

        for token in self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            token.cancel();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Trigger worker exited with a panic");
            }
        }
        log::debug!("Trigger pool stopped");
    }
}

impl Drop for TriggerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    receiver: Receiver<Job>,
    activity: TriggerActivity,
    executor: LocalActivityExecutor,
    outstanding: Outstanding,
) {
    for Job {
        params,
        token,
        reply,
    } in receiver.iter()
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.run_trigger(&activity, &params, &token)
        }));
        let result = match outcome {
            Ok(result) => result.map_err(JobError::from),
            Err(payload) => Err(JobError::ThreadPanicked(format!(
                "Trigger {} panicked: {}",
                params.trigger_id,
                panic_message(payload.as_ref())
            ))),
        };

        outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&params.trigger_id);
        if reply.send(result).is_err() {
            log::debug!("Result of trigger {} was not awaited", params.trigger_id);
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        format!("{payload:?}")
    }
}
