//! Runs inference triggers: quota check, readiness wait, inference, output
//! validation and persistence, with retries and a worker pool on top.
//!
//! All external systems (object storage, run repository, usage metering,
//! schema validation, the engine) are traits handed in at construction.

pub mod bootstrap;
pub mod cancellable;
pub mod config;
pub mod execution;
pub mod pool;
pub mod readiness;
pub mod repository;
pub mod run;
pub mod schema;
pub mod storage;
pub mod trigger;
pub mod usage;


pub use bootstrap::{BootstrapReport, bootstrap_models};
pub use cancellable::{CancellableResult, CancellationToken};
pub use config::{ConfigError, InferlineConfig};
pub use execution::{LocalActivityExecutor, RetryPolicy};
pub use pool::{JobError, TriggerHandle, TriggerPool};
pub use readiness::{PollError, ReadinessPoller};
pub use repository::{FsRunRepository, InMemoryRunRepository, RepositoryError, RunRepository};
pub use run::{ModelRun, RunSource, RunStatus};
pub use schema::{AcceptAllValidator, JsonSchemaValidator, SchemaError, SchemaValidator};
pub use storage::{FsObjectStorage, InMemoryObjectStorage, ObjectStorage, StorageError};
pub use trigger::{
    ActivityError, Collaborators, TriggerActivity, TriggerError, TriggerParams, TriggerResponse,
    output_key,
};
pub use usage::{LocalUsageMeter, NoopUsageMeter, UsageError, UsageMeter, UsageRecord};
