use chrono::{DateTime, Utc};
use inferline_core::Task;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Processing,
    Completed,
    Failed,
}

/// Where a trigger came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RunSource {
    #[default]
    Api,
    Console,
}

/// Persisted record of one trigger execution, keyed by the trigger id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub id: Uuid,
    pub model_id: String,
    pub model_version: String,
    pub task: Task,
    pub status: RunStatus,
    pub source: RunSource,
    pub requester_id: String,
    pub hardware: String,
    pub input_reference: String,
    pub output_reference: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<i64>,
}

impl ModelRun {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn complete(&mut self, ended_at: DateTime<Utc>, output_reference: String) {
        self.finish(ended_at, RunStatus::Completed);
        self.output_reference = Some(output_reference);
        self.error = None;
    }

    pub fn fail(&mut self, ended_at: DateTime<Utc>, error: String) {
        self.finish(ended_at, RunStatus::Failed);
        self.error = Some(error);
    }

    fn finish(&mut self, ended_at: DateTime<Utc>, status: RunStatus) {
        self.status = status;
        self.total_duration_ms = Some((ended_at - self.started_at).num_milliseconds());
        self.ended_at = Some(ended_at);
    }
}
