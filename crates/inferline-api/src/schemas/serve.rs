use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use derive_new::new;
use serde::Deserialize;

/// Status of a serve application. Statuses this client does not know keep their raw value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ApplicationStatus {
    NotStarted,
    Deploying,
    DeployFailed,
    Running,
    Unhealthy,
    Deleting,
    Unknown(String),
}

impl From<String> for ApplicationStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "NOT_STARTED" => ApplicationStatus::NotStarted,
            "DEPLOYING" => ApplicationStatus::Deploying,
            "DEPLOY_FAILED" => ApplicationStatus::DeployFailed,
            "RUNNING" => ApplicationStatus::Running,
            "UNHEALTHY" => ApplicationStatus::Unhealthy,
            "DELETING" => ApplicationStatus::Deleting,
            _ => ApplicationStatus::Unknown(status),
        }
    }
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ApplicationStatus::NotStarted => "NOT_STARTED",
            ApplicationStatus::Deploying => "DEPLOYING",
            ApplicationStatus::DeployFailed => "DEPLOY_FAILED",
            ApplicationStatus::Running => "RUNNING",
            ApplicationStatus::Unhealthy => "UNHEALTHY",
            ApplicationStatus::Deleting => "DELETING",
            ApplicationStatus::Unknown(status) => status,
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Updating,
    Healthy,
    Unhealthy,
    Upscaling,
    Downscaling,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicaState {
    Starting,
    Updating,
    Recovering,
    Running,
    Stopping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaSchema {
    pub state: ReplicaState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSchema {
    pub status: DeploymentStatus,
    #[serde(default)]
    pub replicas: Vec<ReplicaSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServeApplicationSchema {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub deployments: HashMap<String, DeploymentSchema>,
}

/// `GET api/serve/applications/` response of the serve controller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServeApplicationsSchema {
    #[serde(default)]
    pub applications: HashMap<String, ServeApplicationSchema>,
}

/// Deployment lifecycle stage of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Offline,
    Starting,
    ScalingUp,
    Active,
    Unknown(String),
}

impl Display for ReadinessState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessState::Offline => write!(f, "OFFLINE"),
            ReadinessState::Starting => write!(f, "STARTING"),
            ReadinessState::ScalingUp => write!(f, "SCALING_UP"),
            ReadinessState::Active => write!(f, "ACTIVE"),
            ReadinessState::Unknown(state) => write!(f, "{state}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct ModelReadiness {
    pub state: ReadinessState,
    pub active_replicas: u32,
}

impl ModelReadiness {
    pub fn offline() -> Self {
        Self::new(ReadinessState::Offline, 0)
    }

    pub fn active(replicas: u32) -> Self {
        Self::new(ReadinessState::Active, replicas)
    }

    /// Active with at least one replica able to take requests.
    pub fn is_servable(&self) -> bool {
        self.state == ReadinessState::Active && self.active_replicas > 0
    }
}

impl Display for ModelReadiness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} active replicas)", self.state, self.active_replicas)
    }
}

impl ServeApplicationSchema {
    fn is_upscaling(&self) -> bool {
        self.deployments
            .values()
            .any(|deployment| deployment.status == DeploymentStatus::Upscaling)
    }

    fn running_replicas(&self) -> u32 {
        let running = self
            .deployments
            .values()
            .flat_map(|deployment| deployment.replicas.iter())
            .filter(|replica| replica.state == ReplicaState::Running)
            .count();
        u32::try_from(running).unwrap_or(u32::MAX)
    }

    pub fn readiness(&self) -> ModelReadiness {
        let replicas = self.running_replicas();
        match &self.status {
            ApplicationStatus::NotStarted => ModelReadiness::offline(),
            ApplicationStatus::Deploying | ApplicationStatus::Running if self.is_upscaling() => {
                ModelReadiness::new(ReadinessState::ScalingUp, replicas)
            }
            ApplicationStatus::Deploying => ModelReadiness::new(ReadinessState::Starting, replicas),
            ApplicationStatus::Running => ModelReadiness::active(replicas),
            status => ModelReadiness::new(ReadinessState::Unknown(status.to_string()), replicas),
        }
    }
}

impl ServeApplicationsSchema {
    /// Readiness of one application. An application the controller does not know is offline.
    pub fn readiness(&self, application: &str) -> ModelReadiness {
        self.applications
            .get(application)
            .map(ServeApplicationSchema::readiness)
            .unwrap_or_else(ModelReadiness::offline)
    }
}
