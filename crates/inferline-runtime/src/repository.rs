use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use uuid::Uuid;

use crate::run::{ModelRun, RunStatus};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Run repository I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed run record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Run records, keyed by run id.
pub trait RunRepository: Send + Sync {
    /// Inserts or replaces the record with the same id.
    fn update_run(&self, run: &ModelRun) -> Result<(), RepositoryError>;

    fn get_run(&self, id: Uuid) -> Result<Option<ModelRun>, RepositoryError>;
}

/// One JSON file per run.
#[derive(Debug, Clone)]
pub struct FsRunRepository {
    root: PathBuf,
}

impl FsRunRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl RunRepository for FsRunRepository {
    fn update_run(&self, run: &ModelRun) -> Result<(), RepositoryError> {
        fs::create_dir_all(&self.root)?;
        let path = self.path(run.id);
        let tmp = self.root.join(format!("{}.json.tmp", run.id));

        fs::write(&tmp, serde_json::to_vec_pretty(run)?)?;
        fs::rename(&tmp, &path)?;
        log::debug!("Run {} is now {}", run.id, run.status);
        Ok(())
    }

    fn get_run(&self, id: Uuid) -> Result<Option<ModelRun>, RepositoryError> {
        match fs::read(self.path(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: Mutex<HashMap<Uuid, ModelRun>>,
    history: Mutex<Vec<(Uuid, RunStatus)>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status written, in write order.
    pub fn history(&self) -> Vec<(Uuid, RunStatus)> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RunRepository for InMemoryRunRepository {
    fn update_run(&self, run: &ModelRun) -> Result<(), RepositoryError> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run.id, run.clone());
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((run.id, run.status));
        Ok(())
    }

    fn get_run(&self, id: Uuid) -> Result<Option<ModelRun>, RepositoryError> {
        Ok(self
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}
