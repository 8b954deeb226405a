//! Blob storage for trigger inputs and outputs.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

pub const APPLICATION_JSON: &str = "application/json";
const MIME_SUFFIX: &str = ".mime";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object '{0}' not found")]
    NotFound(String),
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),
    #[error("Storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

pub trait ObjectStorage: Send + Sync {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Stores `data` under `key`, replacing any previous object.
    fn put_object(&self, key: &str, data: &[u8], content_type: &str)
    -> Result<ObjectInfo, StorageError>;
}

/// Objects stored as files below a root directory.
///
/// The content type lives next to each object in a `<name>.mime` file.
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(MIME_SUFFIX)
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn content_type(&self, key: &str) -> Result<String, StorageError> {
        let path = self.path(key)?;
        fs::read_to_string(mime_path(&path)).map_err(|e| io_error(key, e))
    }
}

fn mime_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(MIME_SUFFIX);
    PathBuf::from(name)
}

fn io_error(key: &str, source: io::Error) -> StorageError {
    if source.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl ObjectStorage for FsObjectStorage {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(key)?;
        fs::read(path).map_err(|e| io_error(key, e))
    }

    fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<ObjectInfo, StorageError> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(key, e))?;
        }
        fs::write(&path, data).map_err(|e| io_error(key, e))?;
        fs::write(mime_path(&path), content_type).map_err(|e| io_error(key, e))?;
        log::debug!("Stored {} bytes at {}", data.len(), path.display());

        Ok(ObjectInfo {
            key: key.to_string(),
            size: data.len(),
            content_type: content_type.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<ObjectInfo, StorageError> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (data.to_vec(), content_type.to_string()));

        Ok(ObjectInfo {
            key: key.to_string(),
            size: data.len(),
            content_type: content_type.to_string(),
        })
    }
}
