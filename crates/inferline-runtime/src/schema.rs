use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use inferline_core::Task;
use serde_json::Value;
use strum::IntoEnumIterator;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Output does not match the {task} schema: {}", errors.join("; "))]
    Invalid { task: Task, errors: Vec<String> },
    #[error("Failed to load schema {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("Invalid {task} schema: {reason}")]
    Compile { task: Task, reason: String },
}

/// Checks one serialized output item against the schema declared for its task.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, task: Task, item: &Value) -> Result<(), SchemaError>;
}

/// Per-task JSON schemas. Tasks without a schema accept anything.
#[derive(Default)]
pub struct JsonSchemaValidator {
    schemas: HashMap<Task, jsonschema::Validator>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `<task>.json` files (lowercase task name) from a directory.
    pub fn from_dir(dir: &Path) -> Result<Self, SchemaError> {
        let mut validator = Self::new();
        for task in Task::iter() {
            let path = dir.join(format!("{}.json", task.to_string().to_lowercase()));
            let raw = match fs::read(&path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SchemaError::Load {
                        path,
                        reason: e.to_string(),
                    });
                }
            };
            let schema: Value = serde_json::from_slice(&raw).map_err(|e| SchemaError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            validator = validator.with_schema(task, &schema)?;
            log::debug!("Loaded {task} output schema from {}", path.display());
        }
        Ok(validator)
    }

    pub fn with_schema(mut self, task: Task, schema: &Value) -> Result<Self, SchemaError> {
        let compiled = jsonschema::validator_for(schema).map_err(|e| SchemaError::Compile {
            task,
            reason: e.to_string(),
        })?;
        self.schemas.insert(task, compiled);
        Ok(self)
    }

    pub fn has_schema(&self, task: Task) -> bool {
        self.schemas.contains_key(&task)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, task: Task, item: &Value) -> Result<(), SchemaError> {
        let Some(schema) = self.schemas.get(&task) else {
            return Ok(());
        };

        let errors: Vec<String> = schema.iter_errors(item).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid { task, errors })
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllValidator;

impl SchemaValidator for AcceptAllValidator {
    fn validate(&self, _task: Task, _item: &Value) -> Result<(), SchemaError> {
        Ok(())
    }
}
