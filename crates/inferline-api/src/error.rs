use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Resource not found")]
    NotFound,
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("Forbidden access")]
    Forbidden,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
    #[error("Engine error {status}: {message}")]
    ApiError { status: StatusCode, message: String },
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("Malformed response body: {0}")]
    MalformedBody(String),
    #[error("Failed to reach engine: {0}")]
    Transport(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Connection-level failures and 5xx answers may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::InternalServerError(_) => true,
            ClientError::ApiError { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ClientError::ApiError {
                status,
                message: error.to_string(),
            },
            None => ClientError::Transport(error.to_string()),
        }
    }
}
