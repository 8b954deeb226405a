use std::time::Duration;

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::binary::{self, INFERENCE_HEADER_CONTENT_LENGTH};
use crate::engine::InferenceEngine;
use crate::error::ClientError;
use crate::schemas::{
    InferRequest, InferResponse, ModelConfig, ModelMetadata, ModelReadiness,
    ServeApplicationsSchema,
};

#[derive(Deserialize)]
struct EngineErrorBody {
    error: String,
}

trait ResponseExt {
    fn map_to_engine_err(self) -> Result<reqwest::blocking::Response, ClientError>;
}

impl ResponseExt for reqwest::blocking::Response {
    fn map_to_engine_err(self) -> Result<reqwest::blocking::Response, ClientError> {
        if self.status().is_success() {
            return Ok(self);
        }

        let status = self.status();
        match status {
            reqwest::StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            reqwest::StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            reqwest::StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
            _ => {
                let text = self.text().map_err(|e| ClientError::Transport(e.to_string()))?;
                let message = serde_json::from_str::<EngineErrorBody>(&text)
                    .map(|body| body.error)
                    .unwrap_or(text);
                if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
                    Err(ClientError::InternalServerError(message))
                } else {
                    Err(ClientError::ApiError { status, message })
                }
            }
        }
    }
}

/// Blocking HTTP client for a KServe v2 inference engine.
///
/// Holds a single connection pool; clone it or share it behind an `Arc`
/// rather than building one per request.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http_client: reqwest::blocking::Client,
    base_url: Url,
    serve_url: Option<Url>,
}

impl EngineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(EngineClient {
            http_client,
            base_url: parse_base_url(base_url)?,
            serve_url: None,
        })
    }

    /// Read deployment readiness from a serve controller instead of the engine's ready endpoint.
    pub fn with_serve_endpoint(mut self, serve_url: &str) -> Result<Self, ClientError> {
        self.serve_url = Some(parse_base_url(serve_url)?);
        Ok(self)
    }

    /// Check if the engine is reachable and live.
    pub fn health_check(&self) -> Result<(), ClientError> {
        let url = self.join(&self.base_url, "v2/health/live")?;
        self.http_client.get(url).send()?.map_to_engine_err()?;
        Ok(())
    }

    fn join(&self, base: &Url, path: &str) -> Result<Url, ClientError> {
        base.join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{base}{path}: {e}")))
    }

    fn get_json<R>(&self, path: &str) -> Result<R, ClientError>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        let url = self.join(&self.base_url, path)?;
        let response = self.http_client.get(url).send()?.map_to_engine_err()?;
        Ok(response.json::<R>()?)
    }

    fn serve_readiness(&self, serve_url: &Url, model: &str) -> Result<ModelReadiness, ClientError> {
        let url = self.join(serve_url, "api/serve/applications/")?;
        let applications = self
            .http_client
            .get(url)
            .send()?
            .map_to_engine_err()?
            .json::<ServeApplicationsSchema>()?;
        Ok(applications.readiness(model))
    }

    fn engine_readiness(&self, model: &str, version: &str) -> Result<ModelReadiness, ClientError> {
        let url = self.join(&self.base_url, &format!("{}/ready", model_path(model, version)))?;
        let response = self.http_client.get(url).send()?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::BAD_REQUEST => {
                Ok(ModelReadiness::offline())
            }
            _ => {
                response.map_to_engine_err()?;
                Ok(ModelReadiness::active(1))
            }
        }
    }
}

fn parse_base_url(url: &str) -> Result<Url, ClientError> {
    let normalized = if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    };
    Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))
}

fn model_path(model: &str, version: &str) -> String {
    if version.is_empty() {
        format!("v2/models/{model}")
    } else {
        format!("v2/models/{model}/versions/{version}")
    }
}

impl InferenceEngine for EngineClient {
    fn model_metadata(&self, model: &str, version: &str) -> Result<ModelMetadata, ClientError> {
        self.get_json(&model_path(model, version))
    }

    fn model_config(&self, model: &str, version: &str) -> Result<Option<ModelConfig>, ClientError> {
        match self.get_json(&format!("{}/config", model_path(model, version))) {
            Ok(config) => Ok(Some(config)),
            Err(ClientError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn infer(&self, request: &InferRequest) -> Result<InferResponse, ClientError> {
        let url = self.join(
            &self.base_url,
            &format!(
                "{}/infer",
                model_path(&request.model_name, &request.model_version)
            ),
        )?;
        let encoded = binary::encode_request(request)?;

        log::debug!(
            "Sending inference request to {url} ({} bytes, {} inputs)",
            encoded.body.len(),
            request.inputs.len()
        );

        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(
                INFERENCE_HEADER_CONTENT_LENGTH,
                encoded.header_length.to_string(),
            )
            .body(encoded.body)
            .send()?
            .map_to_engine_err()?;

        let header_length = response
            .headers()
            .get(INFERENCE_HEADER_CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        let body = response.bytes()?;

        binary::decode_response(&body, header_length)
    }

    fn model_readiness(&self, model: &str, version: &str) -> Result<ModelReadiness, ClientError> {
        match &self.serve_url {
            Some(serve_url) => self.serve_readiness(serve_url, model),
            None => self.engine_readiness(model, version),
        }
    }

    fn load_model(&self, model: &str) -> Result<(), ClientError> {
        let url = self.join(&self.base_url, &format!("v2/repository/models/{model}/load"))?;
        self.http_client.post(url).send()?.map_to_engine_err()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("yolo", ""), "v2/models/yolo");
        assert_eq!(model_path("yolo", "3"), "v2/models/yolo/versions/3");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = EngineClient::new("http://localhost:8000/engine", Duration::from_secs(1)).unwrap();
        let url = client.join(&client.base_url, &model_path("yolo", "1")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/engine/v2/models/yolo/versions/1");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            EngineClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
