//! HTTP implementation of the extraction pipeline interface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{
    ExistingDocument, ExtractionPipeline, PipelineError, ProcessingStatus, RegistrationRequest,
};

/// Configuration for the pipeline API client.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the extraction pipeline's registration API.
pub struct HttpPipeline {
    client: Client,
    config: PipelineConfig,
}

impl HttpPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl ExtractionPipeline for HttpPipeline {
    async fn find_document(
        &self,
        case_number: &str,
        normalized: &str,
    ) -> Result<Option<ExistingDocument>, PipelineError> {
        let response = self
            .client
            .get(self.url("/api/documents/lookup"))
            .bearer_auth(&self.config.api_key)
            .query(&[("case", case_number), ("normalized", normalized)])
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PipelineError::Api {
                status: response.status().as_u16(),
                message: "lookup failed".to_string(),
            });
        }

        let body: Value = response.json().await?;
        let Some(id) = body.get("id").and_then(Value::as_str) else {
            return Ok(None);
        };
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .and_then(ProcessingStatus::from_str)
            .unwrap_or(ProcessingStatus::Pending);
        Ok(Some(ExistingDocument {
            id: id.to_string(),
            status,
        }))
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(self.url("/api/documents"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::Api { status, message });
        }

        let body: Value = response.json().await?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::Malformed("registration response missing id".to_string()))?;
        debug!(document_id = id, key = %request.storage_key, "document registered");
        Ok(id.to_string())
    }

    async fn document_status(
        &self,
        document_id: &str,
    ) -> Result<ProcessingStatus, PipelineError> {
        let response = self
            .client
            .get(self.url(&format!(
                "/api/documents/{}/status",
                urlencoding::encode(document_id)
            )))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Api {
                status: response.status().as_u16(),
                message: "status lookup failed".to_string(),
            });
        }

        let body: Value = response.json().await?;
        body.get("status")
            .and_then(Value::as_str)
            .and_then(ProcessingStatus::from_str)
            .ok_or_else(|| PipelineError::Malformed("unrecognized status value".to_string()))
    }
}
