use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::ports::MappingAssistantPort;
use crate::config::AssistantConfig;
use crate::domain::TargetField;
use crate::error::{ImportError, Result};

/// JSON-over-HTTP client for the conversational column-mapping assistant.
/// Strictly best-effort: every failure mode maps to `AssistantUnavailable`
/// so callers fall back to the heuristic mapper.
pub struct HttpMappingAssistant {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SuggestRequest<'a> {
    columns: &'a [String],
    sample_rows: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    mapping: Vec<SuggestedPair>,
}

#[derive(Debug, Deserialize)]
struct SuggestedPair {
    column: String,
    field: TargetField,
}

impl HttpMappingAssistant {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(ImportError::AssistantUnavailable(
                "no assistant endpoint configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl MappingAssistantPort for HttpMappingAssistant {
    async fn suggest(
        &self,
        columns: &[String],
        sample_rows: &[Vec<String>],
    ) -> Result<Vec<(String, TargetField)>> {
        let request = SuggestRequest {
            columns,
            sample_rows,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ImportError::AssistantUnavailable(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(ImportError::AssistantUnavailable(
                "assistant rate limited".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(ImportError::AssistantUnavailable(format!(
                "assistant returned status {}",
                response.status()
            )));
        }

        let body: SuggestResponse = response
            .json()
            .await
            .map_err(|e| ImportError::AssistantUnavailable(e.to_string()))?;

        debug!("Assistant suggested {} column mappings", body.mapping.len());
        Ok(body
            .mapping
            .into_iter()
            .map(|pair| (pair.column, pair.field))
            .collect())
    }
}
