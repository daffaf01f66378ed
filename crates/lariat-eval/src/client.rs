//! REST client for a LangSmith-compatible tracing and evaluation backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default backend endpoint
pub const DEFAULT_API_URL: &str = "https://api.smith.langchain.com";

/// Environment variable holding the backend API key
pub const API_KEY_ENV: &str = "LANGSMITH_API_KEY";

/// Environment variable overriding the backend endpoint
pub const API_URL_ENV: &str = "LANGSMITH_API_URL";

/// A dataset in the backend
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A dataset example
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub id: Uuid,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub outputs: Value,
}

/// Thin REST client. Endpoints follow the LangSmith v1 API.
pub struct EvalClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl EvalClient {
    /// Create a client against an explicit endpoint
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Create a client from `LANGSMITH_API_URL` / `LANGSMITH_API_KEY`
    pub fn from_env() -> Self {
        let api_url =
            std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::new(api_url, api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.api_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }

    /// Look up a dataset by name. Returns `None` when it does not exist.
    pub async fn read_dataset(&self, name: &str) -> Result<Option<Dataset>> {
        let response = self
            .http
            .get(self.url("/datasets"))
            .header("x-api-key", &self.api_key)
            .query(&[("name", name)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut datasets: Vec<Dataset> = response.json().await?;
        Ok(if datasets.is_empty() {
            None
        } else {
            Some(datasets.remove(0))
        })
    }

    /// Create a dataset
    pub async fn create_dataset(&self, name: &str, description: &str) -> Result<Dataset> {
        let response = self
            .http
            .post(self.url("/datasets"))
            .header("x-api-key", &self.api_key)
            .json(&json!({"name": name, "description": description}))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// List all examples in a dataset
    pub async fn list_examples(&self, dataset_id: Uuid) -> Result<Vec<Example>> {
        let response = self
            .http
            .get(self.url("/examples"))
            .header("x-api-key", &self.api_key)
            .query(&[("dataset", dataset_id.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Add an example to a dataset
    pub async fn create_example(
        &self,
        dataset_id: Uuid,
        inputs: &Value,
        outputs: &Value,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.url("/examples"))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "dataset_id": dataset_id,
                "inputs": inputs,
                "outputs": outputs,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Delete an example
    pub async fn delete_example(&self, example_id: Uuid) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/examples/{}", example_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Record a completed run so feedback has something to attach to
    #[allow(clippy::too_many_arguments)]
    pub async fn create_run(
        &self,
        run_id: Uuid,
        name: &str,
        session_name: &str,
        inputs: &Value,
        outputs: &Value,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.url("/runs"))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "id": run_id,
                "name": name,
                "run_type": "chain",
                "session_name": session_name,
                "inputs": inputs,
                "outputs": outputs,
                "start_time": start_time.to_rfc3339(),
                "end_time": end_time.to_rfc3339(),
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Attach evaluator feedback to a run
    pub async fn create_feedback(
        &self,
        run_id: Uuid,
        key: &str,
        score: f64,
        comment: Option<&str>,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.url("/feedback"))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "run_id": run_id,
                "key": key,
                "score": score,
                "comment": comment,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = EvalClient::new("https://api.example.com/", "key");
        assert_eq!(
            client.url("/datasets"),
            "https://api.example.com/api/v1/datasets"
        );
    }

    #[test]
    fn test_example_parses_with_missing_outputs() {
        let example: Example = serde_json::from_value(json!({
            "id": "6f1c2a4e-0000-0000-0000-000000000001",
            "inputs": {"question": "q"}
        }))
        .unwrap();
        assert_eq!(example.inputs["question"], "q");
        assert!(example.outputs.is_null());
    }
}
