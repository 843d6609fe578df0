//! # Porch API Client
//!
//! HTTP client for a porch task queue server. One client instance carries
//! the traffic of a single pipeline: registration and token minting (admin
//! token), and task submission, claiming and status updates (pipeline
//! token).
//!
//! Transient failures (connection/timeout errors and 5xx responses) are
//! retried with exponential backoff; client errors (4xx) are never retried.

use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{PipelineSpec, TaskEnvelope, TaskStatus, TaskView};
use crate::error::{NotifyError, NotifyResult};

/// Configuration for the porch API client
#[derive(Clone)]
pub struct PorchClientConfig {
    /// Base URL for the porch API (e.g., "<https://porch.example.com:8081>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum retry attempts for transient request failures
    pub max_retries: u32,
    /// Admin token, required for pipeline registration and token minting
    pub admin_token: Option<String>,
    /// Pipeline token, required for task operations
    pub pipeline_token: Option<String>,
    /// Additional root certificate to trust (PEM), for internal CAs
    pub ca_cert_file: Option<PathBuf>,
}

impl Default for PorchClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
            max_retries: 3,
            admin_token: None,
            pipeline_token: None,
            ca_cert_file: None,
        }
    }
}

impl std::fmt::Debug for PorchClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PorchClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "***"))
            .field("pipeline_token", &self.pipeline_token.as_ref().map(|_| "***"))
            .field("ca_cert_file", &self.ca_cert_file)
            .finish()
    }
}

/// Response body returned when minting a pipeline token
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP client for porch task queue operations, bound to one pipeline
pub struct PorchClient {
    client: Client,
    base_url: Url,
    pipeline: PipelineSpec,
    admin_token: Option<String>,
    pipeline_token: Option<String>,
    max_retries: u32,
}

impl std::fmt::Debug for PorchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PorchClient")
            .field("base_url", &self.base_url.as_str())
            .field("pipeline", &self.pipeline.name)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PorchClient {
    /// Create a new porch API client for one pipeline
    ///
    /// Tokens are attached per request rather than as default headers
    /// because admin and task operations authenticate differently.
    pub fn new(config: PorchClientConfig, pipeline: PipelineSpec) -> NotifyResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            NotifyError::config_error(format!("Invalid porch URL '{}': {}", config.base_url, e))
        })?;
        // Endpoint paths are joined relative to the base, so the base path
        // must end with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut client_builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("seqnotify/{}", env!("CARGO_PKG_VERSION")));

        if let Some(ref ca_cert_file) = config.ca_cert_file {
            let pem = std::fs::read(ca_cert_file).map_err(|e| {
                NotifyError::config_error(format!(
                    "Failed to read CA certificate {}: {}",
                    ca_cert_file.display(),
                    e
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                NotifyError::config_error(format!(
                    "Invalid CA certificate {}: {}",
                    ca_cert_file.display(),
                    e
                ))
            })?;
            client_builder = client_builder.add_root_certificate(certificate);
        }

        let client = client_builder.build().map_err(|e| {
            NotifyError::config_error(format!("Failed to create HTTP client: {}", e))
        })?;

        info!(
            base_url = %base_url,
            pipeline = %pipeline.name,
            timeout_ms = config.timeout_ms,
            "Created porch API client"
        );

        Ok(Self {
            client,
            base_url,
            pipeline,
            admin_token: config.admin_token,
            pipeline_token: config.pipeline_token,
            max_retries: config.max_retries,
        })
    }

    /// The pipeline this client is bound to
    pub fn pipeline(&self) -> &PipelineSpec {
        &self.pipeline
    }

    /// Register the pipeline with the porch server
    ///
    /// POST pipelines/
    ///
    /// Needs to be done once per pipeline identity (name, URI, version) and
    /// requires an admin token. Registering an existing pipeline is not an
    /// error; porch answers 409 and the registration stands.
    pub async fn register_pipeline(&self) -> NotifyResult<()> {
        let url = self.endpoint("pipelines/")?;
        let token = self.admin_token()?;

        let response = self
            .send_with_retry("register pipeline", || {
                self.client
                    .post(url.clone())
                    .bearer_auth(token)
                    .json(&self.pipeline)
            })
            .await?;

        match response.status() {
            StatusCode::CONFLICT => {
                warn!(pipeline = %self.pipeline.name, "Pipeline already exists");
                Ok(())
            }
            status if status.is_success() => {
                info!(pipeline = %self.pipeline.name, "Registered pipeline");
                Ok(())
            }
            _ => Err(Self::error_from_response(response, "register pipeline").await),
        }
    }

    /// Mint a new token for the pipeline
    ///
    /// POST pipelines/{name}/token/{description}
    ///
    /// The token is only valid for this pipeline and cannot be obtained
    /// from the server again, so it must be stored securely. Requires an
    /// admin token.
    pub async fn create_token(&self, description: &str) -> NotifyResult<String> {
        let url = self.endpoint(&format!(
            "pipelines/{}/token/{}",
            self.pipeline.name, description
        ))?;
        let token = self.admin_token()?;

        let response = self
            .send_with_retry("create token", || {
                self.client.post(url.clone()).bearer_auth(token)
            })
            .await?;

        let body: TokenResponse = Self::handle_response(response, "create token").await?;
        Ok(body.token)
    }

    /// Add a task for this pipeline, initially PENDING
    ///
    /// POST tasks/
    ///
    /// Idempotent: adding the same input again does not create a duplicate.
    /// Returns true if the task was created, false if it already existed.
    pub async fn add_task<T: Serialize>(&self, task_input: &T) -> NotifyResult<bool> {
        let url = self.endpoint("tasks/")?;
        let token = self.pipeline_token()?;
        let envelope = TaskEnvelope {
            pipeline: &self.pipeline,
            task_input,
            status: TaskStatus::Pending,
        };

        let response = self
            .send_with_retry("add task", || {
                self.client
                    .post(url.clone())
                    .bearer_auth(token)
                    .json(&envelope)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            Ok(true)
        } else if status.is_success() {
            Ok(false)
        } else {
            Err(Self::error_from_response(response, "add task").await)
        }
    }

    /// Claim up to `num_tasks` pending tasks for this pipeline
    ///
    /// POST tasks/claim/?num_tasks={num_tasks}
    ///
    /// Claimed tasks move to CLAIMED and are visible only to this claimant
    /// until their status is updated.
    pub async fn claim_tasks<T: DeserializeOwned>(
        &self,
        num_tasks: u32,
    ) -> NotifyResult<Vec<TaskView<T>>> {
        let mut url = self.endpoint("tasks/claim/")?;
        url.query_pairs_mut()
            .append_pair("num_tasks", &num_tasks.to_string());
        let token = self.pipeline_token()?;

        debug!(num_tasks, pipeline = %self.pipeline.name, "Claiming tasks");

        let response = self
            .send_with_retry("claim tasks", || {
                self.client
                    .post(url.clone())
                    .bearer_auth(token)
                    .json(&self.pipeline)
            })
            .await?;

        let tasks: Vec<TaskView<T>> = Self::handle_response(response, "claim tasks").await?;
        info!(claimed = tasks.len(), pipeline = %self.pipeline.name, "Claimed tasks");
        Ok(tasks)
    }

    /// Report a new status for a task
    ///
    /// PUT tasks/
    ///
    /// The task is identified by its pipeline and serialized input, which
    /// must match the input porch stored when the task was added.
    pub async fn update_task<T: Serialize>(
        &self,
        task_input: &T,
        status: TaskStatus,
    ) -> NotifyResult<()> {
        let url = self.endpoint("tasks/")?;
        let token = self.pipeline_token()?;
        let envelope = TaskEnvelope {
            pipeline: &self.pipeline,
            task_input,
            status,
        };

        let response = self
            .send_with_retry("update task", || {
                self.client
                    .put(url.clone())
                    .bearer_auth(token)
                    .json(&envelope)
            })
            .await?;

        if response.status().is_success() {
            debug!(status = %status, pipeline = %self.pipeline.name, "Updated task status");
            Ok(())
        } else {
            Err(Self::error_from_response(response, "update task").await)
        }
    }

    /// List this pipeline's tasks, optionally filtered by status
    ///
    /// GET tasks/?pipeline_name={name}[&status={status}]
    pub async fn list_tasks<T: DeserializeOwned>(
        &self,
        status: Option<TaskStatus>,
    ) -> NotifyResult<Vec<TaskView<T>>> {
        let mut url = self.endpoint("tasks/")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pipeline_name", &self.pipeline.name);
            if let Some(status) = status {
                query.append_pair("status", &status.to_string());
            }
        }
        let token = self.pipeline_token()?;

        let response = self
            .send_with_retry("list tasks", || {
                self.client.get(url.clone()).bearer_auth(token)
            })
            .await?;

        Self::handle_response(response, "list tasks").await
    }

    fn endpoint(&self, path: &str) -> NotifyResult<Url> {
        self.base_url.join(path).map_err(|e| {
            NotifyError::config_error(format!("Failed to construct URL for '{}': {}", path, e))
        })
    }

    fn admin_token(&self) -> NotifyResult<&str> {
        self.admin_token
            .as_deref()
            .ok_or_else(|| NotifyError::config_error("Porch admin token is not configured"))
    }

    fn pipeline_token(&self) -> NotifyResult<&str> {
        self.pipeline_token
            .as_deref()
            .ok_or_else(|| NotifyError::config_error("Porch pipeline token is not configured"))
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn send_with_retry<F>(&self, operation: &str, build_request: F) -> NotifyResult<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        loop {
            match build_request().send().await {
                Ok(response) => {
                    // Don't retry client errors (4xx) or successes
                    if !response.status().is_server_error() || retries + 1 >= self.max_retries {
                        return Ok(response);
                    }
                    warn!(
                        status = %response.status(),
                        retry = retries + 1,
                        max_retries = self.max_retries,
                        "Porch server error during {}, will retry",
                        operation
                    );
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if retries + 1 >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        error = %e,
                        retry = retries + 1,
                        max_retries = self.max_retries,
                        "Network error during {}, will retry",
                        operation
                    );
                }
                Err(e) => return Err(e.into()),
            }

            retries += 1;
            // Exponential backoff: 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << retries);
            tokio::time::sleep(delay).await;
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        operation: &str,
    ) -> NotifyResult<T> {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                NotifyError::api_error(
                    "porch",
                    status.as_u16(),
                    format!("Failed to parse {} response: {}", operation, e),
                )
            })
        } else {
            Err(Self::error_from_response(response, operation).await)
        }
    }

    async fn error_from_response(response: Response, operation: &str) -> NotifyError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        NotifyError::api_error(
            "porch",
            status.as_u16(),
            format!("{} failed: {}", operation, error_text),
        )
    }
}
