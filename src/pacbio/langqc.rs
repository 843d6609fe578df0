//! # LangQC API Client
//!
//! HTTP client for the LangQC service, which tracks manual QC of PacBio
//! wells. The notification producer asks it for recently QC-ed products;
//! the consumer asks it for the library content of one well.

use regex::{NoExpand, Regex};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::LangQcSection;
use crate::error::{NotifyError, NotifyResult};

/// A QC state change for one product, as reported by LangQC
///
/// The whole object is the porch task input, so only the fields the flows
/// read are typed; everything else is kept verbatim in `extra` and travels
/// with the task unchanged. This keeps a task's identity stable even when
/// LangQC grows new fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcState {
    /// Product identifier (a PacBio well)
    pub id_product: String,
    /// Human-readable QC state (e.g., "Passed With Distinction")
    pub qc_state: String,
    /// Final outcome; true passed, false failed, null undefined
    pub outcome: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One library (sample) in a well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub study_id: String,
    pub study_name: String,
    pub sample_name: String,
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub tag_sequence: Vec<String>,
    #[serde(default)]
    pub library_type: Option<String>,
    #[serde(default)]
    pub pool_name: Option<String>,
}

/// Library content and identity of one PacBio well
#[derive(Debug, Clone, Deserialize)]
pub struct WellLibraries {
    pub id_product: String,
    pub run_name: String,
    pub label: String,
    #[serde(default)]
    pub plate_number: Option<i64>,
    pub libraries: Vec<Library>,
}

/// HTTP client for LangQC queries
#[derive(Debug)]
pub struct LangQcClient {
    client: Client,
    recently_qced_url: Url,
    well_libraries_path: String,
    placeholder: Regex,
    base_url: Url,
    run_ui_url: String,
}

impl LangQcClient {
    /// Create a new LangQC client
    ///
    /// URL construction errors surface here rather than at request time,
    /// so a consumer can validate its configuration before claiming work.
    pub fn new(config: &LangQcSection, ca_cert_file: Option<&Path>) -> NotifyResult<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            NotifyError::config_error(format!("Invalid LangQC URL '{}': {}", config.url, e))
        })?;

        let recently_qced_url = base_url.join(&config.recently_qced_path).map_err(|e| {
            NotifyError::config_error(format!(
                "Invalid recently QC-ed path '{}': {}",
                config.recently_qced_path, e
            ))
        })?;

        let run_ui_url = base_url
            .join(&config.run_ui_path)
            .map_err(|e| {
                NotifyError::config_error(format!(
                    "Invalid run UI path '{}': {}",
                    config.run_ui_path, e
                ))
            })?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        // The placeholder in the well libraries path, e.g. [id_product].
        let placeholder = Regex::new(r"\[\w+\]")
            .map_err(|e| NotifyError::config_error(format!("Invalid placeholder regex: {}", e)))?;
        if !placeholder.is_match(&config.well_libraries_path) {
            return Err(NotifyError::config_error(format!(
                "Well libraries path '{}' has no product ID placeholder",
                config.well_libraries_path
            )));
        }

        let mut client_builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("seqnotify/{}", env!("CARGO_PKG_VERSION")));

        if let Some(ca_cert_file) = ca_cert_file {
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

        Ok(Self {
            client,
            recently_qced_url,
            well_libraries_path: config.well_libraries_path.clone(),
            placeholder,
            base_url,
            run_ui_url,
        })
    }

    /// URL of the run page in the LangQC UI, linked from notification text
    pub fn run_ui_url(&self) -> &str {
        &self.run_ui_url
    }

    /// Fetch recently assigned final QC states, keyed by product ID
    ///
    /// A product is expected to carry exactly one state because the query
    /// is limited to sequencing-type QC.
    pub async fn recently_qced(&self) -> NotifyResult<HashMap<String, Vec<QcState>>> {
        debug!("Getting recent QC states from: {}", self.recently_qced_url);
        let response = self
            .client
            .get(self.recently_qced_url.clone())
            .send()
            .await?;
        Self::handle_response(response, "recently QC-ed products").await
    }

    /// Fetch the library content of one well
    pub async fn well_libraries(&self, id_product: &str) -> NotifyResult<WellLibraries> {
        let url = self.well_libraries_url(id_product)?;
        debug!("Getting well libraries from: {}", url);
        let response = self.client.get(url).send().await?;
        Self::handle_response(response, "well libraries").await
    }

    fn well_libraries_url(&self, id_product: &str) -> NotifyResult<Url> {
        let path = self
            .placeholder
            .replace(&self.well_libraries_path, NoExpand(id_product));
        self.base_url.join(&path).map_err(|e| {
            NotifyError::config_error(format!("Invalid well libraries path '{}': {}", path, e))
        })
    }

    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        operation: &str,
    ) -> NotifyResult<T> {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                NotifyError::api_error(
                    "langqc",
                    status.as_u16(),
                    format!("Failed to parse {} response: {}", operation, e),
                )
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(NotifyError::api_error(
                "langqc",
                status.as_u16(),
                format!("{} request failed: {}", operation, error_text),
            ))
        }
    }
}
