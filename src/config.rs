//! # Notification Service Configuration
//!
//! Configuration management for the seqnotify library and CLI.
//! One TOML file carries every section the producers and consumers need;
//! secrets can be supplied or overridden through `SEQNOTIFY_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{NotifyError, NotifyResult};
use crate::porch::client::PorchClientConfig;
use crate::porch::types::PipelineSpec;

/// Top-level configuration for all notification pipelines
///
/// # Examples
///
/// ```rust
/// use seqnotify::config::NotifyConfig;
///
/// let toml = r#"
/// [porch]
/// url = "https://porch.example.com:8081"
/// pipeline_token = "11111111111111111111111111111111"
///
/// [langqc]
/// url = "https://langqc.example.com"
/// recently_qced_path = "/api/products/qc?weeks=4"
/// well_libraries_path = "/api/pacbio/products/[id_product]/seq_level"
/// run_ui_path = "/ui/run"
///
/// [pacbio]
/// pipeline_uri = "https://gitlab.example.com/seq/seqnotify"
///
/// [ont]
/// pipeline_uri = "https://gitlab.example.com/seq/seqnotify"
///
/// [irods]
/// user_manual_url = "https://confluence.example.com/display/irods"
///
/// [mail]
/// domain = "example.com"
///
/// [mlwh]
/// host = "mlwh-db.example.com"
/// user = "warehouse_ro"
/// schema = "mlwarehouse"
/// "#;
///
/// let config: NotifyConfig = toml::from_str(toml).unwrap();
/// assert_eq!(config.porch.timeout_ms, 10_000);
/// assert_eq!(config.pacbio.pipeline_name, "pacbio-qc-email");
/// assert_eq!(config.mlwh.port, 3306);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Porch task queue API configuration
    pub porch: PorchSection,
    /// LangQC API configuration
    pub langqc: LangQcSection,
    /// PacBio pipeline identity
    pub pacbio: PacBioSection,
    /// ONT pipeline identity
    pub ont: OntSection,
    /// iRODS documentation links used in notification text
    pub irods: IrodsSection,
    /// Email delivery settings
    pub mail: MailSection,
    /// ml warehouse connection settings
    pub mlwh: MlwhSection,
    /// TLS trust settings for the HTTP clients
    #[serde(default)]
    pub ssl: SslSection,
}

/// Porch server connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct PorchSection {
    /// Base URL of the porch server (e.g., "<https://porch.example.com:8081>")
    pub url: String,
    /// Admin token, required only for `register` and `token` operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Pipeline token, required for adding, claiming and updating tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_token: Option<String>,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum retry attempts for transient request failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl fmt::Debug for PorchSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PorchSection")
            .field("url", &self.url)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "***"))
            .field("pipeline_token", &self.pipeline_token.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// LangQC server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LangQcSection {
    /// Base URL of the LangQC server
    pub url: String,
    /// Path returning recently QC-ed products keyed by product ID
    pub recently_qced_path: String,
    /// Path returning library data for one well; the bracketed placeholder
    /// is replaced with the product ID at request time
    pub well_libraries_path: String,
    /// Path of the run page in the LangQC UI, linked from notifications
    pub run_ui_path: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Identity of the PacBio QC notification pipeline registered with porch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacBioSection {
    /// Pipeline name
    #[serde(default = "default_pacbio_pipeline_name")]
    pub pipeline_name: String,
    /// Pipeline URI
    pub pipeline_uri: String,
    /// Pipeline version; defaults to the crate version when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_version: Option<String>,
}

/// Identity of the ONT event notification pipeline registered with porch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntSection {
    /// Pipeline name
    #[serde(default = "default_ont_pipeline_name")]
    pub pipeline_name: String,
    /// Pipeline URI
    pub pipeline_uri: String,
    /// Pipeline version; defaults to the crate version when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_version: Option<String>,
}

/// Links to iRODS documentation included in notification text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrodsSection {
    /// URL of the iRODS user manual
    pub user_manual_url: String,
}

/// Email delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSection {
    /// Network domain; mail is relayed through `mail.<domain>` and sent
    /// from `<user>@<domain>`
    pub domain: String,
}

/// ml warehouse (MySQL) connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct MlwhSection {
    /// Database host
    pub host: String,
    /// Database port
    #[serde(default = "default_mlwh_port")]
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Database schema name
    pub schema: String,
}

impl fmt::Debug for MlwhSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MlwhSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("schema", &self.schema)
            .finish()
    }
}

/// TLS trust settings shared by the porch and LangQC clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SslSection {
    /// PEM file with an additional root certificate to trust, for
    /// deployments behind an internal CA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_pacbio_pipeline_name() -> String {
    "pacbio-qc-email".to_string()
}

fn default_ont_pipeline_name() -> String {
    "ont-event-email".to_string()
}

fn default_mlwh_port() -> u16 {
    3306
}

impl NotifyConfig {
    /// Load configuration from a TOML file and apply environment overrides
    ///
    /// Environment variables take precedence over file values:
    /// `SEQNOTIFY_PORCH_URL`, `SEQNOTIFY_PORCH_ADMIN_TOKEN`,
    /// `SEQNOTIFY_PORCH_PIPELINE_TOKEN` and `SEQNOTIFY_MLWH_PASSWORD`.
    pub fn load_from_file(path: &Path) -> NotifyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| {
            NotifyError::config_error(format!("Failed to parse config file: {}", e))
        })?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> NotifyResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NotifyError::config_error(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| NotifyError::config_error(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            NotifyError::config_error(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SEQNOTIFY_PORCH_URL") {
            self.porch.url = url;
        }
        if let Ok(token) = std::env::var("SEQNOTIFY_PORCH_ADMIN_TOKEN") {
            self.porch.admin_token = Some(token);
        }
        if let Ok(token) = std::env::var("SEQNOTIFY_PORCH_PIPELINE_TOKEN") {
            self.porch.pipeline_token = Some(token);
        }
        if let Ok(password) = std::env::var("SEQNOTIFY_MLWH_PASSWORD") {
            self.mlwh.password = Some(password);
        }
    }

    /// Build the porch client configuration from the relevant sections
    pub fn porch_client_config(&self) -> PorchClientConfig {
        PorchClientConfig {
            base_url: self.porch.url.clone(),
            timeout_ms: self.porch.timeout_ms,
            max_retries: self.porch.max_retries,
            admin_token: self.porch.admin_token.clone(),
            pipeline_token: self.porch.pipeline_token.clone(),
            ca_cert_file: self.ssl.ca_cert_file.clone(),
        }
    }

    /// Identity of the PacBio QC notification pipeline
    pub fn pacbio_pipeline(&self) -> PipelineSpec {
        PipelineSpec {
            name: self.pacbio.pipeline_name.clone(),
            uri: self.pacbio.pipeline_uri.clone(),
            version: self
                .pacbio
                .pipeline_version
                .clone()
                .unwrap_or_else(|| crate::version().to_string()),
        }
    }

    /// Identity of the ONT event notification pipeline
    pub fn ont_pipeline(&self) -> PipelineSpec {
        PipelineSpec {
            name: self.ont.pipeline_name.clone(),
            uri: self.ont.pipeline_uri.clone(),
            version: self
                .ont
                .pipeline_version
                .clone()
                .unwrap_or_else(|| crate::version().to_string()),
        }
    }
}
