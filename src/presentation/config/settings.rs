use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::application::services::{OrchestratorConfig, StageTimeouts};
use crate::application::stages::{DEFAULT_MAX_PAGES, RetryPolicy};

use super::Environment;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub inference: InferenceSettings,
    pub pipeline: PipelineSettings,
    pub ingestion: IngestionSettings,
    pub retention: RetentionSettings,
}

impl Settings {
    /// Layers `appsettings.{environment}.toml` and `APP__*` variables over
    /// the built-in defaults.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.as_str())).required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Without a URL jobs are kept in process memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderSetting {
    Memory,
    Local,
    Azure,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub provider: StorageProviderSetting,
    pub azure_account: Option<String>,
    pub azure_access_key: Option<String>,
    pub live: BucketSettings,
    pub archive: BucketSettings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProviderSetting::Local,
            azure_account: None,
            azure_access_key: None,
            live: BucketSettings {
                local_path: "./data/live".to_string(),
                container: None,
            },
            archive: BucketSettings {
                local_path: "./data/archive".to_string(),
                container: None,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketSettings {
    pub local_path: String,
    /// Azure container or S3 bucket name.
    pub container: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceProviderSetting {
    Http,
    Mock,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub provider: InferenceProviderSetting,
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub mock_page_count: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            provider: InferenceProviderSetting::Mock,
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            request_timeout_secs: 120,
            mock_page_count: 3,
        }
    }
}

/// Per-stage limits. An unset `timeout_secs` falls back to the stage's own default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagePolicySettings {
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl StagePolicySettings {
    pub fn timeout_or(&self, stage_default: Duration) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(stage_default)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.max_retries == 0 {
            RetryPolicy::none()
        } else {
            RetryPolicy::exponential(
                self.max_retries,
                Duration::from_millis(self.retry_base_delay_ms),
            )
        }
    }
}

impl Default for StagePolicySettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_retries: 0,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub extract_concurrency: usize,
    pub global_extract_concurrency: Option<usize>,
    pub max_concurrent_jobs: usize,
    pub batch_size: u32,
    /// Largest page count accepted from the classifier.
    pub max_pages: u32,
    pub channel_capacity: usize,
    pub classify: StagePolicySettings,
    pub batch_plan: StagePolicySettings,
    pub extract: StagePolicySettings,
    pub analyze: StagePolicySettings,
    pub act: StagePolicySettings,
}

impl PipelineSettings {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let defaults = StageTimeouts::default();
        OrchestratorConfig {
            extract_concurrency: self.extract_concurrency.max(1),
            global_extract_concurrency: self.global_extract_concurrency,
            timeouts: StageTimeouts {
                classify: self.classify.timeout_or(defaults.classify),
                batch_plan: self.batch_plan.timeout_or(defaults.batch_plan),
                extract: self.extract.timeout_or(defaults.extract),
                analyze: self.analyze.timeout_or(defaults.analyze),
                act: self.act.timeout_or(defaults.act),
            },
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extract_concurrency: 1,
            global_extract_concurrency: None,
            max_concurrent_jobs: 4,
            batch_size: 1,
            max_pages: DEFAULT_MAX_PAGES,
            channel_capacity: 100,
            classify: StagePolicySettings::default(),
            batch_plan: StagePolicySettings::default(),
            extract: StagePolicySettings::default(),
            analyze: StagePolicySettings::default(),
            act: StagePolicySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub dedupe_window_secs: i64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            dedupe_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub enabled: bool,
    pub retention_days: u32,
    pub schedule_hour: u32,
    pub schedule_minute: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 7,
            schedule_hour: 2,
            schedule_minute: 0,
        }
    }
}
