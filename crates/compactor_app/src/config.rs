//! Read-only settings for the compactor CLI.
//!
//! Loaded from `compactor.ron` in the working directory (or `--config`),
//! then overridden by the environment and command-line flags. Settings are
//! never written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use compactor_engine::{ClientSettings, Credential, OrchestratorSettings};
use compactor_logging::{compactor_debug, compactor_info};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "compactor.ron";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorSettings {
    pub chunk_size_tokens: u32,
    pub poll_interval_ms: u64,
    pub output_dir: PathBuf,
    /// Lowest-priority key source; the environment and `--api-key` win.
    pub api_key: Option<String>,
    /// Cap on simultaneous compression calls; unset means all at once.
    pub max_in_flight: Option<usize>,
    pub api: ApiSettings,
}

impl Default for CompactorSettings {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 5000,
            poll_interval_ms: 250,
            output_dir: PathBuf::from("./output"),
            api_key: None,
            max_in_flight: None,
            api: ApiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
    pub max_output_tokens: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            endpoint: client.endpoint,
            model: client.model,
            api_version: client.api_version,
            max_output_tokens: client.max_output_tokens,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
        }
    }
}

impl CompactorSettings {
    /// Loads settings from `explicit`, or from `compactor.ron` when present.
    /// An explicit path that cannot be read is an error; a missing default
    /// file just means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILENAME);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    compactor_debug!("no {} found, using defaults", DEFAULT_CONFIG_FILENAME);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Self = ron::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        compactor_info!("loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoint: self.api.endpoint.clone(),
            model: self.api.model.clone(),
            api_version: self.api.api_version.clone(),
            max_output_tokens: self.api.max_output_tokens,
            connect_timeout: Duration::from_secs(self.api.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_in_flight: self.max_in_flight,
            ..OrchestratorSettings::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Resolves the credential: command line, then `ANTHROPIC_API_KEY`,
    /// then the settings file. Blank values are skipped.
    pub fn credential(&self, cli_key: Option<&str>) -> Option<Credential> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        self.credential_from(cli_key, env_key.as_deref())
    }

    fn credential_from(&self, cli_key: Option<&str>, env_key: Option<&str>) -> Option<Credential> {
        [cli_key, env_key, self.api_key.as_deref()]
            .into_iter()
            .flatten()
            .find_map(Credential::new)
    }
}
