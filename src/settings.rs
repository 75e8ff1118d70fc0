use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::RollbackPolicy;
use crate::gateway::HttpGatewayConfig;
use crate::notification::NotificationBackend;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
const MIN_NOTIFICATION_DURATION_MS: u32 = 500;
const MAX_NOTIFICATION_DURATION_MS: u32 = 30_000;
const DEFAULT_NOTIFICATION_DURATION_MS: u32 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    /// `0` disables the per-request timeout.
    pub request_timeout_ms: u64,
    pub rollback_policy: String,
    pub notification_backend: String,
    pub notification_duration_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 0,
            rollback_policy: RollbackPolicy::default().as_str().to_string(),
            notification_backend: NotificationBackend::default().as_str().to_string(),
            notification_duration_ms: DEFAULT_NOTIFICATION_DURATION_MS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("kanban-sync");
        path.push("settings.toml");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut settings) => {
                    settings.validate();
                    settings
                }
                Err(error) => {
                    warn!(
                        "failed to parse settings config '{}': {}",
                        path.display(),
                        error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                warn!(
                    "failed to read settings config '{}': {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("unable to determine config path"))?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("invalid settings config path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory '{}'", parent.display()))?;

        let mut validated = self.clone();
        validated.validate();
        let contents =
            toml::to_string_pretty(&validated).context("failed to serialize settings to TOML")?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("invalid settings config file name"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary settings file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to atomically rename settings file '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Applies a `--base-url` flag on top of the file value.
    pub fn with_base_url_override(mut self, base_url: Option<&str>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.to_string();
            self.validate();
        }
        self
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        RollbackPolicy::from_str(&self.rollback_policy).unwrap_or_default()
    }

    pub fn notification_backend(&self) -> NotificationBackend {
        NotificationBackend::from_settings_value(&self.notification_backend).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            base_url: self.base_url.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    fn validate(&mut self) {
        let base_url = self.base_url.trim().trim_end_matches('/');
        self.base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.to_string()
        } else {
            warn!(
                "invalid base_url '{}' in settings config; falling back to {}",
                self.base_url, DEFAULT_BASE_URL
            );
            DEFAULT_BASE_URL.to_string()
        };

        if self.request_timeout_ms > 0 {
            self.request_timeout_ms = self
                .request_timeout_ms
                .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);
        }
        self.notification_duration_ms = self
            .notification_duration_ms
            .clamp(MIN_NOTIFICATION_DURATION_MS, MAX_NOTIFICATION_DURATION_MS);

        self.rollback_policy = match RollbackPolicy::from_str(&self.rollback_policy) {
            Ok(policy) => policy.as_str().to_string(),
            Err(()) => {
                warn!(
                    "invalid rollback_policy '{}' in settings config; falling back to {}",
                    self.rollback_policy,
                    RollbackPolicy::default().as_str()
                );
                RollbackPolicy::default().as_str().to_string()
            }
        };

        self.notification_backend =
            match NotificationBackend::from_settings_value(&self.notification_backend) {
                Some(backend) => backend.as_str().to_string(),
                None => {
                    warn!(
                        "invalid notification_backend '{}' in settings config; falling back to {}",
                        self.notification_backend,
                        NotificationBackend::default().as_str()
                    );
                    NotificationBackend::default().as_str().to_string()
                }
            };
    }
}
