//! Application configuration.
//!
//! An optional JSON file provides the base values; `ACEUP_*` environment
//! variables override them. Every field has a default so an empty file (or no
//! file at all) is a valid local-only configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::manager::SyncConfig;
use crate::repository::RepositoryConfig;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_LIGHT_SYNC_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONFLICT_LOG_LIMIT: usize = 100;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

/// Runtime configuration shared by every front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    /// Where the local store keeps its documents
    pub data_dir: Option<PathBuf>,
    /// REST document API; `None` runs local-only
    pub remote_base_url: Option<String>,
    /// Analytics backend receiving `POST /api/events`
    pub analytics_base_url: Option<String>,
    /// Reachability probe target; defaults to the analytics `/api/health`
    pub health_check_url: Option<String>,
    pub light_sync_interval_secs: u64,
    pub remote_timeout_secs: u64,
    pub conflict_log_limit: usize,
    pub probe_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            remote_base_url: None,
            analytics_base_url: None,
            health_check_url: None,
            light_sync_interval_secs: DEFAULT_LIGHT_SYNC_INTERVAL_SECS,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            conflict_log_limit: DEFAULT_CONFLICT_LOG_LIMIT,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    /// Load `path` (if given), apply environment overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|error| {
                    Error::Config(format!("failed to read {}: {error}", path.display()))
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        config
            .with_overrides(|name| std::env::var(name).ok())?
            .validated()
    }

    /// Parse a JSON document. Unknown fields are rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|error| Error::Config(format!("invalid config: {error}")))
    }

    /// Apply `ACEUP_*` overrides resolved through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| normalize_text_option(lookup(name));

        if let Some(dir) = text("ACEUP_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = text("ACEUP_REMOTE_URL") {
            self.remote_base_url = Some(url);
        }
        if let Some(url) = text("ACEUP_ANALYTICS_URL") {
            self.analytics_base_url = Some(url);
        }
        if let Some(url) = text("ACEUP_HEALTH_URL") {
            self.health_check_url = Some(url);
        }
        if let Some(value) = text("ACEUP_LIGHT_SYNC_INTERVAL_SECS") {
            self.light_sync_interval_secs = parse_number("ACEUP_LIGHT_SYNC_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = text("ACEUP_REMOTE_TIMEOUT_SECS") {
            self.remote_timeout_secs = parse_number("ACEUP_REMOTE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = text("ACEUP_CONFLICT_LOG_LIMIT") {
            self.conflict_log_limit = parse_number("ACEUP_CONFLICT_LOG_LIMIT", &value)?;
        }
        if let Some(value) = text("ACEUP_PROBE_INTERVAL_SECS") {
            self.probe_interval_secs = parse_number("ACEUP_PROBE_INTERVAL_SECS", &value)?;
        }
        Ok(self)
    }

    /// Normalize URLs and reject zero intervals.
    pub fn validated(mut self) -> Result<Self> {
        self.remote_base_url = normalize_http_url(self.remote_base_url, "remote_base_url")?;
        self.analytics_base_url =
            normalize_http_url(self.analytics_base_url, "analytics_base_url")?;
        self.health_check_url = normalize_http_url(self.health_check_url, "health_check_url")?;

        for (field, value) in [
            ("light_sync_interval_secs", self.light_sync_interval_secs),
            ("remote_timeout_secs", self.remote_timeout_secs),
            ("probe_interval_secs", self.probe_interval_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than zero")));
            }
        }
        Ok(self)
    }

    /// Explicit health URL, else the analytics backend's health endpoint.
    pub fn effective_health_check_url(&self) -> Option<String> {
        self.health_check_url.clone().or_else(|| {
            self.analytics_base_url
                .as_ref()
                .map(|base| format!("{base}/api/health"))
        })
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            light_sync_interval: Duration::from_secs(self.light_sync_interval_secs),
        }
    }

    pub const fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            remote_timeout: self.remote_timeout(),
            conflict_log_limit: self.conflict_log_limit,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got '{value}'")))
}

fn normalize_http_url(raw: Option<String>, field: &str) -> Result<Option<String>> {
    let Some(value) = normalize_text_option(raw) else {
        return Ok(None);
    };
    if is_http_url(&value) {
        Ok(Some(value.trim_end_matches('/').to_string()))
    } else {
        Err(Error::Config(format!(
            "{field} must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.sync_config().light_sync_interval,
            Duration::from_secs(1800)
        );
        assert_eq!(config.repository_config(), RepositoryConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = AppConfig::from_json(r#"{"remote_url": "x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = AppConfig::from_json(
            r#"{"remote_base_url": "https://file.example.com", "conflict_log_limit": 5}"#,
        )
        .unwrap()
        .with_overrides(env(&[
            ("ACEUP_REMOTE_URL", "https://env.example.com/"),
            ("ACEUP_LIGHT_SYNC_INTERVAL_SECS", "60"),
            ("ACEUP_DATA_DIR", "  "),
        ]))
        .unwrap()
        .validated()
        .unwrap();

        assert_eq!(
            config.remote_base_url.as_deref(),
            Some("https://env.example.com")
        );
        assert_eq!(config.light_sync_interval_secs, 60);
        assert_eq!(config.conflict_log_limit, 5);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            AppConfig::default().with_overrides(env(&[("ACEUP_REMOTE_TIMEOUT_SECS", "soon")])),
            Err(Error::Config(_))
        ));

        let config = AppConfig {
            remote_base_url: Some("api.example.com".to_string()),
            ..AppConfig::default()
        };
        assert!(config.validated().is_err());

        let config = AppConfig {
            probe_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.validated().is_err());
    }

    #[test]
    fn health_url_defaults_to_analytics_backend() {
        let config = AppConfig {
            analytics_base_url: Some("http://localhost:5000/".to_string()),
            ..AppConfig::default()
        }
        .validated()
        .unwrap();
        assert_eq!(
            config.effective_health_check_url().as_deref(),
            Some("http://localhost:5000/api/health")
        );
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aceup.json");
        std::fs::write(&path, r#"{"probe_interval_secs": 15}"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
        assert!(AppConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }
}
