use std::path::PathBuf;
use std::sync::Arc;

use aceup_core::analytics::{AnalyticsSink, HttpAnalytics, TracingAnalytics};
use aceup_core::identity::{IdentityProvider, StaticIdentity};
use aceup_core::store::FileStore;
use aceup_core::{
    AppConfig, MemoryRemotes, NetworkMonitor, RemoteProviders, SyncContext, SyncManager,
};

use crate::cli::GlobalOptions;
use crate::error::CliError;

/// Everything a command needs, wired from flags, config, and environment.
pub struct App {
    pub manager: Arc<SyncManager>,
    pub identity: Arc<StaticIdentity>,
    pub config: AppConfig,
    pub data_dir: PathBuf,
    http_analytics: Option<Arc<HttpAnalytics>>,
}

impl App {
    pub async fn open(options: &GlobalOptions) -> Result<Self, CliError> {
        Self::open_with_env(options, |name| std::env::var(name).ok()).await
    }

    pub async fn open_with_env<F>(options: &GlobalOptions, lookup: F) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::load(options.config.as_deref())?;
        if let Some(url) = options.remote_url.clone() {
            config.remote_base_url = Some(url);
            config = config.validated()?;
        }

        let data_dir = resolve_data_dir(options.data_dir.clone(), config.data_dir.clone())?;
        let store = FileStore::open(data_dir.clone()).await?;
        let identity = Arc::new(StaticIdentity::new(
            options.user.clone().or_else(|| lookup("ACEUP_USER_ID")),
        ));
        let network = NetworkMonitor::new(false);

        let remotes = match config.remote_base_url.as_deref() {
            Some(base_url) => RemoteProviders::rest(base_url, config.remote_timeout())?,
            None => MemoryRemotes::new().providers(),
        };
        let http_analytics = match config.analytics_base_url.as_deref() {
            Some(base_url) => Some(Arc::new(HttpAnalytics::new(
                base_url,
                config.remote_timeout(),
            )?)),
            None => None,
        };
        let analytics: Arc<dyn AnalyticsSink> = match &http_analytics {
            Some(sink) => sink.clone(),
            None => Arc::new(TracingAnalytics),
        };

        let context = SyncContext::new(Arc::new(store), identity.clone(), network.clone())
            .with_analytics(analytics)
            .with_repository_config(config.repository_config())
            .with_sync_config(config.sync_config());
        let manager = Arc::new(SyncManager::new(context, remotes));

        if config.remote_base_url.is_some() {
            match config.effective_health_check_url() {
                Some(url) => {
                    network.probe_once(&url, config.remote_timeout()).await?;
                }
                None => {
                    network.set_online(true);
                }
            }
        }
        tracing::debug!(
            "Opened {} (online: {})",
            data_dir.display(),
            network.current_status()
        );

        Ok(Self {
            manager,
            identity,
            config,
            data_dir,
            http_analytics,
        })
    }

    /// Let analytics events still in flight reach the backend before exit.
    pub async fn flush_analytics(&self) {
        if let Some(analytics) = &self.http_analytics {
            analytics.flush(self.config.remote_timeout()).await;
        }
    }

    pub fn user_id(&self) -> Result<String, CliError> {
        Ok(self.identity.require_user_id()?)
    }

    pub fn is_online(&self) -> bool {
        self.manager.network().current_status()
    }

    pub const fn is_remote_configured(&self) -> bool {
        self.config.remote_base_url.is_some()
    }
}

pub fn resolve_data_dir(
    cli_data_dir: Option<PathBuf>,
    config_data_dir: Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    cli_data_dir
        .or(config_data_dir)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("aceup")))
        .ok_or_else(|| {
            CliError::Config("could not resolve a data directory; pass --data-dir".to_string())
        })
}
