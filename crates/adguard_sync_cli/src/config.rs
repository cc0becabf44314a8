//! Configuration file loading.

use adguard_sync_engine::{
    DomainKind, DomainSet, HttpInstanceClient, InstanceClient, InstanceConfig, SyncConfig,
    SyncResult,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default pause between runs in watch mode.
pub const DEFAULT_INTERVAL_SECS: u64 = 600;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The file parsed but its values are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which domains to synchronize. Everything is on unless switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// DNS rewrites.
    pub rewrites: bool,
    /// Filter list subscriptions.
    pub filters: bool,
    /// Custom filtering rules.
    pub custom_rules: bool,
    /// Blocked services.
    pub services: bool,
    /// Persistent clients.
    pub clients: bool,
    /// Protection toggles and filtering config.
    pub toggles: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            rewrites: true,
            filters: true,
            custom_rules: true,
            services: true,
            clients: true,
            toggles: true,
        }
    }
}

impl Features {
    /// Enabled domains.
    pub fn domains(&self) -> DomainSet {
        [
            (DomainKind::Rewrites, self.rewrites),
            (DomainKind::Filters, self.filters),
            (DomainKind::CustomRules, self.custom_rules),
            (DomainKind::Services, self.services),
            (DomainKind::Clients, self.clients),
            (DomainKind::Toggles, self.toggles),
        ]
        .into_iter()
        .filter_map(|(kind, enabled)| enabled.then_some(kind))
        .collect()
    }
}

/// Contents of `adguard-sync.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The instance whose configuration is copied.
    pub origin: InstanceConfig,
    /// Instances that are made to match the origin.
    #[serde(default)]
    pub replicas: Vec<InstanceConfig>,
    /// Enabled domains.
    #[serde(default)]
    pub features: Features,
    /// Maximum number of replicas synchronized at once.
    pub concurrency: Option<usize>,
    /// Deadline for one run.
    pub deadline_secs: Option<u64>,
    /// Pause between runs in watch mode.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.url.trim().is_empty() {
            return Err(ConfigError::Invalid("origin url is empty".into()));
        }
        if self.replicas.is_empty() {
            return Err(ConfigError::Invalid("at least one replica is required".into()));
        }
        if let Some(i) = self.replicas.iter().position(|r| r.url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("replica {} has an empty url", i + 1)));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        if self.deadline_secs == Some(0) {
            return Err(ConfigError::Invalid("deadline_secs must be greater than 0".into()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new().with_domains(self.features.domains());
        if let Some(limit) = self.concurrency {
            config = config.with_concurrency_limit(limit);
        }
        if let Some(secs) = self.deadline_secs {
            config = config.with_deadline(Duration::from_secs(secs));
        }
        config
    }

    /// Builds the HTTP clients for origin and replicas.
    pub fn clients(&self) -> SyncResult<(Arc<dyn InstanceClient>, Vec<Arc<dyn InstanceClient>>)> {
        let origin: Arc<dyn InstanceClient> = Arc::new(HttpInstanceClient::new(&self.origin)?);
        let replicas = self
            .replicas
            .iter()
            .map(|r| HttpInstanceClient::new(r).map(|c| Arc::new(c) as Arc<dyn InstanceClient>))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok((origin, replicas))
    }
}
