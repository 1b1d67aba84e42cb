//! Service configuration loaded with Figment.
//!
//! Sources are merged in precedence order (later sources override earlier
//! ones):
//! 1. Built-in defaults
//! 2. An optional configuration file (TOML, YAML or JSON, by extension)
//! 3. Environment variables prefixed with `CPA_`; nested keys use `__`,
//!    e.g. `CPA_FEATURE_FLAGS__CUSTOM_PROFILE_ATTRIBUTES=true`
//!
//! The service never reads the environment itself. Whatever is loaded here
//! is handed to [`FieldService::new`](crate::FieldService::new).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ServiceError};

/// Name of the feature flag gating this subsystem.
pub const CUSTOM_PROFILE_ATTRIBUTES: &str = "custom_profile_attributes";

/// Active fields allowed by default.
pub const DEFAULT_FIELD_LIMIT: usize = 20;

/// Prefix of environment variables read by [`FieldsConfig::load`].
pub const ENV_PREFIX: &str = "CPA_";

/// Deployment-wide feature toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub custom_profile_attributes: bool,
}

impl FeatureFlags {
    /// Whether the named flag is on. Unknown flags are off.
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            CUSTOM_PROFILE_ATTRIBUTES => self.custom_profile_attributes,
            _ => false,
        }
    }
}

/// Who may list and read field definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Any signed-in user.
    #[default]
    Authenticated,
    /// Anyone, including anonymous callers.
    Anyone,
}

/// Configuration for the field management service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub feature_flags: FeatureFlags,
    /// Maximum number of active fields. Zero disables the limit.
    pub field_limit: usize,
    pub read_policy: ReadPolicy,
    /// Directory for the YAML store. In-memory storage when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            feature_flags: FeatureFlags::default(),
            field_limit: DEFAULT_FIELD_LIMIT,
            read_policy: ReadPolicy::default(),
            storage_dir: None,
        }
    }
}

impl FieldsConfig {
    /// Defaults with the feature flag switched on.
    pub fn enabled() -> Self {
        Self::default().with_feature_enabled(true)
    }

    pub fn with_feature_enabled(mut self, enabled: bool) -> Self {
        self.feature_flags.custom_profile_attributes = enabled;
        self
    }

    pub fn with_field_limit(mut self, limit: usize) -> Self {
        self.field_limit = limit;
        self
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Whether the subsystem is switched on.
    pub fn is_enabled(&self) -> bool {
        self.feature_flags.is_enabled(CUSTOM_PROFILE_ATTRIBUTES)
    }

    /// Load from defaults and the environment.
    pub fn load() -> Result<Self> {
        Self::figment(None)?.extract().map_err(ServiceError::from)
    }

    /// Load from defaults, `path`, then the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::figment(Some(path.as_ref()))?
            .extract()
            .map_err(ServiceError::from)
    }

    /// Build the layered figment without extracting it.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(FieldsConfig::default()));

        if let Some(path) = path {
            debug!(path = %path.display(), "loading fields configuration file");
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => {
                    return Err(ServiceError::UnsupportedConfigFormat {
                        path: path.to_path_buf(),
                    })
                }
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}
