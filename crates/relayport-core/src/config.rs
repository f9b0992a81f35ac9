//! Configuration resolution for relayport.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/relayport/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Image the proxy containers run when nothing else is configured.
pub const DEFAULT_IMAGE: &str = "teddysun/xray";

/// Prefix for deterministic container names (`<prefix>-<port>`).
pub const DEFAULT_NAME_PREFIX: &str = "xray-converter";

/// Cipher used when a create request does not name one.
pub const DEFAULT_METHOD: &str = "aes-256-gcm";

/// Engine restart policy for provisioned containers.
pub const DEFAULT_RESTART_POLICY: &str = "unless-stopped";

/// Lifecycle manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// `SQLite` database file. `None` means `~/.relayport/relayport.db`.
    pub database_path: Option<PathBuf>,
    /// Container image for provisioned proxies.
    pub image: String,
    /// Prefix for deterministic container names.
    pub container_name_prefix: String,
    /// Upper bound for every container engine call.
    pub engine_timeout_secs: u64,
    /// Grace period handed to the engine when stopping a container.
    pub stop_grace_secs: u64,
    /// Cipher method used when a request omits one.
    pub default_method: String,
    /// `no`, `always`, `unless-stopped` or `on-failure`.
    pub restart_policy: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            image: DEFAULT_IMAGE.to_string(),
            container_name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            engine_timeout_secs: 30,
            stop_grace_secs: 10,
            default_method: DEFAULT_METHOD.to_string(),
            restart_policy: DEFAULT_RESTART_POLICY.to_string(),
        }
    }
}

impl ManagerConfig {
    pub const fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Database path, falling back to `~/.relayport/relayport.db`.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(".relayport").join("relayport.db"))
    }

    /// Reject values the manager cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.engine_timeout_secs == 0 {
            return Err(Error::Config(
                "engine_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(Error::Config("image must not be empty".to_string()));
        }
        if !is_valid_name_prefix(&self.container_name_prefix) {
            return Err(Error::Config(format!(
                "container_name_prefix '{}' is not a valid container name",
                self.container_name_prefix
            )));
        }
        if self.default_method.trim().is_empty() {
            return Err(Error::Config("default_method must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Container names must start with an alphanumeric and continue with
/// `[a-zA-Z0-9_.-]`.
fn is_valid_name_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// A settings file: every field optional, present fields win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    database_path: Option<PathBuf>,
    image: Option<String>,
    container_name_prefix: Option<String>,
    engine_timeout_secs: Option<u64>,
    stop_grace_secs: Option<u64>,
    default_method: Option<String>,
    restart_policy: Option<String>,
}

/// Load configuration with hierarchical resolution.
///
/// A missing global file is skipped; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<ManagerConfig> {
    let mut config = ManagerConfig::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
    }

    if let Some(path) = explicit {
        let overlay = load_config_file(path)?;
        merge_config(&mut config, overlay);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("relayport").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut ManagerConfig, overlay: ConfigOverlay) {
    if overlay.database_path.is_some() {
        base.database_path = overlay.database_path;
    }
    if let Some(image) = overlay.image {
        base.image = image;
    }
    if let Some(prefix) = overlay.container_name_prefix {
        base.container_name_prefix = prefix;
    }
    if let Some(secs) = overlay.engine_timeout_secs {
        base.engine_timeout_secs = secs;
    }
    if let Some(secs) = overlay.stop_grace_secs {
        base.stop_grace_secs = secs;
    }
    if let Some(method) = overlay.default_method {
        base.default_method = method;
    }
    if let Some(policy) = overlay.restart_policy {
        base.restart_policy = policy;
    }
}

fn apply_env_overrides(config: &mut ManagerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("RELAYPORT_DB_PATH") {
        config.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("RELAYPORT_IMAGE") {
        config.image = val;
    }
    if let Some(val) = lookup("RELAYPORT_NAME_PREFIX") {
        config.container_name_prefix = val;
    }
    if let Some(val) = lookup("RELAYPORT_ENGINE_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.engine_timeout_secs = n;
    }
    if let Some(val) = lookup("RELAYPORT_DEFAULT_METHOD") {
        config.default_method = val;
    }
    if let Some(val) = lookup("RELAYPORT_RESTART_POLICY") {
        config.restart_policy = val;
    }
}
