//! Ghostwire configuration file handling
//!
//! Provides default configuration generation and loading for the bridge's
//! provisioning layer. Configuration files are TOML and live adjacent to the
//! state file by default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default bridge bot localpart
const DEFAULT_BOT_LOCALPART: &str = "bridgebot";

/// Ghostwire operator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostwireConfig {
    /// Homeserver and bot identity
    pub appservice: AppServiceConfig,

    /// Registration/membership cache
    #[serde(default)]
    pub state: StateConfig,

    /// Provisioning behaviour
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppServiceConfig {
    /// Domain user IDs are derived on (`@localpart:domain`)
    pub homeserver_domain: String,

    /// Localpart of the bridge bot used for invite fallback
    #[serde(default = "default_bot_localpart")]
    pub bot_localpart: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path to the JSON state file
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Serialize concurrent provisioning per user and per (user, room)
    ///
    /// Off by default: duplicate attempts are harmless and locking adds
    /// latency to every first action.
    #[serde(default)]
    pub coalesce: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_bot_localpart() -> String {
    DEFAULT_BOT_LOCALPART.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl GhostwireConfig {
    /// Create a new configuration for `homeserver_domain`
    pub fn new(homeserver_domain: impl Into<String>, state_path: PathBuf) -> Self {
        Self {
            appservice: AppServiceConfig {
                homeserver_domain: homeserver_domain.into(),
                bot_localpart: default_bot_localpart(),
            },
            state: StateConfig { path: state_path },
            provisioning: ProvisioningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: GhostwireConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(homeserver_domain: &str, state_path: &Path) -> String {
        format!(
            r#"# Ghostwire Configuration
#
# Settings for the bridge's virtual user provisioning layer.

[appservice]
# Domain virtual users are created on (@localpart:domain)
homeserver_domain = "{homeserver_domain}"

# Bridge bot localpart. The bot invites virtual users into rooms they
# cannot join on their own, so it needs invite power there.
bot_localpart = "{bot_localpart}"

[state]
# Registration and membership cache (JSON)
path = "{state_path}"

[provisioning]
# Serialize concurrent provisioning per user and per (user, room).
# When false, concurrent first actions may both register/join; the
# homeserver absorbs the duplicates.
coalesce = false

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/ghostwire/ghostwire.log"
"#,
            homeserver_domain = homeserver_domain,
            bot_localpart = DEFAULT_BOT_LOCALPART,
            state_path = state_path.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        homeserver_domain: &str,
        state_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(homeserver_domain, state_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Directory holding ghostwire's config and state by default
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ghostwire")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Get the default state file path
pub fn default_state_path() -> PathBuf {
    default_data_dir().join("state.json")
}
