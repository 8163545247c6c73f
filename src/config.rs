//! Configuration loading for the trajectory engine.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.trajectory/config.toml`)
//! 3. User config (`~/.trajectory/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional except the remote URL and API key, which
//! are only needed by commands that talk to the service. The API key is never
//! read from or written to a config file.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::core::balance::{DemotionOrder, Limits, VALID_DEMOTION_ORDERS};
use crate::core::classify::{OwedPolicy, VALID_OWED_POLICIES};
use crate::error::{Result, TrajectoryError};
use crate::util::{read_to_string_with_limit, MAX_CONFIG_SIZE};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "TRAJECTORY_API_KEY";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Remote service settings.
    pub remote: RemoteConfig,
    /// Session defaults.
    pub session: SessionConfig,
    /// Load caps.
    pub limits: Limits,
    /// Classification and balancing policies.
    pub policy: PolicyConfig,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Endpoint of the deployed web app.
    pub url: String,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// Name recorded as the author of saves and closures.
    pub actor: String,
}

/// Minimum valid timeout.
pub const MIN_TIMEOUT_SECONDS: u64 = 1;

impl RemoteConfig {
    /// Check if a timeout value is valid.
    pub fn is_valid_timeout(value: u64) -> bool {
        value >= MIN_TIMEOUT_SECONDS
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 30,
            actor: "web".to_string(),
        }
    }
}

/// Session defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Cycle used when none is given on the command line.
    pub cycle: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cycle: "2026".to_string(),
        }
    }
}

/// Classification and balancing policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Which regular sub-list gives up subjects first.
    pub demotion_order: DemotionOrder,
    /// Which owed-or-failed records are listed as owed.
    pub owed: OwedPolicy,
    /// Owed subjects at which a student counts as at risk.
    pub risk_threshold: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            demotion_order: DemotionOrder::default(),
            owed: OwedPolicy::default(),
            risk_threshold: 5,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.trajectory/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = trajectory_home()?;
        Self::load_layer(&home.join("config.toml"))
    }

    /// Load project config from the nearest `.trajectory/config.toml`.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&project_dir(cwd).join("config.toml"))
    }

    /// A missing layer is silent; a broken one is reported and skipped.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = read_to_string_with_limit(path, MAX_CONFIG_SIZE)?;
        toml::from_str(&content).map_err(|e| TrajectoryError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TRAJECTORY_URL") {
            if !val.trim().is_empty() {
                self.remote.url = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("TRAJECTORY_ACTOR") {
            if val.trim().is_empty() {
                eprintln!(
                    "Warning: Empty TRAJECTORY_ACTOR. Using '{}'.",
                    self.remote.actor
                );
            } else {
                self.remote.actor = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("TRAJECTORY_CYCLE") {
            if !val.trim().is_empty() {
                self.session.cycle = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("TRAJECTORY_TIMEOUT_SECONDS") {
            match val.parse::<u64>() {
                Ok(n) if RemoteConfig::is_valid_timeout(n) => self.remote.timeout_seconds = n,
                _ => eprintln!(
                    "Warning: Invalid TRAJECTORY_TIMEOUT_SECONDS value '{}'. \
                    Expected an integer >= {}. Using '{}'.",
                    val, MIN_TIMEOUT_SECONDS, self.remote.timeout_seconds
                ),
            }
        }

        if let Ok(val) = env::var("TRAJECTORY_DEMOTION_ORDER") {
            match DemotionOrder::from_name(&val) {
                Some(order) => self.policy.demotion_order = order,
                None => eprintln!(
                    "Warning: Invalid TRAJECTORY_DEMOTION_ORDER value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val,
                    VALID_DEMOTION_ORDERS,
                    self.policy.demotion_order.name()
                ),
            }
        }

        if let Ok(val) = env::var("TRAJECTORY_OWED_POLICY") {
            match OwedPolicy::from_name(&val) {
                Some(policy) => self.policy.owed = policy,
                None => eprintln!(
                    "Warning: Invalid TRAJECTORY_OWED_POLICY value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val,
                    VALID_OWED_POLICIES,
                    self.policy.owed.name()
                ),
            }
        }
    }

    /// Merge another config into this one, field by field.
    ///
    /// Non-default values in `other` win. A layer cannot reset a value back
    /// to its default once a lower layer changed it.
    fn merge(mut self, other: Config) -> Self {
        let default_remote = RemoteConfig::default();
        if other.remote.url != default_remote.url {
            self.remote.url = other.remote.url;
        }
        if other.remote.timeout_seconds != default_remote.timeout_seconds {
            self.remote.timeout_seconds = other.remote.timeout_seconds;
        }
        if other.remote.actor != default_remote.actor {
            self.remote.actor = other.remote.actor;
        }

        if other.session.cycle != SessionConfig::default().cycle {
            self.session.cycle = other.session.cycle;
        }

        let default_limits = Limits::default();
        if other.limits.regular_cap != default_limits.regular_cap {
            self.limits.regular_cap = other.limits.regular_cap;
        }
        if other.limits.intensification_cap != default_limits.intensification_cap {
            self.limits.intensification_cap = other.limits.intensification_cap;
        }
        if other.limits.terminal_grade != default_limits.terminal_grade {
            self.limits.terminal_grade = other.limits.terminal_grade;
        }

        let default_policy = PolicyConfig::default();
        if other.policy.demotion_order != default_policy.demotion_order {
            self.policy.demotion_order = other.policy.demotion_order;
        }
        if other.policy.owed != default_policy.owed {
            self.policy.owed = other.policy.owed;
        }
        if other.policy.risk_threshold != default_policy.risk_threshold {
            self.policy.risk_threshold = other.policy.risk_threshold;
        }

        self
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if !RemoteConfig::is_valid_timeout(self.remote.timeout_seconds) {
            return Err(TrajectoryError::config(format!(
                "remote.timeout_seconds must be >= {MIN_TIMEOUT_SECONDS}"
            )));
        }
        if self.remote.actor.trim().is_empty() {
            return Err(TrajectoryError::config("remote.actor must not be empty"));
        }
        if self.limits.regular_cap == 0 {
            return Err(TrajectoryError::config("limits.regular_cap must be >= 1"));
        }
        Ok(())
    }

    /// Check that the remote endpoint is configured.
    pub fn require_remote(&self) -> Result<&RemoteConfig> {
        if self.remote.url.trim().is_empty() {
            return Err(TrajectoryError::config(
                "no remote url; set remote.url in .trajectory/config.toml or TRAJECTORY_URL",
            ));
        }
        Ok(&self.remote)
    }
}

/// The API key from the environment.
pub fn api_key() -> Result<String> {
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(TrajectoryError::config(format!(
            "no API key; set {API_KEY_ENV}"
        ))),
    }
}

/// Get the trajectory home directory.
///
/// `TRAJECTORY_HOME` wins when set to a non-empty value, otherwise
/// `~/.trajectory`.
pub fn trajectory_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("TRAJECTORY_HOME") {
        if home.is_empty() {
            tracing::warn!("TRAJECTORY_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("TRAJECTORY_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    dirs::home_dir().map(|home| home.join(".trajectory"))
}

/// The nearest `.trajectory/` directory at or above `cwd`, or `cwd/.trajectory`.
pub fn project_dir(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .map(|ancestor| ancestor.join(".trajectory"))
        .find(|dir| dir.is_dir())
        .unwrap_or_else(|| cwd.join(".trajectory"))
}

/// Where the binary writes crash reports.
pub fn crash_log_path() -> Option<PathBuf> {
    trajectory_home().map(|h| h.join("crash.log"))
}
