//! Configuration loading from disk and the environment.

use std::path::Path;
use std::fs;
use crate::config::schema::{ControllerConfig, NodeConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load the optional file, overlay the process environment, then validate.
pub fn load(path: Option<&Path>) -> Result<ControllerConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// [`load`] with an explicit variable lookup.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<ControllerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => ControllerConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Overlay `FAILOVER_*` variables onto `config`.
pub fn apply_env_overrides<F>(config: &mut ControllerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    overlay_node("FAILOVER_PRIMARY", &mut config.primary, &lookup)?;
    overlay_node("FAILOVER_REPLICA", &mut config.replica, &lookup)?;

    if let Some(v) = lookup("FAILOVER_INTERVAL_SECS") {
        config.controller.interval_secs = parse_var("FAILOVER_INTERVAL_SECS", &v)?;
    }
    if let Some(v) = lookup("FAILOVER_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
    if let Some(v) = lookup("FAILOVER_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    Ok(())
}

fn overlay_node<F>(prefix: &str, node: &mut NodeConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(&format!("{prefix}_HOST")) {
        node.host = v;
    }
    let port_var = format!("{prefix}_PORT");
    if let Some(v) = lookup(&port_var) {
        node.port = parse_var(&port_var, &v)?;
    }
    if let Some(v) = lookup(&format!("{prefix}_USER")) {
        node.user = v;
    }
    if let Some(v) = lookup(&format!("{prefix}_PASSWORD")) {
        node.password = v;
    }
    if let Some(v) = lookup(&format!("{prefix}_DBNAME")) {
        node.dbname = v;
    }
    Ok(())
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}
