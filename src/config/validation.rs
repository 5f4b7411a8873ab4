//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid, thresholds >= 1)
//! - Detect node definitions that would alias each other in the artifact
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{ControllerConfig, NodeConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_node("primary", &config.primary, &mut errors);
    validate_node("replica", &config.replica, &mut errors);

    if config.primary.host == config.replica.host && config.primary.port == config.replica.port {
        errors.push(ValidationError::new(
            "replica",
            "primary and replica resolve to the same host:port",
        ));
    }
    if config.primary.backend_name == config.replica.backend_name {
        errors.push(ValidationError::new(
            "replica.backend_name",
            "must differ from primary.backend_name",
        ));
    }

    let ctl = &config.controller;
    if ctl.interval_secs == 0 {
        errors.push(ValidationError::new("controller.interval_secs", "must be > 0"));
    }
    if ctl.failure_threshold == 0 {
        errors.push(ValidationError::new("controller.failure_threshold", "must be >= 1"));
    }
    if ctl.recovery_threshold == 0 {
        errors.push(ValidationError::new("controller.recovery_threshold", "must be >= 1"));
    }
    if ctl.probe_timeout_secs == 0 || ctl.probe_timeout_secs >= ctl.interval_secs {
        errors.push(ValidationError::new(
            "controller.probe_timeout_secs",
            "must be > 0 and shorter than interval_secs",
        ));
    }
    if ctl.restore_timeout_secs == 0 {
        errors.push(ValidationError::new("controller.restore_timeout_secs", "must be > 0"));
    }
    if ctl.lock_path.trim().is_empty() {
        errors.push(ValidationError::new("controller.lock_path", "must not be empty"));
    }

    let proxy = &config.proxy;
    for (field, port) in [
        ("proxy.stats_port", proxy.stats_port),
        ("proxy.client_port", proxy.client_port),
        ("proxy.health_port", proxy.health_port),
        ("proxy.check.port", proxy.check.port),
    ] {
        if port == 0 {
            errors.push(ValidationError::new(field, "port must be non-zero"));
        }
    }
    if proxy.check.rise == 0 || proxy.check.fall == 0 || proxy.check.inter_secs == 0 {
        errors.push(ValidationError::new("proxy.check", "inter, rise and fall must be > 0"));
    }
    if proxy.active_weight == 0 || proxy.active_weight > 256 {
        errors.push(ValidationError::new("proxy.active_weight", "must be within 1..=256"));
    }
    if proxy.backup_weight > 256 {
        errors.push(ValidationError::new("proxy.backup_weight", "must be within 0..=256"));
    }
    if proxy.local_config_path.trim().is_empty() {
        errors.push(ValidationError::new("proxy.local_config_path", "must not be empty"));
    }

    let conv = &config.convergence;
    if !is_identifier(&conv.table) {
        errors.push(ValidationError::new(
            "convergence.table",
            "must be a plain SQL identifier",
        ));
    }
    if conv.poll_interval_ms == 0 {
        errors.push(ValidationError::new("convergence.poll_interval_ms", "must be > 0"));
    }

    if config.admin.enabled && config.admin.api_key == PLACEHOLDER_API_KEY {
        errors.push(ValidationError::new(
            "admin.api_key",
            "placeholder key must be replaced when admin is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_node(prefix: &str, node: &NodeConfig, errors: &mut Vec<ValidationError>) {
    if node.host.trim().is_empty() {
        errors.push(ValidationError::new(format!("{prefix}.host"), "must not be empty"));
    }
    if node.port == 0 {
        errors.push(ValidationError::new(format!("{prefix}.port"), "port must be non-zero"));
    }
    if node.user.trim().is_empty() {
        errors.push(ValidationError::new(format!("{prefix}.user"), "must not be empty"));
    }
    if node.dbname.trim().is_empty() {
        errors.push(ValidationError::new(format!("{prefix}.dbname"), "must not be empty"));
    }
    if node.backend_name.is_empty() || node.backend_name.contains(char::is_whitespace) {
        errors.push(ValidationError::new(
            format!("{prefix}.backend_name"),
            "must be a single non-empty token",
        ));
    }
    if !node.backend_address.contains(':') {
        errors.push(ValidationError::new(
            format!("{prefix}.backend_address"),
            "expected host:port",
        ));
    }
}

/// The table name is interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
