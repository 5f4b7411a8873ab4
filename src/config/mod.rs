//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → FAILOVER_* environment overlay
//!     → validation.rs (semantic checks)
//!     → ControllerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ControllerConfig;
pub use schema::NodeConfig;
pub use schema::ProxyConfig;
pub use schema::{
    AdminConfig, CheckConfig, ConvergenceConfig, LogFormat, LoopConfig, ObservabilityConfig,
};
