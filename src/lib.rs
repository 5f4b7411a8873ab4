//! PostgreSQL primary/replica failover controller.

// Core loop
pub mod config;
pub mod controller;
pub mod health;
pub mod topology;

// Database and container plumbing
pub mod db;
pub mod runtime;
pub mod verifier;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ControllerConfig;
pub use controller::{ClusterState, Controller};
pub use lifecycle::Shutdown;
