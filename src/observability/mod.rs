//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Prober, controller, topology writer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every probe and every transition is a log event with structured fields
//! - Metrics are optional and cheap when no recorder is installed

pub mod logging;
pub mod metrics;
