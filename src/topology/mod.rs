//! Topology subsystem: routing plans and the proxy artifact.
//!
//! # Data Flow
//! ```text
//! ClusterState
//!     → plan.rs (RoutingPlan: ordered backends, roles, weights, checks)
//!     → render.rs (HAProxy listener text, deterministic)
//!     → writer.rs (write, validate, push, reload)
//! ```
//!
//! # Design Decisions
//! - Plans are derived, never edited; every transition builds a new one
//! - The artifact is fully replaced on every apply
//! - Re-applying the artifact that is already live is a no-op

pub mod plan;
pub mod render;
pub mod writer;

pub use plan::{Role, RoutingEntry, RoutingPlan};
pub use render::render;
pub use writer::{ApplyError, ApplyOutcome, ApplyStage, TopologyWriter};
