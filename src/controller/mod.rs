//! Failover controller subsystem.
//!
//! # Data Flow
//! ```text
//! ticker (machine.rs)
//!     → probe primary (health)
//!     → TransitionGate streaks (health/state.rs)
//!     → promote: fence (fencing.rs) → convergence gate (convergence.rs)
//!     → restore: start primary → wait healthy
//!     → TopologyWriter::apply (topology)
//!     → commit state + publish snapshot (state.rs)
//! ```
//!
//! # Design Decisions
//! - One task owns the state; everything else reads snapshots
//! - State commits only after the proxy accepted the new plan
//! - The failover plan needs a fence proof, so the old primary is down first

pub mod convergence;
pub mod fencing;
pub mod machine;
pub mod state;

pub use convergence::{ConvergenceGate, GateVerdict, HeartbeatGate, HeartbeatWriter};
pub use fencing::{fence, FenceError, Fenced};
pub use machine::{Controller, TickOutcome};
pub use state::{ClusterSnapshot, ClusterState, StateRecord};
