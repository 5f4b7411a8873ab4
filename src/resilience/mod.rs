//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Bounded wait (fence confirmation, restore readiness):
//!     → retries.rs (poll a check until it passes or the ceiling elapses)
//!     → backoff.rs (jittered exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Every wait has a ceiling; nothing blocks the control loop indefinitely
//! - Jitter keeps restarted nodes from being hammered in lockstep

pub mod backoff;
pub mod retries;
