//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Lock → Prober + runtime → Writer → Controller
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → loop exits after the current tick
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Lock (lock.rs):
//!     One controller per lock path; stale locks are taken over
//! ```

pub mod lock;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use lock::{ControllerLock, LockError};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_controller, prepare, Prepared, StartupError};
