//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (already validated) → sources → manager → servers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → manager loop stops → servers drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!     SIGHUP → regeneration cycle
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;
