//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Generation cycle:
//!     → timeouts.rs (deadline on every spec/key/token fetch)
//!     → On failure: cycle aborts, current snapshot stays served
//!     → backoff.rs (schedule the next attempt with jittered backoff)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Failed cycles retry sooner than the regular interval, never later

pub mod backoff;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use timeouts::with_timeout;
