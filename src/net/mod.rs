//! Network layer subsystem.
//!
//! The discovery server speaks plain HTTP by default and HTTPS when
//! `[discovery.tls]` is configured; `tls.rs` loads the certificate pair.

pub mod tls;
