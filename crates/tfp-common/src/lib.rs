//! TFP Common - shared types for the kernel-bypass TCP fast path
//!
//! This crate holds the small set of types shared between the dataplane
//! workers and whatever supervises them:
//!
//! - Fast-path configuration and its validation
//! - Process-wide shared state (shutdown flag, core counts, scale requests)
//! - Cycle counter access for busy-time accounting

#![warn(missing_docs)]

pub mod config;
pub mod shared;
pub mod time;

pub use config::{ConfigError, FastPathConfig};
pub use shared::SharedState;
pub use time::cycle_counter;
