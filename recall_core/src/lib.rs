#![forbid(unsafe_code)]

//! Core domain model and scheduling logic for Recall.
//!
//! This crate provides:
//! - Domain types (cards, learning states, ratings, review logs)
//! - Flat record codecs for cards, review logs and scheduler parameters
//! - The SM-2 review scheduler and its interval fuzzing
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod record;
pub mod config;
pub mod logging;
pub mod fuzz;
pub mod scheduler;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use record::{format_timestamp, parse_timestamp, CardRecord, ReviewLogRecord};
pub use config::{Config, FuzzConfig, SchedulerConfig};
pub use fuzz::{fuzz_interval, fuzz_range};
pub use scheduler::Scheduler;
