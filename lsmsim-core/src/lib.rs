//! Core types shared by the LSM simulation engine and its collaborators
//!
//! This crate contains the fundamental types and error handling used
//! throughout the simulator. It provides:
//!
//! - The full, serializable [`SimulatorConfig`] and its nested tagged
//!   unions ([`CompactionStyle`], [`TrafficModel`], [`OverlapDistribution`],
//!   [`LatencySpec`])
//! - Common scalar aliases like [`VirtualTime`] and [`Megabytes`]
//! - The simulator's error taxonomy, [`Error`] and [`Result`]
//!
//! # Example
//!
//! ```
//! use lsmsim_core::{SimulatorConfig, CompactionStyle};
//!
//! let config = SimulatorConfig {
//!     compaction_style: CompactionStyle::Universal,
//!     ..Default::default()
//! };
//! config.validate().expect("default config is valid");
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    CompactionStyle, LatencySpec, OverlapDistribution, QueueMode, ReadWorkloadConfig,
    SimulatorConfig, TrafficModel,
};
pub use error::{Error, Result};
pub use types::*;
