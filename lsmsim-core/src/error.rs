//! Error types for the LSM simulator
//!
//! This module defines the error types used throughout the simulation
//! engine and its collaborators.

use thiserror::Error;

/// The main error type for simulator operations
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied configuration violates an invariant
    ///
    /// Surfaced at construction and from `update_config`; never surfaced
    /// mid-run.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Human-readable description of the violated invariant
        reason: String,
    },

    /// The simulator was killed after its stalled write backlog exceeded
    /// `max_stalled_write_memory_mb`
    ///
    /// This is fatal and sticky: the simulator refuses further `step` calls
    /// until `reset()`.
    #[error(
        "simulator OOM killed: stalled backlog {stalled_backlog_mb:.2}MB exceeds limit {limit_mb:.2}MB"
    )]
    OomKilled {
        /// Cumulative stalled write bytes (MB) at the moment of the kill
        stalled_backlog_mb: f64,
        /// The configured limit that was exceeded
        limit_mb: f64,
    },

    /// An I/O error occurred while a collaborator (e.g. the CLI) read or
    /// wrote a file
    ///
    /// The simulation core itself performs no real I/O; this variant exists
    /// for collaborators layered on top of the core that share its `Result`
    /// alias.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error occurred
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for simulator operations
pub type Result<T> = std::result::Result<T, Error>;
