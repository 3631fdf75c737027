//! Discrete-event simulator for LSM-tree compaction and throughput dynamics
//!
//! Models the memtable/flush/compaction lifecycle of a RocksDB-like storage
//! engine without performing any real I/O: levels track file sizes and
//! counts, compaction overlap is sampled from configured statistical
//! distributions rather than real key ranges, and a single shared disk
//! token stands in for bandwidth contention between flushes, compactions,
//! and WAL appends.
//!
//! # Architecture
//!
//! ```text
//! Write path:
//! Write event → WAL reservation → mutable memtable → (full) → immutable
//! queue → Flush event → L0 file
//!
//! Compaction path:
//! CompactionCheck / post-event scheduler → Compactor::pick_compaction →
//! CompactionStart/Complete events → Compactor::execute_compaction
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lsmsim_core::SimulatorConfig;
//! use lsmsim_engine::Simulator;
//!
//! let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
//! sim.step(60.0);
//! println!("{:?}", sim.metrics());
//! ```

pub mod compaction;
pub mod distributions;
pub mod event_queue;
pub mod lsm;
pub mod metrics;
pub mod read_path;
pub mod simulator;
pub mod traffic;

pub use compaction::{CompactionEngine, CompactionJob, CompactionResult, Compactor};
pub use event_queue::{Event, EventQueue};
pub use metrics::MetricsSnapshot;
pub use simulator::{
    CompactionInfo, LevelSnapshot, Simulator, SimulatorState, StateSnapshot, StepResult,
    UpdateOutcome,
};
