//! Configuration for the simulator
//!
//! This module contains the full, serializable configuration surface of the
//! simulation engine, along with validation for the invariants the engine
//! relies on. Validation happens once, at construction or at
//! `update_config`, and never mid-run (see the error taxonomy in
//! [`crate::error`]).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Compaction strategy the simulated engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStyle {
    /// RocksDB-style leveled compaction
    Leveled,
    /// RocksDB-style universal (tiered) compaction
    Universal,
    /// FIFO compaction: drop oldest data past a size or TTL ceiling
    Fifo,
}

/// What happens to traffic above `capacity_limit_mbps` in the advanced
/// traffic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Excess traffic above the capacity limit is discarded
    Drop,
    /// Excess traffic above the capacity limit accumulates in a FIFO queue
    /// that drains at capacity
    Queue,
}

/// Write traffic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrafficModel {
    /// Fixed-rate writes, starting at time 0
    Constant {
        /// Sustained write rate
        rate_mbps: f64,
    },
    /// ON/OFF carrier with lognormal jitter and independent Poisson spikes
    Advanced {
        /// Baseline rate during an ON segment, before jitter
        base_rate_mbps: f64,
        /// Multiplier applied to the baseline rate while ON
        burst_multiplier: f64,
        /// Sigma of the per-segment lognormal jitter applied to the
        /// achieved rate
        lognormal_sigma: f64,
        /// Mean duration of an ON segment (Erlang-distributed), seconds
        on_mean_s: f64,
        /// Mean duration of an OFF segment (exponentially distributed),
        /// seconds
        off_mean_s: f64,
        /// Shape parameter `k` of the Erlang-distributed ON duration
        erlang_k: u32,
        /// Rate (per second) of the independent Poisson spike process
        spike_rate_per_s: f64,
        /// Mean duration of a spike, seconds
        spike_mean_dur_s: f64,
        /// Mean of the lognormal spike amplitude
        spike_amplitude_mean: f64,
        /// Sigma of the lognormal spike amplitude
        spike_amplitude_sigma: f64,
        /// Hard cap on instantaneous rate; `0.0` means unlimited
        capacity_limit_mbps: f64,
        /// What happens to traffic above the capacity limit
        queue_mode: QueueMode,
    },
}

/// Distribution used to statistically sample how many files a compaction
/// job overlaps in its target level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlapDistribution {
    /// Overlap count uniform over the candidate population
    Uniform,
    /// Overlap count from an exponential distribution, capped at the
    /// population size
    Exponential {
        /// Rate parameter
        lambda: f64,
    },
    /// Overlap count from a geometric distribution, capped at the
    /// population size
    Geometric {
        /// Success probability
        p: f64,
    },
    /// Overlap count is a fixed percentage of the population
    Fixed {
        /// Fraction of the population, in `(0, 1]`
        percentage: f64,
    },
}

/// Specification of a latency distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LatencySpec {
    /// A constant latency
    Fixed {
        /// The fixed latency, seconds
        mean: f64,
    },
    /// Exponentially distributed latency
    Exponential {
        /// Mean latency, seconds
        mean: f64,
    },
    /// Lognormally distributed latency
    Lognormal {
        /// Mean latency, seconds
        mean: f64,
        /// Sigma of the underlying normal distribution
        sigma: f64,
    },
}

/// Optional statistical read workload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadWorkloadConfig {
    /// Whether the read workload is simulated at all
    pub enabled: bool,
    /// Aggregate read request rate
    pub requests_per_sec: f64,
    /// Fraction of requests served from (simulated) cache
    pub cache_hit_rate: f64,
    /// Fraction of requests that are bloom-filter negatives (would have
    /// probed disk but a bloom filter ruled the key out)
    pub bloom_negative_rate: f64,
    /// Fraction of requests that are range scans
    pub scan_rate: f64,
    /// Latency of a cache hit
    pub cache_hit_latency_spec: LatencySpec,
    /// Latency of a bloom-filter negative
    pub bloom_negative_latency_spec: LatencySpec,
    /// Per-file-probe latency of a point lookup (the effective latency is
    /// the maximum over `read_amplification` samples)
    pub point_lookup_latency_spec: LatencySpec,
    /// Latency of a range scan
    pub scan_latency_spec: LatencySpec,
    /// Average amount of data returned per scan
    pub avg_scan_size_kb: f64,
}

impl Default for ReadWorkloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_sec: 0.0,
            cache_hit_rate: 0.0,
            bloom_negative_rate: 0.0,
            scan_rate: 0.0,
            cache_hit_latency_spec: LatencySpec::Fixed { mean: 0.0001 },
            bloom_negative_latency_spec: LatencySpec::Fixed { mean: 0.0005 },
            point_lookup_latency_spec: LatencySpec::Exponential { mean: 0.001 },
            scan_latency_spec: LatencySpec::Exponential { mean: 0.005 },
            avg_scan_size_kb: 64.0,
        }
    }
}

/// Full configuration for a simulation run
///
/// Immutable for the duration of a run unless updated through
/// `Simulator::update_config`, which partitions fields into those that can
/// be applied live and those that require a `reset()` (see
/// [`crate::types`] and the simulator driver for the partition).
///
/// # Example
///
/// ```
/// use lsmsim_core::{SimulatorConfig, CompactionStyle};
///
/// let config = SimulatorConfig {
///     num_levels: 7,
///     compaction_style: CompactionStyle::Leveled,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    // --- Memtable ---
    /// Threshold (MB) at which the mutable memtable becomes immutable
    pub memtable_flush_size_mb: f64,
    /// Maximum outstanding memtables (including the mutable one); exceeding
    /// `max_write_buffer_number - 1` immutable memtables triggers a
    /// write-stall
    pub max_write_buffer_number: usize,

    // --- Structure ---
    /// Number of levels, `>= 2`
    pub num_levels: usize,
    /// Number of L0 files that trigger compaction
    pub l0_compaction_trigger: usize,
    /// Base target size (MB) for level targets
    pub max_bytes_for_level_base_mb: f64,
    /// Size multiplier between consecutive levels
    pub level_multiplier: f64,
    /// Target size (MB) of a single output SST file
    pub target_file_size_mb: f64,
    /// Multiplier applied to `target_file_size_mb` per level depth
    pub target_file_size_multiplier: f64,
    /// Whether level targets are computed dynamically from the deepest
    /// non-empty level (leveled compaction only)
    pub level_compaction_dynamic_level_bytes: bool,

    // --- Compaction ---
    /// Compaction strategy
    pub compaction_style: CompactionStyle,
    /// Maximum number of concurrently active compaction jobs
    pub max_background_jobs: usize,
    /// Maximum subcompactions a single eligible job may split into
    pub max_subcompactions: usize,
    /// Soft cap (MB) on a single compaction job's input size (not enforced
    /// for L0 compactions, by design; see the leveled compactor)
    pub max_compaction_bytes_mb: f64,
    /// Combined dedup x compression ratio applied to compaction/flush
    /// output
    pub compaction_reduction_factor: f64,
    /// Universal compaction's space-amplification trigger threshold,
    /// percent
    pub max_size_amplification_percent: f64,

    // --- I/O ---
    /// Shared disk bandwidth, MB/s
    pub io_throughput_mbps: f64,
    /// Fixed per-operation I/O latency, ms
    pub io_latency_ms: f64,

    // --- WAL ---
    /// Whether writes are logged to a WAL before reaching the memtable
    pub enable_wal: bool,
    /// Whether each WAL append waits for a sync
    pub wal_sync: bool,
    /// Latency of a WAL sync, ms
    pub wal_sync_latency_ms: f64,

    // --- Safety ---
    /// Cumulative stalled-write-bytes limit before an OOM kill; `0` means
    /// unlimited
    pub max_stalled_write_memory_mb: f64,

    // --- Determinism ---
    /// Seed for the simulator's single RNG stream
    pub random_seed: u64,

    // --- Traffic ---
    /// Write traffic model
    pub traffic: TrafficModel,

    // --- Overlap model ---
    /// Distribution used to sample compaction overlap counts
    pub overlap_distribution: OverlapDistribution,

    // --- Reads (optional) ---
    /// Optional statistical read workload
    pub read_workload: ReadWorkloadConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            memtable_flush_size_mb: 64.0,
            max_write_buffer_number: 4,
            num_levels: 7,
            l0_compaction_trigger: 4,
            max_bytes_for_level_base_mb: 256.0,
            level_multiplier: 10.0,
            target_file_size_mb: 64.0,
            target_file_size_multiplier: 1.0,
            level_compaction_dynamic_level_bytes: false,
            compaction_style: CompactionStyle::Leveled,
            max_background_jobs: 2,
            max_subcompactions: 1,
            max_compaction_bytes_mb: 1600.0,
            compaction_reduction_factor: 0.9,
            max_size_amplification_percent: 200.0,
            io_throughput_mbps: 500.0,
            io_latency_ms: 1.0,
            enable_wal: true,
            wal_sync: false,
            wal_sync_latency_ms: 2.0,
            max_stalled_write_memory_mb: 0.0,
            random_seed: 1,
            traffic: TrafficModel::Constant { rate_mbps: 10.0 },
            overlap_distribution: OverlapDistribution::Exponential { lambda: 0.5 },
            read_workload: ReadWorkloadConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Validates every invariant the simulation engine relies on
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] with the first violated
    /// invariant found.
    pub fn validate(&self) -> Result<()> {
        fn check(cond: bool, reason: impl Into<String>) -> Result<()> {
            if cond {
                Ok(())
            } else {
                Err(Error::InvalidConfiguration {
                    reason: reason.into(),
                })
            }
        }

        check(
            self.memtable_flush_size_mb > 0.0,
            "memtable_flush_size_mb must be positive",
        )?;
        check(
            self.max_write_buffer_number >= 2,
            "max_write_buffer_number must be at least 2",
        )?;
        check(self.num_levels >= 2, "num_levels must be at least 2")?;
        check(
            self.l0_compaction_trigger >= 1,
            "l0_compaction_trigger must be at least 1",
        )?;
        check(
            self.max_bytes_for_level_base_mb > 0.0,
            "max_bytes_for_level_base_mb must be positive",
        )?;
        check(
            self.level_multiplier > 1.0,
            "level_multiplier must be greater than 1",
        )?;
        check(
            self.target_file_size_mb > 0.0,
            "target_file_size_mb must be positive",
        )?;
        check(
            self.target_file_size_multiplier > 0.0,
            "target_file_size_multiplier must be positive",
        )?;
        check(
            self.max_background_jobs >= 1,
            "max_background_jobs must be at least 1",
        )?;
        check(
            self.max_subcompactions >= 1,
            "max_subcompactions must be at least 1",
        )?;
        check(
            self.max_compaction_bytes_mb > 0.0,
            "max_compaction_bytes_mb must be positive",
        )?;
        check(
            self.compaction_reduction_factor > 0.0 && self.compaction_reduction_factor <= 1.0,
            "compaction_reduction_factor must be in (0, 1]",
        )?;
        if self.compaction_style == CompactionStyle::Universal {
            check(
                self.max_size_amplification_percent > 0.0,
                "max_size_amplification_percent must be positive for universal compaction",
            )?;
        }
        check(
            self.io_throughput_mbps > 0.0,
            "io_throughput_mbps must be positive",
        )?;
        check(self.io_latency_ms >= 0.0, "io_latency_ms must be non-negative")?;
        check(
            self.wal_sync_latency_ms >= 0.0,
            "wal_sync_latency_ms must be non-negative",
        )?;
        check(
            self.max_stalled_write_memory_mb >= 0.0,
            "max_stalled_write_memory_mb must be non-negative",
        )?;

        match &self.traffic {
            TrafficModel::Constant { rate_mbps } => {
                check(*rate_mbps >= 0.0, "traffic rate_mbps must be non-negative")?;
            }
            TrafficModel::Advanced {
                base_rate_mbps,
                burst_multiplier,
                lognormal_sigma,
                on_mean_s,
                off_mean_s,
                erlang_k,
                spike_rate_per_s,
                spike_mean_dur_s,
                spike_amplitude_sigma,
                capacity_limit_mbps,
                ..
            } => {
                check(
                    *base_rate_mbps >= 0.0,
                    "traffic base_rate_mbps must be non-negative",
                )?;
                check(
                    *burst_multiplier >= 1.0,
                    "traffic burst_multiplier must be >= 1.0",
                )?;
                check(
                    *lognormal_sigma >= 0.0,
                    "traffic lognormal_sigma must be non-negative",
                )?;
                check(*on_mean_s > 0.0, "traffic on_mean_s must be positive")?;
                check(*off_mean_s > 0.0, "traffic off_mean_s must be positive")?;
                check(*erlang_k >= 1, "traffic erlang_k must be at least 1")?;
                check(
                    *spike_rate_per_s >= 0.0,
                    "traffic spike_rate_per_s must be non-negative",
                )?;
                check(
                    *spike_mean_dur_s >= 0.0,
                    "traffic spike_mean_dur_s must be non-negative",
                )?;
                check(
                    *spike_amplitude_sigma >= 0.0,
                    "traffic spike_amplitude_sigma must be non-negative",
                )?;
                check(
                    *capacity_limit_mbps >= 0.0,
                    "traffic capacity_limit_mbps must be non-negative",
                )?;
            }
        }

        match &self.overlap_distribution {
            OverlapDistribution::Uniform => {}
            OverlapDistribution::Exponential { lambda } => {
                check(*lambda > 0.0, "overlap_distribution lambda must be positive")?;
            }
            OverlapDistribution::Geometric { p } => {
                check(
                    *p > 0.0 && *p <= 1.0,
                    "overlap_distribution p must be in (0, 1]",
                )?;
            }
            OverlapDistribution::Fixed { percentage } => {
                check(
                    *percentage > 0.0 && *percentage <= 1.0,
                    "overlap_distribution percentage must be in (0, 1]",
                )?;
            }
        }

        if self.read_workload.enabled {
            let rw = &self.read_workload;
            check(
                rw.requests_per_sec >= 0.0,
                "read_workload.requests_per_sec must be non-negative",
            )?;
            for (name, rate) in [
                ("cache_hit_rate", rw.cache_hit_rate),
                ("bloom_negative_rate", rw.bloom_negative_rate),
                ("scan_rate", rw.scan_rate),
            ] {
                check(
                    (0.0..=1.0).contains(&rate),
                    format!("read_workload.{name} must be in [0, 1]"),
                )?;
            }
            check(
                rw.cache_hit_rate + rw.bloom_negative_rate + rw.scan_rate <= 1.0,
                "read_workload request-class rates must sum to at most 1.0",
            )?;
            check(
                rw.avg_scan_size_kb > 0.0,
                "read_workload.avg_scan_size_kb must be positive",
            )?;
        }

        Ok(())
    }

    /// Returns `true` if changing from `self` to `other` requires a
    /// `reset()` rather than a live `update_config`
    ///
    /// Structural fields (number of levels, memtable size, compaction
    /// style, dynamic-level-bytes flag) require a reset; dynamic fields
    /// (write rate, traffic parameters, read workload, I/O throughput and
    /// latency, parallelism) can be applied live.
    pub fn requires_reset_from(&self, other: &SimulatorConfig) -> bool {
        self.num_levels != other.num_levels
            || self.memtable_flush_size_mb != other.memtable_flush_size_mb
            || self.max_write_buffer_number != other.max_write_buffer_number
            || self.compaction_style != other.compaction_style
            || self.level_compaction_dynamic_level_bytes
                != other.level_compaction_dynamic_level_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulatorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_too_few_levels() {
        let config = SimulatorConfig {
            num_levels: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_io_throughput() {
        let config = SimulatorConfig {
            io_throughput_mbps: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_burst_multiplier_below_one() {
        let config = SimulatorConfig {
            traffic: TrafficModel::Advanced {
                base_rate_mbps: 10.0,
                burst_multiplier: 0.5,
                lognormal_sigma: 0.1,
                on_mean_s: 5.0,
                off_mean_s: 10.0,
                erlang_k: 2,
                spike_rate_per_s: 0.1,
                spike_mean_dur_s: 1.0,
                spike_amplitude_mean: 1.0,
                spike_amplitude_sigma: 0.1,
                capacity_limit_mbps: 0.0,
                queue_mode: QueueMode::Drop,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_reduction_factor_out_of_range() {
        let config = SimulatorConfig {
            compaction_reduction_factor: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn structural_change_requires_reset() {
        let base = SimulatorConfig::default();
        let changed = SimulatorConfig {
            num_levels: 5,
            ..base.clone()
        };
        assert!(changed.requires_reset_from(&base));
    }

    #[test]
    fn dynamic_change_does_not_require_reset() {
        let base = SimulatorConfig::default();
        let changed = SimulatorConfig {
            io_throughput_mbps: 999.0,
            ..base.clone()
        };
        assert!(!changed.requires_reset_from(&base));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulatorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: SimulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, decoded);
    }
}
