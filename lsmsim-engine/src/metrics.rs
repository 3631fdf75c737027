//! Cumulative and windowed metrics
//!
//! [`MetricsAggregator`] owns every counter the simulator updates as it
//! processes events, plus a short rolling log of I/O operations used to
//! compute the windowed `instantaneous_mbps` figure.

use crate::read_path::ReadSample;
use lsmsim_core::{CompactionStyle, VirtualTime};
use serde::{Deserialize, Serialize};

/// One bandwidth-consuming I/O operation, recorded for the windowed
/// throughput calculation
#[derive(Debug, Clone, Copy)]
struct IoEvent {
    start: VirtualTime,
    end: VirtualTime,
    bytes_mb: f64,
}

/// Half-width, in virtual seconds, of the window used for
/// `instantaneous_mbps` (100 ms total window)
const WINDOW_HALF_WIDTH_S: f64 = 0.05;

/// Accumulates the simulator's cumulative counters and exposes derived,
/// point-in-time metrics
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    user_bytes_mb: f64,
    wal_bytes_mb: f64,
    flush_bytes_mb: f64,
    compaction_write_bytes_mb: f64,
    compaction_read_bytes_mb: f64,
    trivial_move_bytes_mb: f64,
    deleted_bytes_mb: f64,
    num_flushes: u64,
    num_compactions: u64,
    num_stalls: u64,
    max_stalled_write_count: u64,
    current_stalled_write_count: u64,
    stall_duration_s: f64,
    stall_start: Option<VirtualTime>,
    io_log: Vec<IoEvent>,
    compaction_style: CompactionStyle,
    io_throughput_mbps: f64,
    max_background_jobs: usize,
    buffer_capacity_mb: f64,
    worst_case_compaction_bytes_mb: f64,
    last_read_sample: ReadSample,
    last_read_amplification: f64,
}

impl MetricsAggregator {
    /// Creates a fresh aggregator with all counters zeroed
    pub fn new(
        compaction_style: CompactionStyle,
        io_throughput_mbps: f64,
        max_background_jobs: usize,
        buffer_capacity_mb: f64,
        worst_case_compaction_bytes_mb: f64,
    ) -> Self {
        Self {
            user_bytes_mb: 0.0,
            wal_bytes_mb: 0.0,
            flush_bytes_mb: 0.0,
            compaction_write_bytes_mb: 0.0,
            compaction_read_bytes_mb: 0.0,
            trivial_move_bytes_mb: 0.0,
            deleted_bytes_mb: 0.0,
            num_flushes: 0,
            num_compactions: 0,
            num_stalls: 0,
            max_stalled_write_count: 0,
            current_stalled_write_count: 0,
            stall_duration_s: 0.0,
            stall_start: None,
            io_log: Vec::new(),
            compaction_style,
            io_throughput_mbps,
            max_background_jobs,
            buffer_capacity_mb,
            worst_case_compaction_bytes_mb,
            last_read_sample: ReadSample::default(),
            last_read_amplification: 0.0,
        }
    }

    /// Records the most recent §4.6 read-path sample and its §4.7
    /// `read_amplification`, surfaced verbatim in [`MetricsSnapshot`]
    pub fn record_read_sample(&mut self, sample: ReadSample, read_amplification: f64) {
        self.last_read_sample = sample;
        self.last_read_amplification = read_amplification;
    }

    /// Records a user write of `size_mb`
    pub fn record_user_write(&mut self, size_mb: f64) {
        self.user_bytes_mb += size_mb;
    }

    /// Records a WAL append of `size_mb`, spanning `[start, end]`
    pub fn record_wal_write(&mut self, size_mb: f64, start: VirtualTime, end: VirtualTime) {
        self.wal_bytes_mb += size_mb;
        self.push_io(start, end, size_mb);
    }

    /// Records a completed flush producing `output_mb`, spanning `[start,
    /// end]`
    pub fn record_flush(&mut self, output_mb: f64, start: VirtualTime, end: VirtualTime) {
        self.flush_bytes_mb += output_mb;
        self.num_flushes += 1;
        self.push_io(start, end, output_mb);
    }

    /// Records a completed compaction job's result, spanning `[start, end]`
    pub fn record_compaction(
        &mut self,
        input_mb: f64,
        output_mb: f64,
        moved_mb: f64,
        deleted_mb: f64,
        start: VirtualTime,
        end: VirtualTime,
    ) {
        self.compaction_read_bytes_mb += input_mb;
        self.compaction_write_bytes_mb += output_mb;
        self.trivial_move_bytes_mb += moved_mb;
        self.deleted_bytes_mb += deleted_mb;
        self.num_compactions += 1;
        self.push_io(start, end, input_mb + output_mb);
    }

    /// Marks the start of a new write stall, if one is not already active
    pub fn begin_stall(&mut self, now: VirtualTime) {
        if self.stall_start.is_none() {
            self.stall_start = Some(now);
            self.num_stalls += 1;
        }
        self.current_stalled_write_count += 1;
        self.max_stalled_write_count = self.max_stalled_write_count.max(self.current_stalled_write_count);
    }

    /// Clears stall state once the backlog drains, accumulating the elapsed
    /// stall duration
    pub fn end_stall(&mut self, now: VirtualTime) {
        if let Some(start) = self.stall_start.take() {
            self.stall_duration_s += now - start;
        }
        self.current_stalled_write_count = 0;
    }

    /// `true` if a write stall is currently active
    pub fn is_stalled(&self) -> bool {
        self.stall_start.is_some()
    }

    /// Total bytes written by user inserts, MB
    pub fn user_bytes_mb(&self) -> f64 {
        self.user_bytes_mb
    }

    /// Write amplification excluding WAL bytes
    pub fn write_amplification(&self) -> f64 {
        if self.user_bytes_mb <= 0.0 {
            return 0.0;
        }
        (self.flush_bytes_mb + self.compaction_write_bytes_mb) / self.user_bytes_mb
    }

    /// Write amplification including WAL bytes
    pub fn write_amplification_with_wal(&self) -> f64 {
        if self.user_bytes_mb <= 0.0 {
            return 0.0;
        }
        (self.wal_bytes_mb + self.flush_bytes_mb + self.compaction_write_bytes_mb) / self.user_bytes_mb
    }

    /// Space amplification, approximated as `total_disk_mb /
    /// (user_bytes_mb × compaction_reduction_factor^depth)`
    ///
    /// `depth` approximates the number of levels the data has logically
    /// passed through; since individual keys are not tracked, this uses the
    /// caller-supplied `avg_depth` (typically `base_level` or deeper) as a
    /// stand-in. This is the approximation flagged as an open question: the
    /// exact "logical live data size" after repeated overwrites is
    /// ill-defined without per-key tracking.
    pub fn space_amplification(&self, total_disk_mb: f64, reduction_factor: f64, avg_depth: f64) -> f64 {
        let denominator = self.user_bytes_mb * reduction_factor.powf(avg_depth.max(0.0));
        if denominator <= 0.0 {
            return 0.0;
        }
        total_disk_mb / denominator
    }

    /// Fraction of the trailing 100 ms of virtual time the disk token was
    /// busy
    pub fn disk_utilization_percent(&self, now: VirtualTime, disk_busy_until: VirtualTime) -> f64 {
        let window_start = (now - 0.1).max(0.0);
        let busy = disk_busy_until.min(now).max(window_start);
        let window = (now - window_start).max(f64::MIN_POSITIVE);
        ((busy - window_start).max(0.0) / window * 100.0).min(100.0)
    }

    /// Sum of bandwidth across every I/O operation whose interval
    /// intersects `[now - 0.05, now + 0.05]`, rescaled down proportionally
    /// if it would exceed `io_throughput_mbps`
    pub fn instantaneous_mbps(&mut self, now: VirtualTime) -> f64 {
        self.io_log.retain(|e| e.end >= now - WINDOW_HALF_WIDTH_S * 4.0);
        let window_start = now - WINDOW_HALF_WIDTH_S;
        let window_end = now + WINDOW_HALF_WIDTH_S;
        let raw: f64 = self
            .io_log
            .iter()
            .filter(|e| e.start <= window_end && e.end >= window_start)
            .map(|e| e.bytes_mb)
            .sum();
        if raw > self.io_throughput_mbps && raw > 0.0 {
            self.io_throughput_mbps
        } else {
            raw
        }
    }

    /// Estimated maximum sustainable write rate given the current
    /// compaction style's calibrated overhead multiplier
    pub fn max_sustainable_mbps(&self) -> f64 {
        let overhead = match self.compaction_style {
            CompactionStyle::Leveled => 5.4,
            CompactionStyle::Universal => 3.6,
            CompactionStyle::Fifo => 1.0,
        };
        self.io_throughput_mbps / (1.0 + overhead)
    }

    /// Estimated minimum sustainable burst absorption rate before stalls
    /// set in
    pub fn min_sustainable_mbps(&self) -> f64 {
        let worst_case_burst_duration_s = self.max_background_jobs as f64
            * self.worst_case_compaction_bytes_mb
            / self.io_throughput_mbps.max(f64::MIN_POSITIVE);
        if worst_case_burst_duration_s <= 0.0 {
            return 0.0;
        }
        self.buffer_capacity_mb / worst_case_burst_duration_s
    }

    /// Cumulative counters snapshot, per the stable `MetricsSnapshot`
    /// interface
    pub fn snapshot(&mut self, now: VirtualTime, total_disk_mb: f64, reduction_factor: f64, avg_depth: f64, disk_busy_until: VirtualTime, is_oom_killed: bool) -> MetricsSnapshot {
        MetricsSnapshot {
            user_bytes_mb: self.user_bytes_mb,
            wal_bytes_mb: self.wal_bytes_mb,
            flush_bytes_mb: self.flush_bytes_mb,
            compaction_write_bytes_mb: self.compaction_write_bytes_mb,
            compaction_read_bytes_mb: self.compaction_read_bytes_mb,
            trivial_move_bytes_mb: self.trivial_move_bytes_mb,
            deleted_bytes_mb: self.deleted_bytes_mb,
            num_flushes: self.num_flushes,
            num_compactions: self.num_compactions,
            stalled_write_count: self.num_stalls,
            max_stalled_write_count: self.max_stalled_write_count,
            stall_duration_seconds: self.stall_duration_s,
            is_stalled: self.is_stalled(),
            is_oom_killed,
            write_amplification: self.write_amplification(),
            write_amplification_with_wal: self.write_amplification_with_wal(),
            space_amplification: self.space_amplification(total_disk_mb, reduction_factor, avg_depth),
            disk_utilization_percent: self.disk_utilization_percent(now, disk_busy_until),
            instantaneous_mbps: self.instantaneous_mbps(now),
            max_sustainable_mbps: self.max_sustainable_mbps(),
            min_sustainable_mbps: self.min_sustainable_mbps(),
            read_avg_latency_s: self.last_read_sample.avg_latency_s,
            read_p50_latency_s: self.last_read_sample.p50_latency_s,
            read_p99_latency_s: self.last_read_sample.p99_latency_s,
            read_bandwidth_mbps: self.last_read_sample.read_bandwidth_mbps,
            read_amplification: self.last_read_amplification,
        }
    }

    fn push_io(&mut self, start: VirtualTime, end: VirtualTime, bytes_mb: f64) {
        self.io_log.push(IoEvent { start, end, bytes_mb });
    }
}

/// The stable, serializable metrics interface consumed by UI and batch
/// tooling (lowerCamelCase field names per the versioned snapshot contract)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Cumulative bytes written by user inserts, MB
    pub user_bytes_mb: f64,
    /// Cumulative bytes appended to the WAL, MB
    pub wal_bytes_mb: f64,
    /// Cumulative bytes written by flushes, MB
    pub flush_bytes_mb: f64,
    /// Cumulative bytes written by compactions, MB
    pub compaction_write_bytes_mb: f64,
    /// Cumulative bytes read by compactions, MB
    pub compaction_read_bytes_mb: f64,
    /// Cumulative bytes relocated by trivial moves, MB
    pub trivial_move_bytes_mb: f64,
    /// Cumulative bytes dropped by FIFO deletion, MB
    pub deleted_bytes_mb: f64,
    /// Total number of completed flushes
    pub num_flushes: u64,
    /// Total number of completed compactions
    pub num_compactions: u64,
    /// Total number of distinct stall episodes
    pub stalled_write_count: u64,
    /// Highest concurrent stalled-write count observed
    pub max_stalled_write_count: u64,
    /// Cumulative virtual seconds spent stalled
    pub stall_duration_seconds: f64,
    /// Whether a write stall is active right now
    pub is_stalled: bool,
    /// Whether the simulator has entered the fatal OOM-killed state
    pub is_oom_killed: bool,
    /// `(flush + compaction write bytes) / user bytes`
    pub write_amplification: f64,
    /// `write_amplification` including WAL bytes in the numerator
    pub write_amplification_with_wal: f64,
    /// Approximated total-disk / logical-live-data ratio
    pub space_amplification: f64,
    /// Fraction of the trailing 100ms busy with disk I/O
    pub disk_utilization_percent: f64,
    /// Windowed write bandwidth, MB/s
    pub instantaneous_mbps: f64,
    /// Calibrated maximum sustainable write rate, MB/s
    pub max_sustainable_mbps: f64,
    /// Calibrated minimum sustainable burst-absorption rate, MB/s
    pub min_sustainable_mbps: f64,
    /// Mean read latency over the most recent read-path sample interval,
    /// seconds (0 if the read workload is disabled or no interval has
    /// elapsed yet)
    pub read_avg_latency_s: f64,
    /// 50th percentile read latency over the most recent sample interval,
    /// seconds
    pub read_p50_latency_s: f64,
    /// 99th percentile read latency over the most recent sample interval,
    /// seconds
    pub read_p99_latency_s: f64,
    /// Estimated read bandwidth over the most recent sample interval, MB/s
    pub read_bandwidth_mbps: f64,
    /// Point-lookup file fan-out (`1 + |immutable| + |L0 files| + |non-empty
    /// levels below L0|`) at the most recent sample
    pub read_amplification: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(CompactionStyle::Leveled, 500.0, 2, 256.0, 1600.0)
    }

    #[test]
    fn write_amplification_is_zero_before_any_user_bytes() {
        let agg = aggregator();
        assert_eq!(agg.write_amplification(), 0.0);
    }

    #[test]
    fn write_amplification_reflects_flush_and_compaction() {
        let mut agg = aggregator();
        agg.record_user_write(10.0);
        agg.record_flush(9.0, 0.0, 1.0);
        agg.record_compaction(9.0, 8.0, 0.0, 0.0, 1.0, 2.0);
        assert!((agg.write_amplification() - 17.0 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn stall_tracks_duration() {
        let mut agg = aggregator();
        agg.begin_stall(1.0);
        assert!(agg.is_stalled());
        agg.end_stall(3.0);
        assert!(!agg.is_stalled());
        assert!((agg.stall_duration_s - 2.0).abs() < 1e-9);
    }

    #[test]
    fn instantaneous_mbps_sums_overlapping_window() {
        let mut agg = aggregator();
        agg.record_flush(5.0, 9.98, 10.0);
        let rate = agg.instantaneous_mbps(10.0);
        assert!(rate > 0.0);
    }

    #[test]
    fn max_sustainable_differs_by_style() {
        let leveled = MetricsAggregator::new(CompactionStyle::Leveled, 500.0, 2, 256.0, 1600.0);
        let universal = MetricsAggregator::new(CompactionStyle::Universal, 500.0, 2, 256.0, 1600.0);
        assert!(universal.max_sustainable_mbps() > leveled.max_sustainable_mbps());
    }
}
