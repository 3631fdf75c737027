//! The simulator driver
//!
//! Owns every piece of mutable state — the LSM tree, the event queue, the
//! seeded RNG, the active compaction engine, the traffic generator, and the
//! metrics aggregator — and drives them forward exactly as far as an
//! external caller asks, via [`Simulator::step`] or
//! [`Simulator::step_by_delta`]. There is no background thread and no
//! internal timer; virtual time only advances inside those two calls.

use crate::compaction::{CompactionEngine, CompactionJob, Compactor};
use crate::distributions::SimRng;
use crate::event_queue::{Event, EventQueue};
use crate::lsm::{LsmParams, LsmState};
use crate::metrics::MetricsSnapshot;
use crate::read_path::{self, ReadSample};
use crate::traffic::TrafficGenerator;
use lsmsim_core::{Result, SimulatorConfig, VirtualTime};
use log::info;
use serde::{Deserialize, Serialize};

/// Virtual seconds between retries of a stalled write
const STALL_RETRY_INTERVAL_S: VirtualTime = 0.001;
/// Virtual seconds between background compaction-scheduler ticks
const COMPACTION_CHECK_INTERVAL_S: VirtualTime = 1.0;
/// Virtual seconds between read-path metrics samples
const READ_SAMPLE_INTERVAL_S: VirtualTime = 1.0;
/// Per-level file-list cap in [`StateSnapshot`]
const SNAPSHOT_FILE_LIST_CAP: usize = 20;
/// Nominal block size used for read-bandwidth estimation, KB
const BLOCK_SIZE_KB: f64 = 4.0;

/// The simulator's coarse-grained lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorState {
    /// Constructed but never stepped
    Idle,
    /// Has processed at least one event and is not stalled or killed
    Running,
    /// A write stall is currently active
    Paused,
    /// Fatal: stalled backlog exceeded `max_stalled_write_memory_mb`
    OomKilled,
}

/// Outcome of a single `step` / `step_by_delta` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Number of events dispatched during this call
    pub events_processed: u64,
    /// `true` if the simulator entered `oom_killed` during this call
    pub is_oom_killed: bool,
}

/// Outcome of `update_config`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// `true` if the new configuration was applied live
    pub applied: bool,
    /// `true` if applying the new configuration instead requires `reset()`
    pub requires_reset: bool,
}

/// A summary of one in-flight compaction job, for [`StateSnapshot`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionInfo {
    /// Source level
    pub from: usize,
    /// Destination level
    pub to: usize,
    /// Number of source-level files consumed
    pub source_count: usize,
    /// Number of target-level files consumed
    pub target_count: usize,
    /// `true` if this job never leaves L0
    pub is_intra_l0: bool,
    /// Total input size, MB
    pub input_mb: f64,
    /// Output size, MB (0 until complete; estimated here as input x
    /// reduction factor)
    pub output_mb: f64,
}

/// A single level's contents, for [`StateSnapshot`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSnapshot {
    /// Level index
    pub level: usize,
    /// Number of resident files
    pub file_count: usize,
    /// Total resident size, MB
    pub total_mb: f64,
    /// Current size target, MB (0 for L0)
    pub target_mb: f64,
    /// Up to [`SNAPSHOT_FILE_LIST_CAP`] file sizes, MB, in id order
    pub files: Vec<f64>,
    /// `true` if `files` omits some resident files due to the cap
    pub files_truncated: bool,
}

/// The stable, serializable state interface consumed by UI and batch
/// tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Current virtual time
    pub virtual_time: f64,
    /// Current mutable memtable size, MB
    pub memtable_current_mb: f64,
    /// Number of immutable memtables awaiting flush
    pub num_immutable: usize,
    /// Per-level contents
    pub levels: Vec<LevelSnapshot>,
    /// In-flight compaction jobs
    pub active_compactions: Vec<CompactionInfo>,
    /// The dynamic-level-bytes base level (or `1` under static targets)
    pub base_level: usize,
    /// Instantaneous write rate at the current virtual time, MB/s
    pub current_incoming_rate_mbps: f64,
    /// `true` if a write stall is currently active
    pub is_stalled: bool,
    /// `true` if the simulator has entered the fatal OOM-killed state
    pub is_oom_killed: bool,
}

/// The discrete-event LSM-tree simulator
pub struct Simulator {
    config: SimulatorConfig,
    lsm: LsmState,
    queue: EventQueue,
    rng: SimRng,
    compactor: CompactionEngine,
    traffic: TrafficGenerator,
    metrics: crate::metrics::MetricsAggregator,
    disk_busy_until: VirtualTime,
    virtual_time: VirtualTime,
    state: SimulatorState,
    stalled_backlog_mb: f64,
    active_jobs: Vec<CompactionJob>,
    last_read_sample_at: VirtualTime,
    log_hook: Option<Box<dyn Fn(String) + Send>>,
}

impl Simulator {
    /// Constructs a new simulator from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `config` violates any
    /// invariant.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = SimRng::from_seed(config.random_seed);
        let params = LsmParams::from(&config);
        let lsm = LsmState::new(params, 0.0);
        let compactor = CompactionEngine::new(&config);
        let traffic = TrafficGenerator::new(&config.traffic, 0.0, &mut rng);
        let metrics = crate::metrics::MetricsAggregator::new(
            config.compaction_style,
            config.io_throughput_mbps,
            config.max_background_jobs,
            config.memtable_flush_size_mb * config.max_write_buffer_number as f64,
            config.max_compaction_bytes_mb,
        );

        let mut sim = Self {
            config,
            lsm,
            queue: EventQueue::new(),
            rng,
            compactor,
            traffic,
            metrics,
            disk_busy_until: 0.0,
            virtual_time: 0.0,
            state: SimulatorState::Idle,
            stalled_backlog_mb: 0.0,
            active_jobs: Vec::new(),
            last_read_sample_at: 0.0,
            log_hook: None,
        };
        sim.seed_initial_events();
        Ok(sim)
    }

    /// Installs a hook invoked with a human-readable line whenever the
    /// simulator logs a notable event (stall entry/exit, OOM kill)
    pub fn set_log_hook(&mut self, hook: impl Fn(String) + Send + 'static) {
        self.log_hook = Some(Box::new(hook));
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        if let Some(hook) = &self.log_hook {
            hook(message);
        }
    }

    fn seed_initial_events(&mut self) {
        if let Some((t, size_mb)) = self.traffic.next_write(0.0, &mut self.rng) {
            self.queue.push(
                t,
                Event::Write {
                    size_mb,
                    from_generator: true,
                },
            );
        }
        self.queue.push(COMPACTION_CHECK_INTERVAL_S, Event::CompactionCheck);
        if self.config.read_workload.enabled {
            self.queue.push(READ_SAMPLE_INTERVAL_S, Event::ReadSample);
        }
    }

    /// Clears all state and reseeds, discarding any scheduled events
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the current configuration
    /// is somehow no longer valid (should not happen since `update_config`
    /// validates before applying).
    pub fn reset(&mut self) -> Result<()> {
        self.config.validate()?;
        self.rng.reseed(self.config.random_seed);
        let params = LsmParams::from(&self.config);
        self.lsm.reset(params, 0.0);
        self.queue.clear();
        self.compactor = CompactionEngine::new(&self.config);
        self.traffic = TrafficGenerator::new(&self.config.traffic, 0.0, &mut self.rng);
        self.metrics = crate::metrics::MetricsAggregator::new(
            self.config.compaction_style,
            self.config.io_throughput_mbps,
            self.config.max_background_jobs,
            self.config.memtable_flush_size_mb * self.config.max_write_buffer_number as f64,
            self.config.max_compaction_bytes_mb,
        );
        self.disk_busy_until = 0.0;
        self.virtual_time = 0.0;
        self.state = SimulatorState::Idle;
        self.stalled_backlog_mb = 0.0;
        self.active_jobs.clear();
        self.last_read_sample_at = 0.0;
        self.seed_initial_events();
        Ok(())
    }

    /// Validates `new_config` and either applies it live or reports that a
    /// `reset()` is required
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `new_config` violates any
    /// invariant; the simulator's prior state is left unchanged.
    pub fn update_config(&mut self, new_config: SimulatorConfig) -> Result<UpdateOutcome> {
        new_config.validate()?;
        let requires_reset = new_config.requires_reset_from(&self.config);
        if requires_reset {
            return Ok(UpdateOutcome {
                applied: false,
                requires_reset: true,
            });
        }
        self.metrics = crate::metrics::MetricsAggregator::new(
            new_config.compaction_style,
            new_config.io_throughput_mbps,
            new_config.max_background_jobs,
            new_config.memtable_flush_size_mb * new_config.max_write_buffer_number as f64,
            new_config.max_compaction_bytes_mb,
        );
        self.config = new_config;
        Ok(UpdateOutcome {
            applied: true,
            requires_reset: false,
        })
    }

    /// Advances the simulation until the next event's timestamp exceeds
    /// `target_time`, or the queue empties, or an OOM kill occurs
    pub fn step(&mut self, target_time: VirtualTime) -> StepResult {
        let mut events_processed = 0u64;
        if self.state == SimulatorState::OomKilled {
            return StepResult {
                events_processed: 0,
                is_oom_killed: true,
            };
        }
        while let Some(ts) = self.queue.peek_timestamp() {
            if ts > target_time {
                break;
            }
            let (timestamp, event) = self.queue.pop().expect("peeked timestamp implies an event");
            self.virtual_time = timestamp;
            self.dispatch(event);
            events_processed += 1;
            self.schedule_compactions();
            if self.state == SimulatorState::OomKilled {
                break;
            }
        }
        StepResult {
            events_processed,
            is_oom_killed: self.state == SimulatorState::OomKilled,
        }
    }

    /// Advances the simulation by `delta` virtual seconds from the current
    /// time
    pub fn step_by_delta(&mut self, delta: VirtualTime) -> StepResult {
        self.step(self.virtual_time + delta)
    }

    /// Injects a write directly into the queue, bypassing the traffic
    /// generator; used by harnesses and integration tests
    pub fn schedule_write(&mut self, size_mb: f64, at_time: VirtualTime) {
        self.queue.push(
            at_time,
            Event::Write {
                size_mb,
                from_generator: false,
            },
        );
    }

    /// Current virtual time
    pub fn virtual_time(&self) -> VirtualTime {
        self.virtual_time
    }

    /// `true` if a write stall is currently active
    pub fn is_write_stalled(&self) -> bool {
        self.metrics.is_stalled()
    }

    /// `true` if no events remain scheduled
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The active configuration
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// In-flight compaction jobs
    pub fn active_compactions(&self) -> Vec<CompactionInfo> {
        self.active_jobs.iter().map(|job| self.job_info(job)).collect()
    }

    /// The current metrics snapshot
    pub fn metrics(&mut self) -> MetricsSnapshot {
        let total_disk_mb: f64 = (0..self.lsm.num_levels())
            .map(|i| self.lsm.level(i).total_size_mb())
            .sum();
        let avg_depth = self.lsm.base_level() as f64;
        let now = self.virtual_time;
        let disk_busy_until = self.disk_busy_until;
        let is_oom_killed = self.state == SimulatorState::OomKilled;
        self.metrics.snapshot(
            now,
            total_disk_mb,
            self.config.compaction_reduction_factor,
            avg_depth,
            disk_busy_until,
            is_oom_killed,
        )
    }

    /// The current state snapshot
    pub fn state(&mut self) -> StateSnapshot {
        let levels = (0..self.lsm.num_levels())
            .map(|i| self.level_snapshot(i))
            .collect();
        let rate = self.traffic.current_rate_mbps();
        StateSnapshot {
            virtual_time: self.virtual_time,
            memtable_current_mb: self.lsm.mutable_memtable_size_mb(),
            num_immutable: self.lsm.num_immutable(),
            levels,
            active_compactions: self.active_compactions(),
            base_level: self.lsm.base_level(),
            current_incoming_rate_mbps: rate,
            is_stalled: self.metrics.is_stalled(),
            is_oom_killed: self.state == SimulatorState::OomKilled,
        }
    }

    fn level_snapshot(&self, level: usize) -> LevelSnapshot {
        let lvl = self.lsm.level(level);
        let all_files: Vec<f64> = lvl.files.iter().map(|f| f.size_mb).collect();
        let truncated = all_files.len() > SNAPSHOT_FILE_LIST_CAP;
        let files = all_files.into_iter().take(SNAPSHOT_FILE_LIST_CAP).collect();
        LevelSnapshot {
            level,
            file_count: lvl.file_count(),
            total_mb: lvl.total_size_mb(),
            target_mb: self.lsm.level_targets().get(level).copied().unwrap_or(0.0),
            files,
            files_truncated: truncated,
        }
    }

    fn job_info(&self, job: &CompactionJob) -> CompactionInfo {
        CompactionInfo {
            from: job.from_level,
            to: job.to_level,
            source_count: job.source_file_ids.len(),
            target_count: job.target_file_ids.len(),
            is_intra_l0: job.is_intra_l0,
            input_mb: job.input_mb,
            output_mb: job.input_mb * self.config.compaction_reduction_factor,
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Write { size_mb, from_generator } => self.handle_write(size_mb, from_generator),
            Event::Flush {
                size_mb: _,
                memtable_id,
                start_time: _,
            } => self.handle_flush(memtable_id),
            Event::CompactionStart { .. } => {
                // Disk-reservation bookkeeping happens eagerly in
                // schedule_compactions when the job is picked; CompactionStart
                // exists as an explicit queue entry for observability only.
            }
            Event::CompactionComplete { job } => self.handle_compaction_complete(job),
            Event::CompactionCheck => self.handle_compaction_check(),
            Event::ReadSample => self.handle_read_sample(),
        }
    }

    fn handle_write(&mut self, size_mb: f64, from_generator: bool) {
        if from_generator {
            if let Some((t, next_size)) = self.traffic.next_write(self.virtual_time, &mut self.rng) {
                self.queue.push(
                    t,
                    Event::Write {
                        size_mb: next_size,
                        from_generator: true,
                    },
                );
            }
        }
        if size_mb <= 0.0 {
            return;
        }

        if self.config.enable_wal {
            let start = self.virtual_time.max(self.disk_busy_until);
            let sync_s = if self.config.wal_sync {
                self.config.wal_sync_latency_ms / 1000.0
            } else {
                0.0
            };
            let duration = size_mb / self.config.io_throughput_mbps + sync_s;
            let end = start + duration;
            self.disk_busy_until = end;
            self.metrics.record_wal_write(size_mb, start, end);
        }

        if self.lsm.is_immutable_queue_full() {
            self.stalled_backlog_mb += size_mb;
            self.metrics.begin_stall(self.virtual_time);
            if self.state != SimulatorState::OomKilled {
                self.state = SimulatorState::Paused;
            }
            self.queue.push(
                self.virtual_time + STALL_RETRY_INTERVAL_S,
                Event::Write {
                    size_mb,
                    from_generator: false,
                },
            );
            if self.config.max_stalled_write_memory_mb > 0.0
                && self.stalled_backlog_mb > self.config.max_stalled_write_memory_mb
            {
                self.state = SimulatorState::OomKilled;
                self.log(format!(
                    "simulator OOM killed: stalled backlog {:.2}MB exceeds limit {:.2}MB",
                    self.stalled_backlog_mb, self.config.max_stalled_write_memory_mb
                ));
            }
            return;
        }

        self.metrics.record_user_write(size_mb);
        let frozen = self.lsm.add_write(size_mb, self.virtual_time);
        if let Some(memtable_id) = frozen {
            let frozen_size = self
                .lsm
                .immutable_memtable_size(memtable_id)
                .unwrap_or(size_mb);
            self.queue.push(
                self.virtual_time,
                Event::Flush {
                    size_mb: frozen_size,
                    memtable_id,
                    start_time: self.virtual_time,
                },
            );
        }
        self.metrics.end_stall(self.virtual_time);
        if self.state == SimulatorState::Idle || self.state == SimulatorState::Paused {
            self.state = SimulatorState::Running;
        }
    }

    fn handle_flush(&mut self, memtable_id: u64) {
        let Some(file) = self.lsm.flush_memtable(memtable_id, self.virtual_time) else {
            return;
        };
        let start = self.virtual_time.max(self.disk_busy_until);
        let duration = file.size_mb / self.config.io_throughput_mbps + self.config.io_latency_ms / 1000.0;
        let end = start + duration;
        self.disk_busy_until = end;
        self.metrics.record_flush(file.size_mb, start, end);

        if !self.lsm.is_immutable_queue_full() {
            self.metrics.end_stall(self.virtual_time);
        }
    }

    fn handle_compaction_complete(&mut self, job: CompactionJob) {
        let result = self.compactor.execute_compaction(&mut self.lsm, &job);
        let start = job.scheduled_start.unwrap_or(self.virtual_time);
        let end = job.completion_time.unwrap_or(self.virtual_time);
        self.metrics.record_compaction(
            result.input_mb,
            result.output_mb,
            result.moved_mb,
            result.deleted_mb,
            start,
            end,
        );
        self.active_jobs.retain(|j| j != &job);
    }

    fn handle_compaction_check(&mut self) {
        self.queue.push(
            self.virtual_time + COMPACTION_CHECK_INTERVAL_S,
            Event::CompactionCheck,
        );
    }

    fn handle_read_sample(&mut self) {
        let interval_s = (self.virtual_time - self.last_read_sample_at).max(0.0);
        self.last_read_sample_at = self.virtual_time;
        let non_empty_below_l0 = (1..self.lsm.num_levels())
            .filter(|&lvl| self.lsm.level(lvl).file_count() > 0)
            .count();
        let read_amp = read_path::read_amplification(
            self.lsm.num_immutable(),
            self.lsm.level(0).file_count(),
            non_empty_below_l0,
        );
        let sample: ReadSample = read_path::sample_interval(
            &self.config.read_workload,
            interval_s,
            read_amp,
            BLOCK_SIZE_KB,
            &mut self.rng,
        );
        self.metrics.record_read_sample(sample, read_amp);
        self.queue.push(
            self.virtual_time + READ_SAMPLE_INTERVAL_S,
            Event::ReadSample,
        );
    }

    fn schedule_compactions(&mut self) {
        while self.compactor.active_count() < self.config.max_background_jobs
            && self.compactor.needs_compaction(&self.lsm, &self.config)
        {
            let Some(mut job) = self
                .compactor
                .pick_compaction(&mut self.lsm, &self.config, &mut self.rng)
            else {
                break;
            };

            let splittable = job.source_file_ids.len().max(1);
            let divisor = self.config.max_subcompactions.min(splittable).max(1) as f64;
            let output_estimate = job.input_mb * self.config.compaction_reduction_factor;
            let duration =
                (job.input_mb + output_estimate) / self.config.io_throughput_mbps / divisor;

            let start = self.virtual_time.max(self.disk_busy_until);
            let end = start + duration;
            self.disk_busy_until = end;
            job.scheduled_start = Some(start);
            job.completion_time = Some(end);

            self.queue.push(start, Event::CompactionStart { job: job.clone() });
            self.queue.push(end, Event::CompactionComplete { job: job.clone() });
            self.active_jobs.push(job);
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("virtual_time", &self.virtual_time)
            .field("state", &self.state)
            .field("active_jobs", &self.active_jobs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsmsim_core::CompactionStyle;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            num_levels: 7,
            memtable_flush_size_mb: 64.0,
            l0_compaction_trigger: 4,
            max_background_jobs: 2,
            max_bytes_for_level_base_mb: 256.0,
            level_multiplier: 10.0,
            target_file_size_mb: 64.0,
            compaction_reduction_factor: 0.9,
            io_throughput_mbps: 500.0,
            io_latency_ms: 1.0,
            random_seed: 1,
            enable_wal: true,
            wal_sync: false,
            compaction_style: CompactionStyle::Leveled,
            ..Default::default()
        }
    }

    #[test]
    fn new_simulator_starts_idle_with_seeded_events() {
        let sim = Simulator::new(config()).unwrap();
        assert_eq!(sim.virtual_time(), 0.0);
        assert!(!sim.is_queue_empty());
    }

    #[test]
    fn zero_rate_traffic_only_schedules_compaction_checks() {
        let mut cfg = config();
        cfg.traffic = lsmsim_core::TrafficModel::Constant { rate_mbps: 0.0 };
        let mut sim = Simulator::new(cfg).unwrap();
        let result = sim.step(5.0);
        assert!(result.events_processed > 0);
        let mut metrics = sim.metrics();
        assert_eq!(metrics.num_flushes, 0);
    }

    #[test]
    fn single_write_then_idle_produces_one_flush_and_unit_amplification() {
        let mut cfg = config();
        cfg.traffic = lsmsim_core::TrafficModel::Constant { rate_mbps: 0.0 };
        let mut sim = Simulator::new(cfg).unwrap();
        sim.schedule_write(100.0, 0.0);
        let result = sim.step(60.0);
        assert!(result.events_processed > 0);
        let metrics = sim.metrics();
        assert_eq!(metrics.num_flushes, 1);
        assert!((metrics.write_amplification - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stall_triggers_when_immutable_queue_fills() {
        let mut cfg = config();
        cfg.max_write_buffer_number = 2;
        cfg.memtable_flush_size_mb = 10.0;
        cfg.io_throughput_mbps = 1.0;
        let mut sim = Simulator::new(cfg).unwrap();
        for i in 0..5 {
            sim.schedule_write(10.0, i as f64 * 0.0001);
        }
        sim.step(0.01);
        assert!(sim.is_write_stalled() || sim.metrics().stalled_write_count > 0);
    }

    #[test]
    fn oom_kill_stops_further_processing() {
        let mut cfg = config();
        cfg.max_write_buffer_number = 2;
        cfg.memtable_flush_size_mb = 10.0;
        cfg.io_throughput_mbps = 1.0;
        cfg.max_stalled_write_memory_mb = 5.0;
        let mut sim = Simulator::new(cfg).unwrap();
        for i in 0..20 {
            sim.schedule_write(50.0, i as f64 * 0.00001);
        }
        let result = sim.step(1.0);
        assert!(result.is_oom_killed);
        let again = sim.step(2.0);
        assert_eq!(again.events_processed, 0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut sim = Simulator::new(config()).unwrap();
        sim.schedule_write(100.0, 0.0);
        sim.step(10.0);
        sim.reset().unwrap();
        assert_eq!(sim.virtual_time(), 0.0);
        assert_eq!(sim.metrics().num_flushes, 0);
    }

    #[test]
    fn update_config_requires_reset_for_structural_change() {
        let mut sim = Simulator::new(config()).unwrap();
        let mut new_cfg = sim.config().clone();
        new_cfg.num_levels = 5;
        let outcome = sim.update_config(new_cfg).unwrap();
        assert!(outcome.requires_reset);
        assert!(!outcome.applied);
    }

    #[test]
    fn update_config_applies_dynamic_change_live() {
        let mut sim = Simulator::new(config()).unwrap();
        let mut new_cfg = sim.config().clone();
        new_cfg.io_throughput_mbps = 1000.0;
        let outcome = sim.update_config(new_cfg).unwrap();
        assert!(outcome.applied);
        assert!(!outcome.requires_reset);
        assert_eq!(sim.config().io_throughput_mbps, 1000.0);
    }
}
