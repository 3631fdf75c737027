//! Concrete end-to-end scenarios exercising the full simulator driver
//!
//! Each test mirrors a documented run configuration and checks the
//! expected qualitative outcome rather than exact numeric values, since the
//! statistical overlap and traffic models make exact byte counts
//! seed-sensitive by design.

use lsmsim_core::{CompactionStyle, QueueMode, SimulatorConfig, TrafficModel};
use lsmsim_engine::Simulator;

fn base_config() -> SimulatorConfig {
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
        ..Default::default()
    }
}

#[test]
fn steady_10_mbps_leveled_600s_keeps_write_amplification_in_band() {
    let mut config = base_config();
    config.compaction_style = CompactionStyle::Leveled;
    config.traffic = TrafficModel::Constant { rate_mbps: 10.0 };

    let mut sim = Simulator::new(config).unwrap();
    let result = sim.step(600.0);
    assert!(!result.is_oom_killed);

    let metrics = sim.metrics();
    assert!(
        metrics.write_amplification >= 2.0 && metrics.write_amplification <= 6.0,
        "write_amplification {} out of expected band",
        metrics.write_amplification
    );

    let state = sim.state();
    assert_eq!(state.levels[5].file_count, 0, "L5 should stay empty");
    assert_eq!(state.levels[6].file_count, 0, "L6 should stay empty");
    assert!(state.levels[0].file_count <= 5, "L0 should stay near the trigger");
}

#[test]
fn steady_250_mbps_leveled_120s_produces_stalls_and_high_amplification() {
    let mut config = base_config();
    config.compaction_style = CompactionStyle::Leveled;
    config.traffic = TrafficModel::Constant { rate_mbps: 250.0 };

    let mut sim = Simulator::new(config).unwrap();
    let result = sim.step(120.0);
    assert!(!result.is_oom_killed);

    let metrics = sim.metrics();
    assert!(metrics.stall_duration_seconds > 0.0);
    assert!(metrics.write_amplification > 5.0);
}

#[test]
fn steady_50_mbps_universal_300s_bounds_sorted_run_count() {
    let mut config = base_config();
    config.compaction_style = CompactionStyle::Universal;
    config.max_size_amplification_percent = 150.0;
    config.traffic = TrafficModel::Constant { rate_mbps: 50.0 };

    let mut sim = Simulator::new(config).unwrap();
    let result = sim.step(300.0);
    assert!(!result.is_oom_killed);

    let state = sim.state();
    let run_count: usize = state.levels.iter().map(|l| l.file_count.min(1)).sum::<usize>()
        + state.levels[0].file_count;
    assert!(run_count < 1000, "sorted run count should stay bounded, got {run_count}");

    let metrics = sim.metrics();
    assert!(metrics.num_compactions > 0, "expected at least one compaction to trigger");
}

#[test]
fn single_write_then_idle_yields_one_flush_and_unit_amplification() {
    let mut config = base_config();
    config.traffic = TrafficModel::Constant { rate_mbps: 0.0 };

    let mut sim = Simulator::new(config).unwrap();
    sim.schedule_write(100.0, 0.0);
    sim.step(60.0);

    let metrics = sim.metrics();
    assert_eq!(metrics.num_flushes, 1);
    assert_eq!(metrics.num_compactions, 0);
    assert!((metrics.write_amplification - 1.0).abs() < 1e-6);
}

#[test]
fn advanced_traffic_rate_never_negative_and_bytes_in_rough_band() {
    let mut config = base_config();
    config.random_seed = 42;
    config.traffic = TrafficModel::Advanced {
        base_rate_mbps: 30.0,
        burst_multiplier: 3.0,
        lognormal_sigma: 0.2,
        on_mean_s: 5.0,
        off_mean_s: 10.0,
        erlang_k: 2,
        spike_rate_per_s: 0.02,
        spike_mean_dur_s: 1.0,
        spike_amplitude_mean: 10.0,
        spike_amplitude_sigma: 0.3,
        capacity_limit_mbps: 0.0,
        queue_mode: QueueMode::Drop,
    };

    let mut sim = Simulator::new(config).unwrap();
    sim.step(300.0);

    let metrics = sim.metrics();
    assert!(metrics.user_bytes_mb > 0.0);

    let state = sim.state();
    assert!(state.current_incoming_rate_mbps >= 0.0);
}

#[test]
fn oom_kill_transitions_state_and_stops_further_steps() {
    let mut config = base_config();
    config.max_stalled_write_memory_mb = 100.0;
    config.io_throughput_mbps = 50.0;
    config.traffic = TrafficModel::Constant { rate_mbps: 1000.0 };

    let mut sim = Simulator::new(config).unwrap();
    let result = sim.step(60.0);
    assert!(result.is_oom_killed);

    let again = sim.step(120.0);
    assert_eq!(again.events_processed, 0);
    assert!(again.is_oom_killed);
}

#[test]
fn l0_compaction_becomes_eligible_exactly_at_trigger_file_count() {
    let mut config = base_config();
    config.traffic = TrafficModel::Constant { rate_mbps: 0.0 };
    config.l0_compaction_trigger = 4;
    config.memtable_flush_size_mb = 10.0;

    let mut sim = Simulator::new(config).unwrap();
    for i in 0..3 {
        sim.schedule_write(10.0, i as f64 * 0.01);
    }
    sim.step(1.0);
    assert_eq!(sim.metrics().num_compactions, 0);

    sim.schedule_write(10.0, 1.0);
    sim.step(5.0);
    assert!(sim.metrics().num_compactions >= 1);
}

#[test]
fn filling_write_buffers_stalls_within_one_write_event() {
    let mut config = base_config();
    config.traffic = TrafficModel::Constant { rate_mbps: 0.0 };
    config.max_write_buffer_number = 2;
    config.memtable_flush_size_mb = 10.0;
    config.io_throughput_mbps = 0.001;

    let mut sim = Simulator::new(config).unwrap();
    sim.schedule_write(10.0, 0.0);
    sim.schedule_write(10.0, 0.0);
    sim.schedule_write(10.0, 0.0);
    sim.step(0.01);

    assert!(sim.is_write_stalled());
}
