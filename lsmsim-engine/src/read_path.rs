//! Optional statistical read-path model
//!
//! Rather than simulate individual request events, a periodic tick samples
//! a fixed batch of per-request latencies proportional to the configured
//! request-class mixture and folds them into a [`ReadSample`]. Cost is
//! therefore O(1) per tick regardless of `requests_per_sec`.

use crate::distributions::SimRng;
use lsmsim_core::ReadWorkloadConfig;

/// Number of synthetic per-request latencies sampled per metrics interval
const SAMPLES_PER_INTERVAL: usize = 1000;

/// One interval's aggregate read-path observation
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadSample {
    /// Mean latency across all sampled requests this interval, seconds
    pub avg_latency_s: f64,
    /// 50th percentile latency, seconds
    pub p50_latency_s: f64,
    /// 99th percentile latency, seconds
    pub p99_latency_s: f64,
    /// Estimated read bandwidth this interval, MB/s
    pub read_bandwidth_mbps: f64,
}

/// Computes the engine's `read_amplification`: how many files a point
/// lookup is expected to probe
///
/// `1 + |immutable_memtables| + |L0_files| + |non_empty_levels_below_L0|`
pub fn read_amplification(
    num_immutable: usize,
    l0_file_count: usize,
    non_empty_levels_below_l0: usize,
) -> f64 {
    1.0 + num_immutable as f64 + l0_file_count as f64 + non_empty_levels_below_l0 as f64
}

/// Samples one metrics interval's worth of read-path latencies
///
/// `interval_s` is the wall-of-virtual-time width of this tick;
/// `read_amplification` is the current point-lookup fan-out (see
/// [`read_amplification`]); `block_size_kb` is the nominal unit of data a
/// point lookup returns, used for bandwidth estimation.
pub fn sample_interval(
    config: &ReadWorkloadConfig,
    interval_s: f64,
    read_amplification: f64,
    block_size_kb: f64,
    rng: &mut SimRng,
) -> ReadSample {
    if !config.enabled || interval_s <= 0.0 {
        return ReadSample::default();
    }

    let total_requests = config.requests_per_sec * interval_s;
    if total_requests <= 0.0 {
        return ReadSample::default();
    }

    let cache_hits = total_requests * config.cache_hit_rate;
    let bloom_negatives = total_requests * config.bloom_negative_rate;
    let scans = total_requests * config.scan_rate;
    let point_lookups = (total_requests - cache_hits - bloom_negatives - scans).max(0.0);

    let mut latencies = Vec::with_capacity(SAMPLES_PER_INTERVAL);
    let class_weights = [cache_hits, bloom_negatives, point_lookups, scans];
    let total_weight = class_weights.iter().sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..SAMPLES_PER_INTERVAL {
        let pick = rng.uniform_float() * total_weight;
        let mut cumulative = 0.0;
        let mut chosen = 3;
        for (class, weight) in class_weights.iter().enumerate() {
            cumulative += weight;
            if pick < cumulative {
                chosen = class;
                break;
            }
        }
        let latency = match chosen {
            0 => rng.sample_latency(&config.cache_hit_latency_spec),
            1 => rng.sample_latency(&config.bloom_negative_latency_spec),
            2 => {
                let reps = read_amplification.max(1.0).round() as usize;
                (0..reps)
                    .map(|_| rng.sample_latency(&config.point_lookup_latency_spec))
                    .fold(0.0_f64, f64::max)
            }
            _ => rng.sample_latency(&config.scan_latency_spec),
        };
        latencies.push(latency);
    }
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
    let p50 = percentile(&latencies, 0.50);
    let p99 = percentile(&latencies, 0.99);

    let point_lookups_per_sec = point_lookups / interval_s;
    let scans_per_sec = scans / interval_s;
    let block_size_mb = block_size_kb / 1024.0;
    let read_bandwidth_mbps = point_lookups_per_sec * block_size_mb * read_amplification
        + scans_per_sec * (config.avg_scan_size_kb / 1024.0);

    ReadSample {
        avg_latency_s: avg,
        p50_latency_s: p50,
        p99_latency_s: p99,
        read_bandwidth_mbps,
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsmsim_core::LatencySpec;

    fn config() -> ReadWorkloadConfig {
        ReadWorkloadConfig {
            enabled: true,
            requests_per_sec: 1000.0,
            cache_hit_rate: 0.5,
            bloom_negative_rate: 0.1,
            scan_rate: 0.05,
            cache_hit_latency_spec: LatencySpec::Fixed { mean: 0.0001 },
            bloom_negative_latency_spec: LatencySpec::Fixed { mean: 0.0005 },
            point_lookup_latency_spec: LatencySpec::Exponential { mean: 0.001 },
            scan_latency_spec: LatencySpec::Exponential { mean: 0.005 },
            avg_scan_size_kb: 64.0,
        }
    }

    #[test]
    fn disabled_workload_yields_zero_sample() {
        let config = ReadWorkloadConfig::default();
        let mut rng = SimRng::from_seed(1);
        let sample = sample_interval(&config, 1.0, 3.0, 4.0, &mut rng);
        assert_eq!(sample.avg_latency_s, 0.0);
    }

    #[test]
    fn enabled_workload_yields_positive_latencies() {
        let mut rng = SimRng::from_seed(2);
        let sample = sample_interval(&config(), 1.0, 3.0, 4.0, &mut rng);
        assert!(sample.avg_latency_s > 0.0);
        assert!(sample.p99_latency_s >= sample.p50_latency_s);
        assert!(sample.read_bandwidth_mbps >= 0.0);
    }

    #[test]
    fn read_amplification_counts_memtables_l0_and_levels() {
        assert_eq!(read_amplification(1, 3, 2), 7.0);
        assert_eq!(read_amplification(0, 0, 0), 1.0);
    }
}
