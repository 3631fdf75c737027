//! Batch runner for the LSM simulation engine
//!
//! Reads a JSON [`SimulatorConfig`], steps the simulator until virtual time
//! reaches the requested duration (or the event queue empties), and writes
//! a JSON report of the final config, metrics, and state snapshot.

use clap::Parser;
use lsmsim_core::SimulatorConfig;
use lsmsim_engine::Simulator;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Runs an LSM-tree compaction simulation and reports the resulting
/// metrics and state
#[derive(Debug, Parser)]
#[command(name = "lsmsim", version, about)]
struct Cli {
    /// Path to a JSON simulator configuration
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// Virtual seconds to simulate
    #[arg(long, value_name = "SECONDS")]
    duration: f64,

    /// Path to write the JSON report; defaults to stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Informational playback speed multiplier; does not affect stepping,
    /// only the reported `realTime` figure
    #[arg(long, default_value_t = 1.0, value_name = "MULTIPLIER")]
    speed: f64,

    /// Emit debug-level logging
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    config: SimulatorConfig,
    virtual_time: f64,
    real_time: f64,
    metrics: lsmsim_engine::MetricsSnapshot,
    state: lsmsim_engine::StateSnapshot,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(RunOutcome::Ok) => ExitCode::from(0),
        Ok(RunOutcome::OomKilled) => ExitCode::from(3),
        Err(RunError::BadArgs(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(1)
        }
        Err(RunError::InvalidConfig(msg)) => {
            eprintln!("error: invalid configuration: {msg}");
            ExitCode::from(2)
        }
    }
}

enum RunOutcome {
    Ok,
    OomKilled,
}

enum RunError {
    BadArgs(String),
    InvalidConfig(String),
}

fn run(cli: &Cli) -> Result<RunOutcome, RunError> {
    if cli.duration < 0.0 {
        return Err(RunError::BadArgs("--duration must be non-negative".into()));
    }
    if cli.speed <= 0.0 {
        return Err(RunError::BadArgs("--speed must be positive".into()));
    }

    let config_text = std::fs::read_to_string(&cli.config)
        .map_err(|e| RunError::BadArgs(format!("reading {}: {e}", cli.config.display())))?;
    let config: SimulatorConfig = serde_json::from_str(&config_text)
        .map_err(|e| RunError::BadArgs(format!("parsing {}: {e}", cli.config.display())))?;

    let mut sim =
        Simulator::new(config.clone()).map_err(|e| RunError::InvalidConfig(e.to_string()))?;

    let result = sim.step(cli.duration);

    let report = Report {
        config,
        virtual_time: sim.virtual_time(),
        real_time: sim.virtual_time() / cli.speed,
        metrics: sim.metrics(),
        state: sim.state(),
    };
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| RunError::BadArgs(format!("serializing report: {e}")))?;

    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .map_err(|e| RunError::BadArgs(format!("writing {}: {e}", path.display())))?,
        None => println!("{json}"),
    }

    if result.is_oom_killed {
        Ok(RunOutcome::OomKilled)
    } else {
        Ok(RunOutcome::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn run_with_valid_config_produces_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = SimulatorConfig::default();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let cli = Cli {
            config: file.path().to_path_buf(),
            duration: 1.0,
            output: None,
            speed: 1.0,
            verbose: false,
        };
        let outcome = run(&cli);
        assert!(matches!(outcome, Ok(RunOutcome::Ok)));
    }

    #[test]
    fn run_with_missing_config_file_is_bad_args() {
        let cli = Cli {
            config: PathBuf::from("/nonexistent/path/config.json"),
            duration: 1.0,
            output: None,
            speed: 1.0,
            verbose: false,
        };
        let outcome = run(&cli);
        assert!(matches!(outcome, Err(RunError::BadArgs(_))));
    }

    #[test]
    fn run_with_invalid_config_is_invalid_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut config = SimulatorConfig::default();
        config.num_levels = 0;
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let cli = Cli {
            config: file.path().to_path_buf(),
            duration: 1.0,
            output: None,
            speed: 1.0,
            verbose: false,
        };
        let outcome = run(&cli);
        assert!(matches!(outcome, Err(RunError::InvalidConfig(_))));
    }

    #[test]
    fn oom_config_reports_oom_outcome() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = SimulatorConfig {
            max_write_buffer_number: 2,
            memtable_flush_size_mb: 10.0,
            io_throughput_mbps: 1.0,
            max_stalled_write_memory_mb: 5.0,
            traffic: lsmsim_core::TrafficModel::Constant { rate_mbps: 1000.0 },
            ..Default::default()
        };
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let cli = Cli {
            config: file.path().to_path_buf(),
            duration: 5.0,
            output: None,
            speed: 1.0,
            verbose: false,
        };
        let outcome = run(&cli);
        assert!(matches!(outcome, Ok(RunOutcome::OomKilled)));
    }
}
