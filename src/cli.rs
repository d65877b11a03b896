use clap::Parser;
use std::path::PathBuf;

use crate::core::scheduler::StrategyKind;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Animated weather map overlay scheduler (simulated renderer demo)
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Scenario JSON: animator settings, time axis, extent and layers
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Materialization strategy (overrides the scenario)
    #[arg(short = 's', long = "strategy", value_parser = parse_strategy)]
    pub strategy: Option<StrategyKind>,

    /// Maximum concurrent fetches (overrides the scenario)
    #[arg(short = 'j', long = "concurrency", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Animation steps to play before exiting
    #[arg(short = 'n', long = "steps", value_name = "N", default_value_t = 12)]
    pub steps: usize,

    /// Playback delay between steps
    #[arg(long = "delay-ms", value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Simulated fetch latency
    #[arg(long = "latency-ms", value_name = "MS", default_value_t = 120)]
    pub latency_ms: u64,

    /// Fail every Nth simulated fetch (0 = never)
    #[arg(long = "fail-every", value_name = "N", default_value_t = 0)]
    pub fail_every: u32,

    /// Fetch worker threads (default: 75% of cores)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Persist layer visibility/opacity in the data directory
    #[arg(long = "prefs")]
    pub prefs: bool,

    /// Enable logging to file (default: wxloop.log in the data directory)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "eager" => Ok(StrategyKind::Eager),
        "lazy" => Ok(StrategyKind::Lazy),
        other => Err(format!("unknown strategy '{}' (expected eager or lazy)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["wxloop", "scene.json", "-s", "lazy", "-j", "2", "-vv"]).unwrap();
        assert_eq!(args.scenario, PathBuf::from("scene.json"));
        assert_eq!(args.strategy, Some(StrategyKind::Lazy));
        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.steps, 12);
        assert!(args.log_file.is_none());
    }

    #[test]
    fn test_log_flag_without_file() {
        let args = Args::try_parse_from(["wxloop", "scene.json", "--log"]).unwrap();
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_bad_strategy() {
        assert!(Args::try_parse_from(["wxloop", "scene.json", "--strategy", "greedy"]).is_err());
    }
}
