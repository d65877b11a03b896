use wxloop::cli::Args;
use wxloop::config::Scenario;
use wxloop::core::animator::Animator;
use wxloop::core::event_bus::Notification;
use wxloop::core::prefs::JsonPreferenceStore;
use wxloop::entities::IntervalStatus;
use wxloop::paths::{self, PathConfig};
use wxloop::sim::{SimOptions, SimRenderer};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Host loop period
const TICK: Duration = Duration::from_millis(5);

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file("wxloop.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn describe(n: &Notification) -> String {
    match n {
        Notification::Reload { load_id } => format!("reload {}", load_id),
        Notification::Loaded { load_id } => format!("loaded {}", load_id),
        Notification::Ready { load_id } => format!("ready {}", load_id),
        Notification::LoadError(p) => format!("error {} @{}: {}", p.layer_id, p.sample_time, p.message),
        Notification::IntervalsChanged { intervals, .. } => {
            let ready = intervals.iter().filter(|i| i.status == IntervalStatus::Ready).count();
            format!("intervals {}/{} ready", ready, intervals.len())
        }
        Notification::TimeChanged { time } => format!("time {}", time),
        Notification::PlayStateChanged { playing } => format!("playing={}", playing),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(strategy) = args.strategy {
        scenario.animator.strategy = strategy;
    }
    if let Some(n) = args.concurrency {
        scenario.animator.max_concurrency = n;
    }
    let config = scenario.animator.clone();
    let delay_ms = args.delay_ms.unwrap_or(config.frame_delay_ms);

    let mut sim_options = SimOptions {
        latency: Duration::from_millis(args.latency_ms),
        fail_every: args.fail_every,
        ..SimOptions::default()
    };
    if let Some(n) = args.workers {
        sim_options.threads = n;
    }

    let mut animator = Animator::new(config.clone(), scenario.axis.to_axis(), |tx| {
        SimRenderer::new(tx, sim_options)
    });
    if args.prefs {
        let prefs_path = paths::data_file("wxloop_prefs.json", &path_config);
        animator = animator.with_prefs(Box::new(JsonPreferenceStore::open(prefs_path)?));
    }

    animator.bus().subscribe(|n| {
        println!("{}", describe(n));
    });

    for layer in scenario.layers {
        animator.add_layer(layer);
    }
    animator.request_view_update(scenario.extent);
    animator.play(delay_ms, config.period_delay_ms);
    info!("Playing {} steps, {} strategy", args.steps, config.strategy);

    let mut steps = 0;
    let mut last_time = animator.current_time();
    let started = Instant::now();
    while steps < args.steps {
        animator.tick();
        if animator.current_time() != last_time {
            last_time = animator.current_time();
            steps += 1;
        }
        if !animator.is_playing() {
            warn!("Playback stopped after {} steps", steps);
            break;
        }
        std::thread::sleep(TICK);
    }
    animator.pause();

    let (loaded, total) = animator.intervals().progress();
    println!(
        "done: {} steps in {:.1}s, session {}, {}/{} loaded, {} fetches",
        steps,
        started.elapsed().as_secs_f64(),
        animator.load_id(),
        loaded,
        total,
        animator.renderer().requests()
    );
    Ok(())
}
