//! `mivr run`: drive the feedback or sweep loop from recorded histograms.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mivr_core::{
    Driver, DriverConfig, Histogram, ReconnectPolicy, ReplayProvider, StopReason, SteeringMode,
    ViewState,
};

use super::{InputKind, load_histogram_or_exit, write_json};

pub struct RunCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub mode: Option<&'a str>,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub log_path: Option<&'a str>,
    pub bins: Option<usize>,
    pub raw: &'a str,
    pub frames: &'a [String],
    pub input: InputKind,
    pub max_iterations: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub persistent: bool,
    pub output_path: Option<&'a str>,
}

/// Merge the config file (if any) with command-line overrides.
pub fn build_config(cmd: &RunCommandConfig<'_>) -> Result<DriverConfig, String> {
    let mut config = match cmd.config_path {
        Some(path) => DriverConfig::load(path).map_err(|e| e.to_string())?,
        None => DriverConfig::default(),
    };
    if let Some(mode) = cmd.mode {
        config.mode = mode.parse::<SteeringMode>().map_err(|e| e.to_string())?;
    }
    if let Some(host) = cmd.host {
        config.peer_host = host.to_string();
    }
    if let Some(port) = cmd.port {
        config.peer_port = port;
    }
    if let Some(path) = cmd.log_path {
        config.log_path = path.into();
    }
    if let Some(bins) = cmd.bins {
        config.bin_count = bins;
    }
    if cmd.read_timeout_ms.is_some() {
        config.read_timeout_ms = cmd.read_timeout_ms;
    }
    if cmd.persistent {
        config.reconnect = ReconnectPolicy::Persistent;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Every loaded histogram must have the configured bin count; the driver
/// would skip each iteration otherwise.
pub fn check_bin_counts(
    expected: usize,
    raw: (&str, &Histogram),
    frames: &[(&str, &Histogram)],
) -> Result<(), String> {
    for (path, hist) in std::iter::once(&raw).chain(frames) {
        if hist.bin_count() != expected {
            return Err(format!(
                "{path} has {} bins but the bin count is {expected} (set --bins)",
                hist.bin_count()
            ));
        }
    }
    Ok(())
}

pub fn run(cmd: RunCommandConfig<'_>) {
    let config = match build_config(&cmd) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let raw = load_histogram_or_exit(cmd.raw, cmd.input, config.bin_count);
    let frames: Vec<_> = if cmd.frames.is_empty() {
        vec![raw.clone()]
    } else {
        cmd.frames
            .iter()
            .map(|path| load_histogram_or_exit(path, cmd.input, config.bin_count))
            .collect()
    };
    let frame_paths: Vec<(&str, &Histogram)> = if cmd.frames.is_empty() {
        Vec::new()
    } else {
        cmd.frames.iter().map(String::as_str).zip(&frames).collect()
    };
    if let Err(e) = check_bin_counts(config.bin_count, (cmd.raw, &raw), &frame_paths) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let provider = match ReplayProvider::new(raw, frames) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Running in {} mode", config.mode);
    match config.mode {
        SteeringMode::Feedback => println!("  Peer:      {}", config.peer_addr()),
        SteeringMode::Sweep => println!("  Log:       {}", config.log_path.display()),
    }
    println!("  Frames:    {}", provider.frame_count());
    match cmd.max_iterations {
        Some(n) => println!("  Limit:     {n} iterations"),
        None => println!("  Limit:     until done or Ctrl+C"),
    }
    println!();

    let mut driver = match Driver::from_config(&config, provider, |view: &ViewState| {
        log::trace!("present {view}");
    }) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not install Ctrl+C handler: {e}");
    }

    let summary = match driver.run_until(cmd.max_iterations, || !running.load(Ordering::SeqCst)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Stopped: {}", match summary.stop {
        StopReason::SweepComplete => "sweep complete",
        StopReason::IterationLimit => "iteration limit",
        StopReason::Interrupted => "interrupted",
    });
    println!("  Iterations:  {}", summary.iterations);
    match config.mode {
        SteeringMode::Feedback => {
            println!("  Advised:     {}", summary.advised);
            println!("  Abandoned:   {}", summary.abandoned);
            println!("  Unsteered:   {}", summary.unsteered);
        }
        SteeringMode::Sweep => println!("  Rows:        {}", summary.swept),
    }
    println!("  Skipped:     {}", summary.skipped);
    println!("  Final view:  {}", summary.final_view);
    if let Some(mi) = summary.last_metrics.as_ref().and_then(|m| m.mutual_information) {
        println!("  Last MI:     {mi:.4} bits");
    }

    if let Some(path) = cmd.output_path {
        write_json(&summary, path);
    }
}
