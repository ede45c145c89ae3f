//! `mivr peer`: start the reference advisory peer.

use std::path::PathBuf;

use mivr_peer::{Action, PeerConfig, Policy, run_peer};

pub struct PeerCommandConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub policy: &'a str,
    pub seed: Option<u64>,
    pub script: Option<&'a str>,
    pub results: &'a str,
    pub no_results: bool,
    pub max_exchanges: Option<u64>,
}

/// Parse a comma-separated action script such as `cw,cw,in,2`.
pub fn parse_script(script: &str) -> Result<Vec<Action>, String> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<Action>)
        .collect()
}

pub fn build_policy(name: &str, seed: Option<u64>, script: Option<&str>) -> Result<Policy, String> {
    match name {
        "hold" => Ok(Policy::Hold),
        "random" => Ok(Policy::random(seed)),
        "scripted" => {
            let script = script.ok_or("--script is required with --policy scripted")?;
            Ok(Policy::scripted(parse_script(script)?))
        }
        other => Err(format!("unknown policy '{other}'")),
    }
}

pub fn run(cmd: PeerCommandConfig<'_>) {
    let policy = match build_policy(cmd.policy, cmd.seed, cmd.script) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let config = PeerConfig {
        host: cmd.host.to_string(),
        port: cmd.port,
        results_path: (!cmd.no_results).then(|| PathBuf::from(cmd.results)),
        max_exchanges: cmd.max_exchanges,
    };

    println!("Starting advisory peer on {}:{}", config.host, config.port);
    println!("  Policy:   {}", policy.name());
    match &config.results_path {
        Some(p) => println!("  Results:  {} (append)", p.display()),
        None => println!("  Results:  disabled"),
    }
    println!("  Press Ctrl+C to stop.");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    match rt.block_on(run_peer(config, policy)) {
        Ok(summary) => {
            println!("Exchanges:     {}", summary.exchanges);
            println!("Dropped:       {}", summary.dropped_connections);
            println!("Total reward:  {:.3}", summary.total_reward);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
