//! CLI for mivr: mutual-information viewpoint feedback for volume rendering.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mivr")]
#[command(about = "mivr: steer a volume renderer by mutual information between frame and volume")]
#[command(version = mivr_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Entropy, overlay joint entropy and mutual information of two histograms
    Entropy {
        /// Primary histogram file (the rendered frame)
        primary: String,

        /// Secondary histogram file (the raw volume)
        secondary: Option<String>,

        /// Input format: counts (text or JSON bin counts) or volume (raw 8-bit voxels)
        #[arg(long, default_value = "counts", value_parser = ["counts", "volume"])]
        input: String,

        /// Bins used when binning volume input
        #[arg(long, default_value = "511")]
        bins: usize,

        /// Write the metrics as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Drive the feedback or sweep loop from recorded histograms
    Run {
        /// Raw volume histogram (or voxel file with --input volume)
        raw: String,

        /// Rendered frame histograms, replayed in order and cycled.
        /// Defaults to the raw histogram itself.
        frames: Vec<String>,

        /// JSON config file; flags below override its values
        #[arg(long)]
        config: Option<String>,

        /// Steering mode: feedback (advisory peer) or sweep (exhaustive, logged)
        #[arg(long, value_parser = ["feedback", "sweep"])]
        mode: Option<String>,

        /// Advisory peer host (default 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Advisory peer port (default 8888)
        #[arg(long)]
        port: Option<u16>,

        /// Sweep log path (default ValidationData.csv)
        #[arg(long)]
        log: Option<String>,

        /// Bin count (default 511)
        #[arg(long)]
        bins: Option<usize>,

        /// Input format for all histogram files
        #[arg(long, default_value = "counts", value_parser = ["counts", "volume"])]
        input: String,

        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Give up on a peer reply after this many milliseconds
        #[arg(long)]
        read_timeout_ms: Option<u64>,

        /// Keep one peer connection open instead of reconnecting per exchange
        #[arg(long)]
        persistent: bool,

        /// Write the run summary as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Run the reference advisory peer
    Peer {
        /// Port to listen on
        #[arg(long, default_value = "8888")]
        port: u16,

        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Action policy
        #[arg(long, default_value = "hold", value_parser = ["hold", "random", "scripted"])]
        policy: String,

        /// Seed for --policy random
        #[arg(long)]
        seed: Option<u64>,

        /// Comma-separated actions for --policy scripted (e.g. "cw,cw,in,north")
        #[arg(long)]
        script: Option<String>,

        /// File received records are appended to
        #[arg(long, default_value = "LearningResults.csv")]
        results: String,

        /// Do not write received records
        #[arg(long)]
        no_results: bool,

        /// Exit after this many exchanges
        #[arg(long)]
        max_exchanges: Option<u64>,
    },

    /// Write a synthetic 8-bit test volume
    Synth {
        /// Generator: 0 ramp-x, 1 ramp-y, 2 ramp-z, 3 diagonal, 4 wedge
        #[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..=4))]
        method: u32,

        /// Edge length of the cube
        #[arg(long, default_value = "32")]
        edge: usize,

        /// Output voxel file
        #[arg(long, default_value = "volume.raw")]
        output: String,

        /// Bins for the summary histogram
        #[arg(long, default_value = "511")]
        bins: usize,

        /// Also write the volume's histogram counts here
        #[arg(long)]
        counts: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Entropy {
            primary,
            secondary,
            input,
            bins,
            output,
        } => commands::entropy::run(
            &primary,
            secondary.as_deref(),
            commands::parse_input_kind(&input),
            bins,
            output.as_deref(),
        ),
        Commands::Run {
            raw,
            frames,
            config,
            mode,
            host,
            port,
            log,
            bins,
            input,
            max_iterations,
            read_timeout_ms,
            persistent,
            output,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_path: config.as_deref(),
            mode: mode.as_deref(),
            host: host.as_deref(),
            port,
            log_path: log.as_deref(),
            bins,
            raw: &raw,
            frames: &frames,
            input: commands::parse_input_kind(&input),
            max_iterations,
            read_timeout_ms,
            persistent,
            output_path: output.as_deref(),
        }),
        Commands::Peer {
            port,
            host,
            policy,
            seed,
            script,
            results,
            no_results,
            max_exchanges,
        } => commands::peer::run(commands::peer::PeerCommandConfig {
            host: &host,
            port,
            policy: &policy,
            seed,
            script: script.as_deref(),
            results: &results,
            no_results,
            max_exchanges,
        }),
        Commands::Synth {
            method,
            edge,
            output,
            bins,
            counts,
        } => commands::synth::run(method, edge, &output, bins, counts.as_deref()),
    }
}
