pub mod entropy;
pub mod peer;
pub mod run;
pub mod synth;

use std::path::Path;

use mivr_core::Histogram;

/// How a histogram input file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Bin counts as text: a JSON array, or integers separated by commas or whitespace.
    Counts,
    /// Raw 8-bit voxels, binned with min/max normalization.
    Volume,
}

/// Parse an input kind string into the enum.
pub fn parse_input_kind(s: &str) -> InputKind {
    match s {
        "counts" | "hist" | "histogram" => InputKind::Counts,
        "volume" | "raw" | "voxels" => InputKind::Volume,
        _ => {
            eprintln!("Unknown input kind '{s}', using counts");
            InputKind::Counts
        }
    }
}

/// Load a histogram from `path`. `bins` only applies to volume input.
pub fn load_histogram(path: &str, kind: InputKind, bins: usize) -> Result<Histogram, String> {
    match kind {
        InputKind::Counts => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            parse_counts(&text).map_err(|e| format!("{path}: {e}"))
        }
        InputKind::Volume => {
            let voxels = std::fs::read(path).map_err(|e| format!("{path}: {e}"))?;
            Histogram::from_volume(&voxels, bins).map_err(|e| format!("{path}: {e}"))
        }
    }
}

/// Same as [`load_histogram`], exiting with a message on failure.
pub fn load_histogram_or_exit(path: &str, kind: InputKind, bins: usize) -> Histogram {
    match load_histogram(path, kind, bins) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse bin counts from text.
pub fn parse_counts(text: &str) -> Result<Histogram, String> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        let counts: Vec<u64> =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON counts: {e}"))?;
        return Histogram::try_new(counts).map_err(|e| e.to_string());
    }
    let counts = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<u64>()
                .map_err(|_| format!("'{t}' is not a non-negative integer count"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if counts.is_empty() {
        return Err("no counts found".into());
    }
    Histogram::try_new(counts).map_err(|e| e.to_string())
}

/// Write `value` as pretty JSON to `path`, exiting on failure.
pub fn write_json<T: serde::Serialize>(value: &T, path: &str) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing results: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(Path::new(path), json) {
        eprintln!("Error writing {path}: {e}");
        std::process::exit(1);
    }
    println!("Results written to {path}");
}
