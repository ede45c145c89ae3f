//! `mivr synth`: write a synthetic test volume.

use mivr_core::{EntropyEngine, Histogram, SyntheticMethod, synthetic_volume};

pub fn run(method: u32, edge: usize, output: &str, bins: usize, counts: Option<&str>) {
    let method = SyntheticMethod::from_id(method);
    let voxels = synthetic_volume(method, edge);

    if let Err(e) = std::fs::write(output, &voxels) {
        eprintln!("Error writing {output}: {e}");
        std::process::exit(1);
    }
    println!("Wrote {edge}x{edge}x{edge} {method} volume to {output} ({} bytes)", voxels.len());

    let hist = match Histogram::from_volume(&voxels, bins) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let engine = EntropyEngine::new();
    match engine.entropy_of(&hist) {
        Ok(h) => println!(
            "  {} of {} bins occupied, entropy {h:.4} bits",
            hist.occupied_bins(),
            hist.bin_count()
        ),
        Err(e) => println!("  entropy unavailable: {e}"),
    }

    if let Some(path) = counts {
        let text = hist
            .counts()
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if let Err(e) = std::fs::write(path, text + "\n") {
            eprintln!("Error writing {path}: {e}");
            std::process::exit(1);
        }
        println!("  Histogram counts written to {path}");
    }
}
