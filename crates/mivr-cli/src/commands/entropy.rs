//! `mivr entropy`: metrics for one or two histograms.

use mivr_core::EntropyEngine;
use mivr_core::format::legacy_float;

use super::{InputKind, load_histogram_or_exit, write_json};

pub fn run(primary: &str, secondary: Option<&str>, kind: InputKind, bins: usize, output: Option<&str>) {
    let a = load_histogram_or_exit(primary, kind, bins);
    let b = secondary.map(|path| load_histogram_or_exit(path, kind, bins));

    let engine = EntropyEngine::new();
    let result = match engine.joint_metrics(&a, b.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let max_bits = (a.bin_count() as f64).log2();
    println!("Primary:    {primary} ({} bins, {} samples)", a.bin_count(), result.total_count);
    if let (Some(path), Some(b)) = (secondary, b.as_ref()) {
        println!("Secondary:  {path} ({} bins, {} samples)", b.bin_count(), b.total());
    }
    println!();
    println!("  {:<22} {:>10}", "Metric", "Bits");
    println!("  {}", "-".repeat(33));
    println!("  {:<22} {:>10.4}", "H(A)", result.entropy_a);
    if let Some(h) = result.entropy_b {
        println!("  {:<22} {:>10.4}", "H(B)", h);
    }
    match (result.joint_entropy, result.mutual_information) {
        (Some(joint), Some(mi)) => {
            println!("  {:<22} {:>10.4}", "H(A+B) overlay", joint);
            println!("  {:<22} {:>10.4}", "MI", mi);
        }
        _ if b.is_some() => {
            println!("  {:<22} {:>10}", "MI", "n/a");
            println!("\nBin counts differ; joint metrics not computed.");
        }
        _ => {}
    }
    println!("\nMaximum single-histogram entropy for {} bins: {} bits", a.bin_count(), legacy_float(max_bits));

    if let Some(path) = output {
        write_json(&result, path);
    }
}
