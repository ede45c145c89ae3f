//! Shannon entropy, joint entropy and mutual information over histograms.
//!
//! # Joint distribution
//!
//! The joint term is **not** a bivariate distribution over the Cartesian
//! product of the two bin axes. Each histogram is normalized by its own total
//! and the two distributions are overlaid bin by bin:
//!
//! ```text
//! p_joint(i) = p_A(i) + p_B(i)          (not renormalized)
//! H_joint    = -Σ p_joint(i) · log2 p_joint(i)
//! MI         = H_A + H_B - H_joint
//! ```
//!
//! This measures overlap between two univariate distributions that share a
//! bin axis. The value always lies in `[0, 2]` bits: 0 for disjoint supports
//! and exactly 2 for identical shapes (`H_joint = 2·H - 2`), regardless of the
//! individual entropies, so it routinely exceeds the textbook bound
//! `min(H_A, H_B)`. The advisory peer is tuned to this numeric range, so the
//! formula is kept as is.

use serde::{Deserialize, Serialize};

use crate::error::{Error, HistogramRole, Result};
use crate::histogram::{Histogram, ProbabilityDistribution};

/// Metrics for one iteration.
///
/// Optional fields are `None` when they were not computed: no secondary
/// histogram, or mismatched bin counts for the joint terms. They are never
/// filled with a placeholder zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyResult {
    /// Entropy of the primary histogram, in bits.
    pub entropy_a: f64,
    /// Entropy of the secondary histogram, when one was supplied.
    pub entropy_b: Option<f64>,
    /// Entropy of the additive overlay of both distributions.
    pub joint_entropy: Option<f64>,
    /// `entropy_a + entropy_b - joint_entropy`.
    pub mutual_information: Option<f64>,
    /// Raw sum of the primary histogram's counts.
    pub total_count: u64,
}

impl EntropyResult {
    /// Mutual information narrowed to the wire width.
    pub fn mutual_information_f32(&self) -> Option<f32> {
        self.mutual_information.map(|mi| mi as f32)
    }
}

/// Stateless entropy calculator.
///
/// Hold one wherever metrics are needed; there is no shared instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntropyEngine;

impl EntropyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Shannon entropy of `hist` in bits. Empty bins contribute exactly 0.
    pub fn entropy_of(&self, hist: &Histogram) -> Result<f64> {
        let dist = ProbabilityDistribution::from_histogram(hist, HistogramRole::Primary)?;
        Ok(shannon(dist.probabilities()))
    }

    /// Same value as [`Self::entropy_of`], computed over the non-zero bins only.
    pub fn single_entropy(&self, hist: &Histogram) -> Result<f64> {
        let dist = ProbabilityDistribution::from_histogram(hist, HistogramRole::Primary)?;
        Ok(shannon(&dist.non_zero()))
    }

    /// Raw sum of counts.
    pub fn total_count_of(&self, hist: &Histogram) -> u64 {
        hist.total()
    }

    /// Joint entropy of the additive overlay. Fails on mismatched bin counts.
    pub fn joint_entropy(&self, a: &Histogram, b: &Histogram) -> Result<f64> {
        check_bins(a, b)?;
        let pa = ProbabilityDistribution::from_histogram(a, HistogramRole::Primary)?;
        let pb = ProbabilityDistribution::from_histogram(b, HistogramRole::Secondary)?;
        Ok(overlay_entropy(&pa, &pb))
    }

    /// Mutual information as defined in the module docs. Fails on mismatched
    /// bin counts.
    pub fn mutual_information(&self, a: &Histogram, b: &Histogram) -> Result<f64> {
        check_bins(a, b)?;
        self.joint_metrics(a, Some(b))?
            .mutual_information
            .ok_or(Error::BinCountMismatch {
                primary: a.bin_count(),
                secondary: b.bin_count(),
            })
    }

    /// Every metric derivable from `a` and an optional `b`.
    ///
    /// Each histogram is normalized by its own total. With mismatched bin
    /// counts the joint terms are left unset while both independent entropies
    /// are still reported. A zero-total histogram fails the whole call.
    pub fn joint_metrics(&self, a: &Histogram, b: Option<&Histogram>) -> Result<EntropyResult> {
        let pa = ProbabilityDistribution::from_histogram(a, HistogramRole::Primary)?;
        let entropy_a = shannon(pa.probabilities());

        let mut result = EntropyResult {
            entropy_a,
            entropy_b: None,
            joint_entropy: None,
            mutual_information: None,
            total_count: a.total(),
        };

        let Some(b) = b else {
            return Ok(result);
        };

        let pb = ProbabilityDistribution::from_histogram(b, HistogramRole::Secondary)?;
        let entropy_b = shannon(pb.probabilities());
        result.entropy_b = Some(entropy_b);

        if pa.len() != pb.len() {
            log::debug!(
                "bin count mismatch ({} vs {}), joint metrics not computed",
                pa.len(),
                pb.len()
            );
            return Ok(result);
        }

        let joint = overlay_entropy(&pa, &pb);
        result.joint_entropy = Some(joint);
        result.mutual_information = Some(entropy_a + entropy_b - joint);
        Ok(result)
    }
}

fn check_bins(a: &Histogram, b: &Histogram) -> Result<()> {
    if a.bin_count() != b.bin_count() {
        return Err(Error::BinCountMismatch {
            primary: a.bin_count(),
            secondary: b.bin_count(),
        });
    }
    Ok(())
}

/// `-Σ p log2 p`, skipping zero entries so the log never sees 0.
fn shannon(probabilities: &[f64]) -> f64 {
    let mut h = 0.0;
    for &p in probabilities {
        if p != 0.0 {
            h -= p * p.log2();
        }
    }
    h
}

fn overlay_entropy(pa: &ProbabilityDistribution, pb: &ProbabilityDistribution) -> f64 {
    let overlay: Vec<f64> = pa
        .probabilities()
        .iter()
        .zip(pb.probabilities())
        .map(|(a, b)| a + b)
        .collect();
    shannon(&overlay)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn engine() -> EntropyEngine {
        EntropyEngine::new()
    }

    // -----------------------------------------------------------------------
    // Single-histogram entropy
    // -----------------------------------------------------------------------

    #[test]
    fn entropy_of_single_spike_is_zero() {
        let h = Histogram::new(vec![0, 0, 42, 0, 0]);
        assert_eq!(engine().entropy_of(&h).unwrap(), 0.0);
    }

    #[test]
    fn entropy_of_uniform_is_log2_bins() {
        for bins in [1usize, 3, 5, 511] {
            let h = Histogram::new(vec![7; bins]);
            let e = engine().entropy_of(&h).unwrap();
            assert!((e - (bins as f64).log2()).abs() < EPS, "bins={bins} e={e}");
        }
    }

    #[test]
    fn entropy_of_two_equal_bins_is_one_bit() {
        let h = Histogram::new(vec![5, 0, 5]);
        assert!((engine().entropy_of(&h).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn entropy_within_bounds() {
        let h = Histogram::new(vec![1, 9, 0, 3, 27, 81, 0, 2, 5]);
        let e = engine().entropy_of(&h).unwrap();
        assert!(e > 0.0);
        assert!(e < (9f64).log2());
    }

    #[test]
    fn entropy_of_all_zero_is_degenerate() {
        let h = Histogram::zeroed(5);
        assert!(matches!(
            engine().entropy_of(&h),
            Err(Error::DegenerateDistribution(_))
        ));
    }

    #[test]
    fn single_entropy_matches_entropy_of() {
        let h = Histogram::new(vec![0, 4, 0, 0, 1, 3, 0]);
        let a = engine().entropy_of(&h).unwrap();
        let b = engine().single_entropy(&h).unwrap();
        assert!((a - b).abs() < EPS);
    }

    // -----------------------------------------------------------------------
    // Joint metrics
    // -----------------------------------------------------------------------

    #[test]
    fn identical_histograms_give_two_bits() {
        let h = Histogram::new(vec![3, 1, 4, 1, 5, 9, 2]);
        let r = engine().joint_metrics(&h, Some(&h)).unwrap();
        let ea = r.entropy_a;
        assert_eq!(r.entropy_b, Some(ea));
        let joint = r.joint_entropy.unwrap();
        assert!((joint - (2.0 * ea - 2.0)).abs() < EPS);
        assert!((r.mutual_information.unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn identical_shape_different_totals() {
        // Independent normalization: scaling one histogram changes nothing.
        let a = Histogram::new(vec![1, 2, 3]);
        let b = Histogram::new(vec![100, 200, 300]);
        let r = engine().joint_metrics(&a, Some(&b)).unwrap();
        assert!((r.mutual_information.unwrap() - 2.0).abs() < EPS);
        assert_eq!(r.total_count, 6);
    }

    #[test]
    fn disjoint_histograms() {
        let a = Histogram::new(vec![1, 0]);
        let b = Histogram::new(vec![0, 1]);
        let r = engine().joint_metrics(&a, Some(&b)).unwrap();
        assert_eq!(r.entropy_a, 0.0);
        assert_eq!(r.entropy_b, Some(0.0));
        // Overlay is [1, 1]: no term contributes.
        assert_eq!(r.joint_entropy, Some(0.0));
        assert_eq!(r.mutual_information, Some(0.0));
    }

    #[test]
    fn disjoint_supports_give_zero() {
        let a = Histogram::new(vec![1, 1, 0, 0]);
        let b = Histogram::new(vec![0, 0, 1, 1]);
        let r = engine().joint_metrics(&a, Some(&b)).unwrap();
        // Overlay [.5,.5,.5,.5] has 2 bits, each side has 1 bit.
        assert!((r.joint_entropy.unwrap() - 2.0).abs() < EPS);
        assert!(r.mutual_information.unwrap().abs() < EPS);
    }

    #[test]
    fn partial_overlap_lies_between_zero_and_two() {
        let c = Histogram::new(vec![1, 1, 1, 1]);
        let d = Histogram::new(vec![1, 0, 0, 0]);
        let r = engine().joint_metrics(&c, Some(&d)).unwrap();
        let mi = r.mutual_information.unwrap();
        assert!(mi > 0.0 && mi < 2.0, "mi={mi}");
        // Exceeds min(H_A, H_B) = 0.
        assert!(mi > r.entropy_b.unwrap());
    }

    #[test]
    fn single_spike_against_itself_exceeds_textbook_bound() {
        let h = Histogram::new(vec![0, 9, 0]);
        let r = engine().joint_metrics(&h, Some(&h)).unwrap();
        assert_eq!(r.entropy_a, 0.0);
        assert!((r.mutual_information.unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn mismatched_bins_omit_joint_fields() {
        let a = Histogram::new(vec![1, 2, 3]);
        let b = Histogram::new(vec![1, 2, 3, 4, 5]);
        let r = engine().joint_metrics(&a, Some(&b)).unwrap();
        assert!(r.entropy_a > 0.0);
        assert!(r.entropy_b.unwrap() > 0.0);
        assert_eq!(r.joint_entropy, None);
        assert_eq!(r.mutual_information, None);
        assert_eq!(r.total_count, 6);
    }

    #[test]
    fn strict_helpers_report_mismatch() {
        let a = Histogram::new(vec![1, 2, 3]);
        let b = Histogram::new(vec![1, 2]);
        assert!(matches!(
            engine().joint_entropy(&a, &b),
            Err(Error::BinCountMismatch {
                primary: 3,
                secondary: 2
            })
        ));
        assert!(matches!(
            engine().mutual_information(&a, &b),
            Err(Error::BinCountMismatch { .. })
        ));
    }

    #[test]
    fn primary_only() {
        let a = Histogram::new(vec![2, 2]);
        let r = engine().joint_metrics(&a, None).unwrap();
        assert!((r.entropy_a - 1.0).abs() < EPS);
        assert_eq!(r.entropy_b, None);
        assert_eq!(r.mutual_information, None);
        assert_eq!(r.total_count, 4);
    }

    #[test]
    fn degenerate_secondary_is_reported() {
        let a = Histogram::new(vec![2, 2]);
        let b = Histogram::zeroed(2);
        assert!(matches!(
            engine().joint_metrics(&a, Some(&b)),
            Err(Error::DegenerateDistribution(HistogramRole::Secondary))
        ));
    }

    #[test]
    fn overflowing_counts_are_invalid() {
        let h = Histogram::new(vec![u64::MAX, 1]);
        assert!(matches!(engine().entropy_of(&h), Err(Error::InvalidHistogram(_))));
        let ok = Histogram::new(vec![1, 1]);
        assert!(matches!(
            engine().joint_metrics(&ok, Some(&h)),
            Err(Error::InvalidHistogram(_))
        ));
    }

    #[test]
    fn total_count_is_not_normalized() {
        let h = Histogram::new(vec![10, 20, 30]);
        assert_eq!(engine().total_count_of(&h), 60);
    }

    #[test]
    fn mutual_information_narrows_to_f32() {
        let h = Histogram::new(vec![1, 2, 3]);
        let r = engine().joint_metrics(&h, Some(&h)).unwrap();
        assert_eq!(r.mutual_information_f32(), Some(2.0f32));
    }
}
