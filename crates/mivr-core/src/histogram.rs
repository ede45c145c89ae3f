//! Fixed-length count histograms and their probability distributions.
//!
//! A [`Histogram`] is what the histogram provider hands the core every
//! iteration: one for the raw volume (stable across iterations) and one for the
//! rendered frame (recomputed every frame). Both share the same bin count.

use serde::{Deserialize, Serialize};

use crate::error::{Error, HistogramRole, Result};

/// Bin count used by the renderer when nothing else is configured.
///
/// The GPU histogram kernel wants `2^n - 1` bins.
pub const DEFAULT_BIN_COUNT: usize = 511;

/// Edge length of the synthetic test volumes.
pub const SYNTHETIC_EDGE: usize = 32;

/// Ordered, fixed-length sequence of non-negative counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    /// Wrap existing counts.
    pub fn new(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    /// Wrap existing counts, rejecting lists whose total does not fit in `u64`.
    pub fn try_new(counts: Vec<u64>) -> Result<Self> {
        let hist = Self { counts };
        if hist.checked_total().is_none() {
            return Err(Error::InvalidHistogram(format!(
                "counts over {} bins overflow a 64-bit total",
                hist.bin_count()
            )));
        }
        Ok(hist)
    }

    /// An all-zero histogram with `bin_count` bins.
    pub fn zeroed(bin_count: usize) -> Self {
        Self {
            counts: vec![0; bin_count],
        }
    }

    /// Bin a volume of 8-bit voxels into `bin_count` buckets.
    ///
    /// Voxels are min/max normalized to `[0, 1]` over the observed range, then
    /// bucketed with a step of `1 / bin_count`. The maximum voxel lands in the
    /// last bin. A constant volume puts every voxel in bin 0.
    pub fn from_volume(voxels: &[u8], bin_count: usize) -> Result<Self> {
        if bin_count == 0 {
            return Err(Error::InvalidHistogram("bin count must be positive".into()));
        }
        if voxels.is_empty() {
            return Err(Error::InvalidHistogram("volume has no voxels".into()));
        }

        let (lo, hi) = voxels
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = f64::from(hi) - f64::from(lo);
        let step = 1.0 / bin_count as f64;

        let mut hist = Self::zeroed(bin_count);
        for &v in voxels {
            let normalized = if range > 0.0 {
                (f64::from(v) - f64::from(lo)) / range
            } else {
                0.0
            };
            let idx = ((normalized / step) as usize).min(bin_count - 1);
            hist.counts[idx] += 1;
        }
        log::debug!(
            "binned {} voxels into {bin_count} bins (range {lo}..={hi})",
            voxels.len()
        );
        Ok(hist)
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    /// Raw counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of the raw counts. No normalization. Saturates at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.checked_total().unwrap_or(u64::MAX)
    }

    /// Sum of the raw counts, or `None` when it overflows.
    pub fn checked_total(&self) -> Option<u64> {
        self.counts.iter().try_fold(0u64, |acc, &c| acc.checked_add(c))
    }

    /// `true` when the histogram cannot be normalized.
    pub fn is_degenerate(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Number of bins holding at least one count.
    pub fn occupied_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Add one observation to `bin`. Out-of-range bins are ignored.
    pub fn increment(&mut self, bin: usize) {
        if let Some(c) = self.counts.get_mut(bin) {
            *c = c.saturating_add(1);
        }
    }

    /// Reset every bin to zero, keeping the bin count.
    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    /// Normalize to a probability distribution.
    pub fn distribution(&self) -> Result<ProbabilityDistribution> {
        ProbabilityDistribution::from_histogram(self, HistogramRole::Primary)
    }

    /// Spread of the normalized distribution: the sum of squared deviations
    /// from the mean probability, divided by the squared bin count.
    pub fn spread(&self) -> Result<f64> {
        let dist = self.distribution()?;
        let n = dist.len() as f64;
        let mean = dist.sum() / n;
        let ss: f64 = dist.probabilities().iter().map(|p| (p - mean).powi(2)).sum();
        Ok(ss / (n * n))
    }
}

impl From<Vec<u64>> for Histogram {
    fn from(counts: Vec<u64>) -> Self {
        Self::new(counts)
    }
}

/// Counts divided by their total.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDistribution {
    probabilities: Vec<f64>,
}

impl ProbabilityDistribution {
    /// Normalize `hist` by its own total.
    ///
    /// `role` labels the error when the total is zero. A total past
    /// `u64::MAX` is an [`Error::InvalidHistogram`].
    pub fn from_histogram(hist: &Histogram, role: HistogramRole) -> Result<Self> {
        let total = hist.checked_total().ok_or_else(|| {
            Error::InvalidHistogram(format!("{role} histogram total overflows 64 bits"))
        })?;
        if total == 0 {
            return Err(Error::DegenerateDistribution(role));
        }
        let total = total as f64;
        Ok(Self {
            probabilities: hist.counts.iter().map(|&c| c as f64 / total).collect(),
        })
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// The distribution with zero bins removed, order preserved.
    pub fn non_zero(&self) -> Vec<f64> {
        self.probabilities
            .iter()
            .copied()
            .filter(|&p| p != 0.0)
            .collect()
    }
}

/// Voxel generators for the synthetic test volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticMethod {
    /// `x * 8`, with the `x = 0` plane set to 1.
    RampX,
    /// `y`.
    RampY,
    /// `z`.
    RampZ,
    /// `x + y`.
    Diagonal,
    /// `(x + y) * 2 * ((z + 1) / edge)`.
    Wedge,
}

impl SyntheticMethod {
    /// Method by its numeric id (0..=4). Unknown ids fall back to [`Self::RampX`].
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => Self::RampY,
            2 => Self::RampZ,
            3 => Self::Diagonal,
            4 => Self::Wedge,
            _ => Self::RampX,
        }
    }

    fn voxel(self, x: usize, y: usize, z: usize, edge: usize) -> f32 {
        match self {
            Self::RampX => {
                if x == 0 {
                    1.0
                } else {
                    (x * 8) as f32
                }
            }
            Self::RampY => y as f32,
            Self::RampZ => z as f32,
            Self::Diagonal => (x + y) as f32,
            Self::Wedge => (x + y) as f32 * 2.0 * ((z + 1) as f32 / edge as f32),
        }
    }
}

impl std::fmt::Display for SyntheticMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RampX => write!(f, "ramp_x"),
            Self::RampY => write!(f, "ramp_y"),
            Self::RampZ => write!(f, "ramp_z"),
            Self::Diagonal => write!(f, "diagonal"),
            Self::Wedge => write!(f, "wedge"),
        }
    }
}

/// Generate an `edge³` volume of 8-bit voxels, x fastest, then y, then z.
///
/// Values are truncated to `u8` the way a raw byte dump would store them.
pub fn synthetic_volume(method: SyntheticMethod, edge: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(edge * edge * edge);
    for z in 0..edge {
        for y in 0..edge {
            for x in 0..edge {
                out.push(method.voxel(x, y, z, edge) as u8);
            }
        }
    }
    out
}
