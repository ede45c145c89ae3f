//! # mivr-core
//!
//! **Steer a volume renderer toward informative viewpoints.**
//!
//! Every frame, `mivr-core` compares the histogram of the rendered image with
//! the histogram of the raw volume, reduces the pair to a mutual-information
//! score and hands that score to one of two steering components:
//!
//! - the [`FeedbackClient`], which sends the pose and score to an external
//!   advisory peer over TCP and applies the pose it answers with, or
//! - the [`SweepController`], which walks every whole-degree orientation and
//!   logs the score of each to a CSV file for offline ground truth.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mivr_core::{DriverConfig, Driver, Histogram, NullConsumer, ReplayProvider};
//!
//! let hist = Histogram::new(vec![4, 8, 15, 16, 23, 42, 0]);
//! let config = DriverConfig { bin_count: hist.bin_count(), ..Default::default() };
//! let provider = ReplayProvider::constant(hist);
//! let mut driver = Driver::from_config(&config, provider, NullConsumer)?;
//! let summary = driver.run(Some(100))?;
//! println!("{} iterations, {} advised", summary.iterations, summary.advised);
//! # Ok::<(), mivr_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! HistogramProvider → EntropyEngine → {FeedbackClient | SweepController} → ViewState
//!
//! The core is single-threaded and does no rendering. Histograms come from a
//! [`HistogramProvider`] and updated poses go to a [`ViewConsumer`].

pub mod config;
pub mod driver;
pub mod entropy;
pub mod error;
pub mod feedback;
pub mod format;
pub mod histogram;
pub mod sweep;
pub mod view;
pub mod wire;

pub use config::{DriverConfig, SteeringMode};
pub use driver::{
    Driver, HistogramPair, HistogramProvider, IterationOutcome, NullConsumer, ReplayProvider,
    RunSummary, SkipReason, Steering, StopReason, ViewConsumer,
};
pub use entropy::{EntropyEngine, EntropyResult};
pub use error::{Error, ExchangeFailure, HistogramRole, Result};
pub use feedback::{
    Connector, FeedbackClient, FeedbackState, FeedbackStats, ReconnectPolicy, TcpConnector,
};
pub use histogram::{
    DEFAULT_BIN_COUNT, Histogram, ProbabilityDistribution, SyntheticMethod, synthetic_volume,
};
pub use sweep::{SweepController, SweepLog, SweepState, SweepStep, SweepSummary};
pub use view::ViewState;
pub use wire::{MetricRecord, ReplyRecord};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
