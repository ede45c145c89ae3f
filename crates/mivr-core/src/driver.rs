//! The per-iteration loop.
//!
//! ```text
//! HistogramProvider ─▶ EntropyEngine ─▶ { FeedbackClient | SweepController } ─▶ ViewState ─▶ ViewConsumer
//! ```
//!
//! One iteration runs to completion before the next begins. The only place
//! the loop can stall is the feedback client's blocking read.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;

use crate::config::{DriverConfig, SteeringMode};
use crate::entropy::{EntropyEngine, EntropyResult};
use crate::error::{Error, HistogramRole, Result};
use crate::feedback::{Connector, FeedbackClient, TcpConnector};
use crate::histogram::Histogram;
use crate::sweep::{SweepController, SweepStep, SweepSummary};
use crate::view::ViewState;
use crate::wire::ReplyRecord;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// The two histograms for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPair {
    /// Intensity distribution of the source volume. Usually stable.
    pub raw: Histogram,
    /// Output-value distribution of the frame rendered at the current pose.
    pub rendered: Histogram,
}

impl HistogramPair {
    pub fn new(raw: Histogram, rendered: Histogram) -> Self {
        Self { raw, rendered }
    }
}

/// Supplies histograms for the pose about to be evaluated.
pub trait HistogramProvider {
    fn histogram_pair(&mut self, view: &ViewState) -> Result<HistogramPair>;
}

/// Receives the pose after every iteration, before the next frame.
pub trait ViewConsumer {
    fn present(&mut self, view: &ViewState);
}

impl<F: FnMut(&ViewState)> ViewConsumer for F {
    fn present(&mut self, view: &ViewState) {
        self(view)
    }
}

/// Consumer that ignores every pose.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConsumer;

impl ViewConsumer for NullConsumer {
    fn present(&mut self, _view: &ViewState) {}
}

/// Plays back a fixed list of rendered histograms against one raw histogram,
/// cycling when the list runs out.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    raw: Histogram,
    frames: Vec<Histogram>,
    cursor: usize,
}

impl ReplayProvider {
    pub fn new(raw: Histogram, frames: Vec<Histogram>) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::InvalidHistogram("replay needs at least one frame".into()));
        }
        Ok(Self {
            raw,
            frames,
            cursor: 0,
        })
    }

    /// Same histogram as both raw and rendered, every iteration.
    pub fn constant(hist: Histogram) -> Self {
        Self {
            raw: hist.clone(),
            frames: vec![hist],
            cursor: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl HistogramProvider for ReplayProvider {
    fn histogram_pair(&mut self, _view: &ViewState) -> Result<HistogramPair> {
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(HistogramPair::new(self.raw.clone(), frame))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why an iteration produced no metric-driven step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// One histogram summed to zero.
    Degenerate(HistogramRole),
    /// Joint metrics were not computed.
    BinCountMismatch { primary: usize, secondary: usize },
    /// A histogram does not have the configured bin count.
    UnexpectedBinCount {
        role: HistogramRole,
        expected: usize,
        actual: usize,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Degenerate(role) => write!(f, "{role} histogram is empty"),
            Self::BinCountMismatch { primary, secondary } => {
                write!(f, "bin counts differ ({primary} vs {secondary})")
            }
            Self::UnexpectedBinCount {
                role,
                expected,
                actual,
            } => write!(f, "{role} histogram has {actual} bins, expected {expected}"),
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Metrics were unavailable; nothing was sent or logged.
    Skipped(SkipReason),
    /// The peer answered and the pose was overwritten.
    Advised(ReplyRecord),
    /// The exchange failed mid-way; the pose is unchanged.
    ExchangeAbandoned,
    /// Feedback is disabled; the frame renders without steering.
    FeedbackOff,
    /// One sweep row was logged and the pose advanced.
    Swept,
    /// The sweep grid is exhausted.
    SweepFinished(SweepSummary),
}

/// Why [`Driver::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SweepComplete,
    IterationLimit,
    Interrupted,
}

/// Totals over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub iterations: u64,
    pub advised: u64,
    pub skipped: u64,
    pub abandoned: u64,
    pub unsteered: u64,
    pub swept: u64,
    pub stop: StopReason,
    pub final_view: ViewState,
    pub last_metrics: Option<EntropyResult>,
    pub sweep: Option<SweepSummary>,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// The single component allowed to write the pose for a run.
pub enum Steering<C: Connector = TcpConnector, W: Write = BufWriter<File>> {
    Feedback(FeedbackClient<C>),
    Sweep(SweepController<W>),
}

impl<C: Connector, W: Write> Steering<C, W> {
    pub fn mode(&self) -> SteeringMode {
        match self {
            Self::Feedback(_) => SteeringMode::Feedback,
            Self::Sweep(_) => SteeringMode::Sweep,
        }
    }
}

pub struct Driver<P, V, C: Connector = TcpConnector, W: Write = BufWriter<File>> {
    engine: EntropyEngine,
    view: ViewState,
    sample_total: u64,
    last_metrics: Option<EntropyResult>,
    provider: P,
    consumer: V,
    steering: Steering<C, W>,
    bin_count: Option<usize>,
}

impl<P: HistogramProvider, V: ViewConsumer> Driver<P, V> {
    /// Build a driver from a validated config.
    ///
    /// Feedback mode makes the first connection attempt here. If it fails the
    /// driver still runs, unsteered, for the rest of its life.
    pub fn from_config(config: &DriverConfig, provider: P, consumer: V) -> Result<Self> {
        config.validate()?;
        let steering = match config.mode {
            SteeringMode::Feedback => {
                let mut client =
                    FeedbackClient::new(config.connector()).with_policy(config.reconnect);
                if let Err(e) = client.connect() {
                    log::debug!("starting without feedback: {e}");
                }
                Steering::Feedback(client)
            }
            SteeringMode::Sweep => Steering::Sweep(SweepController::create(&config.log_path)?),
        };
        Ok(Self::new(provider, consumer, steering, config.initial_view)
            .with_bin_count(config.bin_count))
    }
}

impl<P, V, C, W> Driver<P, V, C, W>
where
    P: HistogramProvider,
    V: ViewConsumer,
    C: Connector,
    W: Write,
{
    /// In sweep mode the rotation of `view` is replaced by the sweep origin.
    pub fn new(provider: P, consumer: V, steering: Steering<C, W>, view: ViewState) -> Self {
        let mut view = view;
        if let Steering::Sweep(ctl) = &steering {
            ctl.apply_to(&mut view);
        }
        log::info!("driver starting in {} mode at {view}", steering.mode());
        Self {
            engine: EntropyEngine::new(),
            view,
            sample_total: 0,
            last_metrics: None,
            provider,
            consumer,
            steering,
            bin_count: None,
        }
    }

    /// Skip every iteration whose histograms do not have exactly `bin_count`
    /// bins.
    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = Some(bin_count);
        self
    }

    /// Bin count enforced on incoming histograms, if any.
    pub fn bin_count(&self) -> Option<usize> {
        self.bin_count
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Total count of the last primary histogram that produced metrics.
    pub fn sample_total(&self) -> u64 {
        self.sample_total
    }

    pub fn last_metrics(&self) -> Option<&EntropyResult> {
        self.last_metrics.as_ref()
    }

    pub fn steering(&self) -> &Steering<C, W> {
        &self.steering
    }

    pub fn consumer(&self) -> &V {
        &self.consumer
    }

    /// Run one iteration.
    ///
    /// Recoverable metric errors and exchange failures become outcomes.
    /// Provider failures and log write failures are returned as errors.
    pub fn iterate(&mut self) -> Result<IterationOutcome> {
        let pair = self.provider.histogram_pair(&self.view)?;
        let outcome = self.step(&pair)?;
        self.consumer.present(&self.view);
        Ok(outcome)
    }

    fn step(&mut self, pair: &HistogramPair) -> Result<IterationOutcome> {
        if let Some(reason) = self.unexpected_bins(pair) {
            log::warn!("skipping iteration: {reason}");
            return Ok(IterationOutcome::Skipped(reason));
        }

        // Rendered frame is the primary histogram.
        let metrics = match self.engine.joint_metrics(&pair.rendered, Some(&pair.raw)) {
            Ok(m) => m,
            Err(Error::DegenerateDistribution(role)) => {
                log::debug!("skipping iteration: {role} histogram is empty");
                return Ok(IterationOutcome::Skipped(SkipReason::Degenerate(role)));
            }
            Err(e) => return Err(e),
        };
        self.sample_total = metrics.total_count;

        let Some(mi) = metrics.mutual_information_f32() else {
            let reason = SkipReason::BinCountMismatch {
                primary: pair.rendered.bin_count(),
                secondary: pair.raw.bin_count(),
            };
            log::debug!("skipping iteration: {reason}");
            self.last_metrics = Some(metrics);
            return Ok(IterationOutcome::Skipped(reason));
        };
        self.last_metrics = Some(metrics);

        match &mut self.steering {
            Steering::Feedback(client) => match client.step(&mut self.view, mi) {
                Ok(reply) => Ok(IterationOutcome::Advised(reply)),
                Err(Error::FeedbackDisabled) => Ok(IterationOutcome::FeedbackOff),
                Err(e) if e.disables_feedback() => Ok(IterationOutcome::FeedbackOff),
                Err(Error::ExchangeFailed(_)) => Ok(IterationOutcome::ExchangeAbandoned),
                Err(e) => Err(e),
            },
            Steering::Sweep(ctl) => match ctl.step(&mut self.view, mi)? {
                SweepStep::Continue => Ok(IterationOutcome::Swept),
                SweepStep::Finished(summary) => Ok(IterationOutcome::SweepFinished(summary)),
            },
        }
    }

    fn unexpected_bins(&self, pair: &HistogramPair) -> Option<SkipReason> {
        let expected = self.bin_count?;
        [
            (HistogramRole::Primary, &pair.rendered),
            (HistogramRole::Secondary, &pair.raw),
        ]
        .into_iter()
        .find(|(_, h)| h.bin_count() != expected)
        .map(|(role, h)| SkipReason::UnexpectedBinCount {
            role,
            expected,
            actual: h.bin_count(),
        })
    }

    /// Iterate until the sweep finishes or `max_iterations` is reached.
    pub fn run(&mut self, max_iterations: Option<u64>) -> Result<RunSummary> {
        self.run_until(max_iterations, || false)
    }

    /// Like [`Self::run`], also checking `interrupted` before every iteration.
    pub fn run_until(
        &mut self,
        max_iterations: Option<u64>,
        interrupted: impl Fn() -> bool,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            iterations: 0,
            advised: 0,
            skipped: 0,
            abandoned: 0,
            unsteered: 0,
            swept: 0,
            stop: StopReason::IterationLimit,
            final_view: self.view,
            last_metrics: None,
            sweep: None,
        };

        loop {
            if max_iterations.is_some_and(|max| summary.iterations >= max) {
                summary.stop = StopReason::IterationLimit;
                break;
            }
            if interrupted() {
                log::info!("interrupted after {} iterations", summary.iterations);
                summary.stop = StopReason::Interrupted;
                break;
            }

            let outcome = self.iterate()?;
            summary.iterations += 1;
            match outcome {
                IterationOutcome::Skipped(_) => summary.skipped += 1,
                IterationOutcome::Advised(_) => summary.advised += 1,
                IterationOutcome::ExchangeAbandoned => summary.abandoned += 1,
                IterationOutcome::FeedbackOff => summary.unsteered += 1,
                IterationOutcome::Swept => summary.swept += 1,
                IterationOutcome::SweepFinished(sweep) => {
                    summary.swept += 1;
                    summary.sweep = Some(sweep);
                    summary.stop = StopReason::SweepComplete;
                    break;
                }
            }
        }

        summary.final_view = self.view;
        summary.last_metrics = self.last_metrics.clone();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::SweepLog;
    use std::cell::Cell;
    use std::io::{self, Cursor, Read};

    // -----------------------------------------------------------------------
    // Test transports
    // -----------------------------------------------------------------------

    struct CannedStream(Cursor<Vec<u8>>);

    impl Read for CannedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for CannedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Always replies with the same pose.
    struct FixedPeer(ReplyRecord);

    impl Connector for FixedPeer {
        type Stream = CannedStream;
        fn connect(&mut self) -> io::Result<CannedStream> {
            Ok(CannedStream(Cursor::new(self.0.encode().to_vec())))
        }
        fn peer(&self) -> String {
            "fixed".into()
        }
    }

    struct NoPeer;

    impl Connector for NoPeer {
        type Stream = CannedStream;
        fn connect(&mut self) -> io::Result<CannedStream> {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
        fn peer(&self) -> String {
            "nowhere".into()
        }
    }

    fn hist(counts: &[u64]) -> Histogram {
        Histogram::new(counts.to_vec())
    }

    fn feedback_driver<C: Connector>(
        connector: C,
        provider: ReplayProvider,
    ) -> Driver<ReplayProvider, NullConsumer, C, Vec<u8>> {
        Driver::new(
            provider,
            NullConsumer,
            Steering::Feedback(FeedbackClient::new(connector)),
            ViewState::default(),
        )
    }

    fn sweep_driver(provider: ReplayProvider) -> Driver<ReplayProvider, NullConsumer, NoPeer, Vec<u8>> {
        Driver::new(
            provider,
            NullConsumer,
            Steering::Sweep(SweepController::with_log(SweepLog::from_writer(Vec::new(), "mem"))),
            ViewState::new(40.0, 50.0, -6.0),
        )
    }

    // -----------------------------------------------------------------------
    // Feedback mode
    // -----------------------------------------------------------------------

    #[test]
    fn advised_iteration_moves_the_view() {
        let provider = ReplayProvider::constant(hist(&[1, 2, 3]));
        let mut d = feedback_driver(FixedPeer(ReplyRecord::new(10.0, 20.0, -3.5)), provider);
        match d.iterate().unwrap() {
            IterationOutcome::Advised(r) => assert_eq!(r, ReplyRecord::new(10.0, 20.0, -3.5)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*d.view(), ViewState::new(10.0, 20.0, -3.5));
        assert_eq!(d.sample_total(), 6);
        let mi = d.last_metrics().unwrap().mutual_information.unwrap();
        assert!((mi - 2.0).abs() < 1e-9);
    }

    #[test]
    fn refused_peer_runs_unsteered() {
        let provider = ReplayProvider::constant(hist(&[1, 1, 1]));
        let mut d = feedback_driver(NoPeer, provider);
        let summary = d.run(Some(10)).unwrap();
        assert_eq!(summary.unsteered, 10);
        assert_eq!(summary.stop, StopReason::IterationLimit);
        assert_eq!(summary.final_view, ViewState::default());
    }

    #[test]
    fn degenerate_frame_is_skipped() {
        let provider =
            ReplayProvider::new(hist(&[1, 2, 3]), vec![hist(&[0, 0, 0]), hist(&[3, 2, 1])])
                .unwrap();
        let mut d = feedback_driver(FixedPeer(ReplyRecord::new(1.0, 1.0, -5.0)), provider);
        assert_eq!(
            d.iterate().unwrap(),
            IterationOutcome::Skipped(SkipReason::Degenerate(HistogramRole::Primary))
        );
        assert_eq!(*d.view(), ViewState::default());
        assert!(matches!(d.iterate().unwrap(), IterationOutcome::Advised(_)));
    }

    #[test]
    fn mismatched_bins_skip_the_exchange() {
        let provider = ReplayProvider::new(hist(&[1, 2, 3]), vec![hist(&[1, 2])]).unwrap();
        let mut d = feedback_driver(FixedPeer(ReplyRecord::new(9.0, 9.0, -9.0)), provider);
        assert_eq!(
            d.iterate().unwrap(),
            IterationOutcome::Skipped(SkipReason::BinCountMismatch {
                primary: 2,
                secondary: 3
            })
        );
        assert_eq!(*d.view(), ViewState::default());
        let metrics = d.last_metrics().unwrap();
        assert!(metrics.entropy_b.is_some());
        assert!(metrics.mutual_information.is_none());
    }

    #[test]
    fn frames_off_the_configured_bin_count_are_skipped() {
        let provider = ReplayProvider::new(hist(&[1, 2, 3]), vec![hist(&[3, 2, 1, 0])]).unwrap();
        let mut d = feedback_driver(FixedPeer(ReplyRecord::new(9.0, 9.0, -9.0)), provider)
            .with_bin_count(3);
        assert_eq!(
            d.iterate().unwrap(),
            IterationOutcome::Skipped(SkipReason::UnexpectedBinCount {
                role: HistogramRole::Primary,
                expected: 3,
                actual: 4,
            })
        );
        assert_eq!(*d.view(), ViewState::default());
        assert!(d.last_metrics().is_none());
    }

    #[test]
    fn sweep_rejects_histograms_off_the_configured_bin_count() {
        let mut d = sweep_driver(ReplayProvider::constant(hist(&[1, 2, 3]))).with_bin_count(511);
        assert_eq!(d.bin_count(), Some(511));
        let summary = d.run(Some(3)).unwrap();
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.swept, 0);
        match d.steering() {
            Steering::Sweep(ctl) => assert_eq!(ctl.rows(), 0),
            Steering::Feedback(_) => panic!("expected sweep"),
        }
        assert_eq!(*d.view(), ViewState::new(0.0, 0.0, -6.0));
    }

    #[test]
    fn matching_configured_bin_count_still_sweeps() {
        let mut d = sweep_driver(ReplayProvider::constant(hist(&[1, 2, 3]))).with_bin_count(3);
        assert_eq!(d.iterate().unwrap(), IterationOutcome::Swept);
    }

    #[test]
    fn consumer_sees_every_pose() {
        let seen = Cell::new(0u32);
        let provider = ReplayProvider::constant(hist(&[2, 2]));
        let mut d = Driver::<_, _, _, Vec<u8>>::new(
            provider,
            |_: &ViewState| seen.set(seen.get() + 1),
            Steering::Feedback(FeedbackClient::new(NoPeer)),
            ViewState::default(),
        );
        d.run(Some(4)).unwrap();
        assert_eq!(seen.get(), 4);
    }

    #[test]
    fn interrupt_stops_before_next_iteration() {
        let provider = ReplayProvider::constant(hist(&[2, 2]));
        let mut d = feedback_driver(NoPeer, provider);
        let calls = Cell::new(0);
        let summary = d
            .run_until(None, || {
                calls.set(calls.get() + 1);
                calls.get() > 3
            })
            .unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.stop, StopReason::Interrupted);
    }

    // -----------------------------------------------------------------------
    // Sweep mode
    // -----------------------------------------------------------------------

    #[test]
    fn sweep_starts_at_origin_and_keeps_translation() {
        let d = sweep_driver(ReplayProvider::constant(hist(&[1, 2])));
        assert_eq!(*d.view(), ViewState::new(0.0, 0.0, -6.0));
    }

    #[test]
    fn sweep_runs_to_completion() {
        let mut d = sweep_driver(ReplayProvider::constant(hist(&[1, 2, 3, 4])));
        let summary = d.run(None).unwrap();
        assert_eq!(summary.stop, StopReason::SweepComplete);
        assert_eq!(summary.swept, crate::sweep::SWEEP_TOTAL_ITERATIONS);
        assert_eq!(summary.sweep.unwrap().rows, crate::sweep::SWEEP_TOTAL_ITERATIONS);
        assert_eq!(summary.final_view.translation_z, -6.0);
    }

    #[test]
    fn skipped_iterations_do_not_advance_the_sweep() {
        let provider = ReplayProvider::new(hist(&[1, 2]), vec![hist(&[0, 0])]).unwrap();
        let mut d = sweep_driver(provider);
        let summary = d.run(Some(5)).unwrap();
        assert_eq!(summary.skipped, 5);
        assert_eq!(summary.swept, 0);
        assert_eq!(*d.view(), ViewState::new(0.0, 0.0, -6.0));
    }

    #[test]
    fn replay_needs_frames() {
        assert!(ReplayProvider::new(hist(&[1]), Vec::new()).is_err());
    }
}
