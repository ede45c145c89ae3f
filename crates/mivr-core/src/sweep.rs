//! Exhaustive orientation sweep with CSV logging.
//!
//! Used instead of the feedback client when building ground-truth viewpoint
//! quality maps offline. Each iteration logs the current pose and mutual
//! information, then advances a two-counter schedule over a 361 × 361 grid of
//! whole-degree rotations. The sweep never talks to the advisory peer.
//!
//! # Log format
//!
//! One line per iteration, no header, trailing comma:
//!
//! ```text
//! rotationX,rotationY,translationZ,mutualInformation,
//! ```
//!
//! Numbers use [`legacy_float`] so the file matches logs produced by the C++
//! renderer byte for byte.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::format::legacy_float;
use crate::view::ViewState;

/// Largest rotation, in degrees, visited on either axis.
pub const SWEEP_MAX_DEGREES: f32 = 360.0;
/// Number of orientations visited per axis.
pub const SWEEP_STEPS_PER_AXIS: u64 = 361;
/// Iterations in a complete sweep.
pub const SWEEP_TOTAL_ITERATIONS: u64 = SWEEP_STEPS_PER_AXIS * SWEEP_STEPS_PER_AXIS;

/// Default log file name.
pub const DEFAULT_LOG_PATH: &str = "ValidationData.csv";

/// Position on the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SweepState {
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub finished: bool,
}

impl SweepState {
    /// Advance one step. Returns `true` once the grid is exhausted.
    ///
    /// `rotation_y` steps by 1 and wraps to 0 after passing 360, carrying into
    /// `rotation_x`. The sweep is over when `rotation_x` passes 360.
    pub fn advance(&mut self) -> bool {
        if self.finished {
            return true;
        }
        self.rotation_y += 1.0;
        if self.rotation_y > SWEEP_MAX_DEGREES {
            self.rotation_y = 0.0;
            self.rotation_x += 1.0;
        }
        if self.rotation_x > SWEEP_MAX_DEGREES {
            self.finished = true;
        }
        self.finished
    }
}

/// Append-only CSV sink for sweep rows.
pub struct SweepLog<W: Write = BufWriter<File>> {
    writer: W,
    label: String,
    rows: u64,
}

impl SweepLog<BufWriter<File>> {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::LogWriteFailure {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_writer(BufWriter::new(file), path.display().to_string()))
    }
}

impl<W: Write> SweepLog<W> {
    /// Log into any writer. `label` names it in errors.
    pub fn from_writer(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer,
            label: label.into(),
            rows: 0,
        }
    }

    /// Write one row and flush it.
    pub fn append(&mut self, view: &ViewState, mutual_information: f32) -> Result<()> {
        let line = format!(
            "{},{},{},{},\n",
            legacy_float(f64::from(view.rotation_x)),
            legacy_float(f64::from(view.rotation_y)),
            legacy_float(f64::from(view.translation_z)),
            legacy_float(f64::from(mutual_information)),
        );
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|source| Error::LogWriteFailure {
                path: self.label.clone(),
                source,
            })?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().map_err(|source| Error::LogWriteFailure {
            path: self.label.clone(),
            source,
        })?;
        Ok(self.writer)
    }
}

/// Result of a completed sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSummary {
    pub rows: u64,
    pub log: String,
}

/// What a sweep step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepStep {
    /// A row was logged and the pose advanced.
    Continue,
    /// The grid is exhausted and the log is closed.
    Finished(SweepSummary),
}

/// Drives [`SweepState`] and writes one log row per step.
pub struct SweepController<W: Write = BufWriter<File>> {
    state: SweepState,
    log: Option<SweepLog<W>>,
    summary: Option<SweepSummary>,
    path: Option<PathBuf>,
}

impl SweepController<BufWriter<File>> {
    /// Start a sweep logging to a fresh file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let log = SweepLog::create(path)?;
        log::info!("sweep logging to {}", path.display());
        let mut ctl = Self::with_log(log);
        ctl.path = Some(path.to_path_buf());
        Ok(ctl)
    }
}

impl<W: Write> SweepController<W> {
    /// Start a sweep at `(0, 0)` over an existing log.
    pub fn with_log(log: SweepLog<W>) -> Self {
        Self {
            state: SweepState::default(),
            log: Some(log),
            summary: None,
            path: None,
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        match (&self.log, &self.summary) {
            (Some(log), _) => log.rows(),
            (None, Some(summary)) => summary.rows,
            (None, None) => 0,
        }
    }

    /// Copy the sweep rotation into `view`. Translation is left alone.
    pub fn apply_to(&self, view: &mut ViewState) {
        sync_view(&self.state, view);
    }

    /// Log the current pose with `mutual_information`, then advance.
    ///
    /// `view` is synced to the sweep position before the row is written and
    /// receives the next position afterwards. Once the grid is exhausted the
    /// log is closed and every later call returns the same summary without
    /// writing.
    pub fn step(&mut self, view: &mut ViewState, mutual_information: f32) -> Result<SweepStep> {
        if let Some(summary) = &self.summary {
            return Ok(SweepStep::Finished(summary.clone()));
        }
        let Some(log) = self.log.as_mut() else {
            return Err(Error::Config("sweep log already closed".into()));
        };

        sync_view(&self.state, view);
        log.append(view, mutual_information)?;

        let prev_x = self.state.rotation_x;
        let done = self.state.advance();
        sync_view(&self.state, view);

        if self.state.rotation_x != prev_x {
            log::info!(
                "sweep: finished rotation_x = {} ({} rows)",
                legacy_float(f64::from(prev_x)),
                log.rows()
            );
        }
        if !done {
            return Ok(SweepStep::Continue);
        }

        let log = self.log.take().ok_or_else(|| Error::Config("sweep log missing".into()))?;
        let summary = SweepSummary {
            rows: log.rows(),
            log: log.label().to_string(),
        };
        log.finish()?;
        log::info!("sweep complete: {} rows written to {}", summary.rows, summary.log);
        self.summary = Some(summary.clone());
        Ok(SweepStep::Finished(summary))
    }
}

fn sync_view(state: &SweepState, view: &mut ViewState) {
    view.rotation_x = state.rotation_x;
    view.rotation_y = state.rotation_y;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_sweep() -> SweepController<Vec<u8>> {
        SweepController::with_log(SweepLog::from_writer(Vec::new(), "memory"))
    }

    // -----------------------------------------------------------------------
    // Schedule
    // -----------------------------------------------------------------------

    #[test]
    fn wraps_after_361_steps() {
        let mut s = SweepState::default();
        for _ in 0..360 {
            assert!(!s.advance());
        }
        assert_eq!((s.rotation_x, s.rotation_y), (0.0, 360.0));
        assert!(!s.advance());
        assert_eq!((s.rotation_x, s.rotation_y), (1.0, 0.0));
    }

    #[test]
    fn terminates_after_full_grid() {
        let mut s = SweepState::default();
        let mut steps = 0u64;
        while !s.advance() {
            steps += 1;
        }
        assert_eq!(steps + 1, SWEEP_TOTAL_ITERATIONS);
        assert_eq!(s.rotation_x, 361.0);
        assert!(s.advance());
    }

    // -----------------------------------------------------------------------
    // Controller
    // -----------------------------------------------------------------------

    #[test]
    fn one_row_per_step_in_field_order() {
        let mut ctl = memory_sweep();
        let mut view = ViewState::new(99.0, 99.0, -4.0);
        ctl.step(&mut view, 1.5).unwrap();
        ctl.step(&mut view, 0.25).unwrap();
        assert_eq!(view, ViewState::new(0.0, 2.0, -4.0));
        assert_eq!(ctl.rows(), 2);

        let log = ctl.log.take().unwrap().finish().unwrap();
        let text = String::from_utf8(log).unwrap();
        assert_eq!(text, "0,0,-4,1.5,\n0,1,-4,0.25,\n");
    }

    #[test]
    fn translation_is_never_swept() {
        let mut ctl = memory_sweep();
        let mut view = ViewState::new(0.0, 0.0, -7.5);
        for _ in 0..500 {
            ctl.step(&mut view, 0.0).unwrap();
        }
        assert_eq!(view.translation_z, -7.5);
        assert_eq!((view.rotation_x, view.rotation_y), (1.0, 139.0));
    }

    #[test]
    fn finishes_and_stays_finished() {
        let mut ctl = memory_sweep();
        let mut view = ViewState::default();
        let mut finished = None;
        for i in 0..SWEEP_TOTAL_ITERATIONS {
            match ctl.step(&mut view, 0.5).unwrap() {
                SweepStep::Continue => {}
                SweepStep::Finished(summary) => {
                    assert_eq!(i + 1, SWEEP_TOTAL_ITERATIONS);
                    finished = Some(summary);
                }
            }
        }
        let summary = finished.expect("sweep should finish on the last iteration");
        assert_eq!(summary.rows, SWEEP_TOTAL_ITERATIONS);
        assert!(ctl.is_finished());

        // Further steps write nothing.
        assert_eq!(
            ctl.step(&mut view, 0.5).unwrap(),
            SweepStep::Finished(summary)
        );
        assert_eq!(ctl.rows(), SWEEP_TOTAL_ITERATIONS);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::Other))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_log_write_failure() {
        let mut ctl = SweepController::with_log(SweepLog::from_writer(BrokenWriter, "broken.csv"));
        let mut view = ViewState::default();
        match ctl.step(&mut view, 1.0) {
            Err(Error::LogWriteFailure { path, .. }) => assert_eq!(path, "broken.csv"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
