//! Pipeline orchestrator: one file in, one [`ScanOutcome`] out.
//!
//! ```text
//! Idle ─▶ Classifying ─▶ Rendering ─▶ Scanning ─▶ Done(Found|NotFound) ─▶ Idle
//!   └──────────────┴────────────┴───────────┴──▶ Failed ─▶ Idle
//! ```
//!
//! [`Orchestrator::submit`] takes `&mut self`, so a second submission on
//! the same instance cannot start while one is in flight. The render and
//! decode loop runs on a single `spawn_blocking` thread because PDFium is
//! not async-safe; frames are still produced and decoded one at a time.
//!
//! Dropping a `submit` future before it resolves (a `select!` or a
//! `timeout`) cancels that submission: the blocking loop stops at the next
//! frame boundary and the state goes `Failed` then `Idle`. A later
//! submission's blocking loop waits until the abandoned one has stopped.
//!
//! State changes are published on a `watch` channel. Only the orchestrator
//! writes to it; [`Orchestrator::subscribe`] hands out read-only receivers.

use crate::config::ScanConfig;
use crate::error::QrScanError;
use crate::output::{ScanOutcome, ScanReport, ScanResult};
use crate::pipeline::decode::{RqrrDecoder, SymbolDecoder};
use crate::pipeline::document::{DocumentRenderer, PdfiumRenderer};
use crate::pipeline::frames::FrameSource;
use crate::pipeline::input::{InputFile, MediaKind};
use crate::pipeline::scanner::{CancelHandle, ScanEnd, ScanPass, Scanner};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Classifying,
    Rendering,
    Scanning,
    Done(ScanResult),
    Failed(String),
}

/// The orchestrator-owned state slot.
#[derive(Clone)]
struct StateSlot(Arc<watch::Sender<PipelineState>>);

impl StateSlot {
    fn set(&self, state: PipelineState) {
        debug!("Pipeline state → {:?}", state);
        self.0.send_replace(state);
    }

    /// Like [`set`](Self::set), but a no-op once `cancel` is raised.
    ///
    /// The flag is checked under the channel's write lock, so this cannot
    /// land after the `Failed`/`Idle` pair published for a dropped submission.
    fn set_unless_cancelled(&self, state: PipelineState, cancel: &CancelHandle) {
        self.0.send_if_modified(|slot| {
            if cancel.is_cancelled() {
                return false;
            }
            debug!("Pipeline state → {:?}", state);
            *slot = state;
            true
        });
    }
}

/// Armed while a submission is in flight. If the `submit` future is dropped
/// first, this cancels the blocking loop and returns the state to `Idle`.
struct InFlight {
    state: StateSlot,
    cancel: CancelHandle,
    armed: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Submission dropped before completion; cancelling");
        self.cancel.cancel();
        self.state.set(PipelineState::Failed(
            "submission dropped before completion".to_string(),
        ));
        self.state.set(PipelineState::Idle);
    }
}

/// Runs submissions through classification, frame production and scanning.
pub struct Orchestrator {
    config: ScanConfig,
    renderer: Arc<dyn DocumentRenderer>,
    decoder: Arc<dyn SymbolDecoder>,
    state: StateSlot,
    cancel: CancelHandle,
    /// Held by the blocking loop for its whole run.
    worker: Arc<Mutex<()>>,
}

impl Orchestrator {
    /// Orchestrator backed by PDFium and `rqrr`.
    pub fn new(config: ScanConfig) -> Self {
        let decoder = RqrrDecoder::new(config.inversion);
        Self::with_backends(config, Arc::new(PdfiumRenderer), Arc::new(decoder))
    }

    /// Orchestrator with caller-supplied rendering and decoding capabilities.
    pub fn with_backends(
        config: ScanConfig,
        renderer: Arc<dyn DocumentRenderer>,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Self {
        let (tx, _rx) = watch::channel(PipelineState::Idle);
        Self {
            config,
            renderer,
            decoder,
            state: StateSlot(Arc::new(tx)),
            cancel: CancelHandle::default(),
            worker: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state.0.borrow().clone()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.0.subscribe()
    }

    /// Handle that cancels the next submission (or the one in flight)
    /// between two frames.
    ///
    /// Each submission takes the current handle for itself, so a handle
    /// obtained afterwards belongs to the submission after that.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Scan `file` and publish the outcome.
    ///
    /// Never returns an error: hard failures are logged and normalised into
    /// `result = NotFound` with `failure` set.
    pub async fn submit(&mut self, file: InputFile) -> ScanOutcome {
        let start = Instant::now();
        let cancel = std::mem::take(&mut self.cancel);
        let mut in_flight = InFlight {
            state: self.state.clone(),
            cancel: cancel.clone(),
            armed: true,
        };

        self.state.set(PipelineState::Classifying);
        let kind = file.classify();
        info!("Scanning '{}' as {}", file.name(), kind.as_str());

        let mut report = ScanReport {
            input_name: file.name().to_string(),
            media_kind: kind,
            ..ScanReport::default()
        };

        self.state.set(PipelineState::Rendering);
        let renderer = Arc::clone(&self.renderer);
        let decoder = Arc::clone(&self.decoder);
        let config = self.config.clone();
        let state = self.state.clone();
        let worker = Arc::clone(&self.worker);

        let joined = tokio::task::spawn_blocking(move || {
            let _running = worker.lock().unwrap_or_else(PoisonError::into_inner);
            run_scan(&file, kind, &*renderer, &*decoder, &config, &state, &cancel)
        })
        .await;
        in_flight.armed = false;

        let scanned = match joined {
            Ok(scanned) => scanned,
            Err(e) => Err(QrScanError::Internal(format!("Scan task panicked: {}", e))),
        };

        let (result, failure) = match scanned {
            Ok((total_frames, pass)) => {
                report.total_frames = total_frames;
                fill_report(&mut report, pass)
            }
            Err(e) if e.is_unsupported() => {
                warn!("{}", e);
                report.media_kind = MediaKind::Unsupported;
                (ScanResult::NotFound, None)
            }
            Err(e) => (ScanResult::NotFound, Some(e)),
        };
        report.total_duration_ms = start.elapsed().as_millis() as u64;

        match &failure {
            Some(e) => {
                error!("Scan of '{}' failed: {}", report.input_name, e);
                self.state.set(PipelineState::Failed(e.to_string()));
            }
            None => {
                info!(
                    "Scan of '{}' done: {} ({}/{} frames, {}ms)",
                    report.input_name,
                    if result.is_found() { "found" } else { "not found" },
                    report.frames_scanned,
                    report.total_frames,
                    report.total_duration_ms
                );
                self.state.set(PipelineState::Done(result.clone()));
            }
        }
        self.state.set(PipelineState::Idle);

        ScanOutcome {
            result,
            report,
            failure,
        }
    }
}

/// Blocking body of one submission: open the source, then scan it.
fn run_scan(
    file: &InputFile,
    kind: MediaKind,
    renderer: &dyn DocumentRenderer,
    decoder: &dyn SymbolDecoder,
    config: &ScanConfig,
    state: &StateSlot,
    cancel: &CancelHandle,
) -> Result<(usize, ScanPass), QrScanError> {
    let open_start = Instant::now();
    let mut source = FrameSource::new(renderer);
    let frames = source.frames(file, kind, config)?;
    let total = frames.total();
    let open_time = open_start.elapsed();

    state.set_unless_cancelled(PipelineState::Scanning, cancel);
    let scanner = Scanner::new(decoder, config.frame_policy)
        .with_progress(config.progress_callback.as_deref());
    let mut pass = scanner.scan(frames, total, cancel);
    pass.render_time += open_time;
    Ok((total, pass))
}

/// Copy pass bookkeeping into the report and split off any abort error.
fn fill_report(report: &mut ScanReport, pass: ScanPass) -> (ScanResult, Option<QrScanError>) {
    report.frames_scanned = pass.frames_scanned;
    report.frame_errors = pass.frame_errors;
    report.render_duration_ms = pass.render_time.as_millis() as u64;
    report.decode_duration_ms = pass.decode_time.as_millis() as u64;

    match pass.end {
        ScanEnd::Found { frame, symbol } => {
            let result = ScanResult::Found(symbol.payload.clone());
            report.matched_frame = Some(frame);
            report.symbol = Some(symbol);
            (result, None)
        }
        ScanEnd::Exhausted => (ScanResult::NotFound, None),
        ScanEnd::Aborted(e) => (ScanResult::NotFound, Some(e)),
    }
}
