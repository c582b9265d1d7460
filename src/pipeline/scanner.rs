//! Scanner: walk a frame sequence in order and stop at the first symbol.
//!
//! Frames are pulled one at a time, so frame N+1 is never rendered before
//! frame N has been decoded. That gives deterministic first-match-wins
//! semantics and lets a lazy document source skip every page after the
//! match.

use crate::config::FramePolicy;
use crate::error::{FrameError, QrScanError};
use crate::output::ScanResult;
use crate::pipeline::decode::{Symbol, SymbolDecoder};
use crate::pipeline::frames::RasterFrame;
use crate::progress::ScanProgressCallback;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation. The frame currently being decoded finishes first.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a scan pass ended.
#[derive(Debug)]
pub enum ScanEnd {
    /// A frame yielded a symbol.
    Found { frame: usize, symbol: Symbol },
    /// The sequence ran out without a match.
    Exhausted,
    /// The pass stopped early: fail-fast render error, every frame failed,
    /// or cancellation.
    Aborted(QrScanError),
}

/// Outcome and bookkeeping of one pass over a frame sequence.
#[derive(Debug)]
pub struct ScanPass {
    pub end: ScanEnd,
    pub frames_scanned: usize,
    pub frame_errors: Vec<FrameError>,
    pub render_time: Duration,
    pub decode_time: Duration,
}

impl ScanPass {
    pub fn result(&self) -> ScanResult {
        match &self.end {
            ScanEnd::Found { symbol, .. } => ScanResult::Found(symbol.payload.clone()),
            ScanEnd::Exhausted | ScanEnd::Aborted(_) => ScanResult::NotFound,
        }
    }
}

/// Drives a [`SymbolDecoder`] over a frame sequence.
pub struct Scanner<'a> {
    decoder: &'a dyn SymbolDecoder,
    policy: FramePolicy,
    progress: Option<&'a dyn ScanProgressCallback>,
}

impl<'a> Scanner<'a> {
    pub fn new(decoder: &'a dyn SymbolDecoder, policy: FramePolicy) -> Self {
        Self {
            decoder,
            policy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a dyn ScanProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Scan `frames` strictly in order.
    ///
    /// `total` is only used for progress reporting. Cancellation is checked
    /// before each frame is pulled, unless the iterator reports that no
    /// frames remain.
    pub fn scan<I>(&self, frames: I, total: usize, cancel: &CancelHandle) -> ScanPass
    where
        I: IntoIterator<Item = Result<RasterFrame, FrameError>>,
    {
        if let Some(cb) = self.progress {
            cb.on_scan_start(total);
        }

        let pass = self.run(frames.into_iter(), total, cancel);

        if let Some(cb) = self.progress {
            cb.on_scan_complete(pass.frames_scanned, matches!(pass.end, ScanEnd::Found { .. }));
        }
        pass
    }

    fn run<I>(&self, mut frames: I, total: usize, cancel: &CancelHandle) -> ScanPass
    where
        I: Iterator<Item = Result<RasterFrame, FrameError>>,
    {
        let mut pass = ScanPass {
            end: ScanEnd::Exhausted,
            frames_scanned: 0,
            frame_errors: Vec::new(),
            render_time: Duration::ZERO,
            decode_time: Duration::ZERO,
        };

        loop {
            // A cancel that lands while the last frame decodes does not turn
            // a finished pass into a cancelled one.
            if frames.size_hint().1 == Some(0) {
                break;
            }
            if cancel.is_cancelled() {
                info!("Scan cancelled after {} frames", pass.frames_scanned);
                pass.end = ScanEnd::Aborted(QrScanError::Cancelled {
                    scanned: pass.frames_scanned,
                });
                return pass;
            }

            let render_start = Instant::now();
            let Some(item) = frames.next() else { break };
            pass.render_time += render_start.elapsed();

            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    let page = e.page();
                    if let Some(cb) = self.progress {
                        cb.on_frame_error(page, total, &e.to_string());
                    }
                    match self.policy {
                        FramePolicy::FailFast => {
                            let FrameError::RenderFailed { page, detail } = e;
                            pass.end = ScanEnd::Aborted(QrScanError::RenderFailure { page, detail });
                            return pass;
                        }
                        FramePolicy::SkipAndContinue => {
                            warn!("Skipping page {}: {}", page, e);
                            pass.frame_errors.push(e);
                            continue;
                        }
                    }
                }
            };

            if let Some(cb) = self.progress {
                cb.on_frame_start(frame.page_num(), total);
            }

            let decode_start = Instant::now();
            let symbol = self.decoder.decode(&frame);
            pass.decode_time += decode_start.elapsed();
            pass.frames_scanned += 1;

            if let Some(cb) = self.progress {
                cb.on_frame_scanned(frame.page_num(), total, symbol.is_some());
            }

            if let Some(symbol) = symbol {
                debug!(
                    "Frame {} yielded a v{} symbol ({} bytes)",
                    frame.page_num(),
                    symbol.version,
                    symbol.payload.len()
                );
                pass.end = ScanEnd::Found {
                    frame: frame.index,
                    symbol,
                };
                return pass;
            }
            debug!("Frame {}: no symbol", frame.page_num());
        }

        if pass.frames_scanned == 0 && !pass.frame_errors.is_empty() {
            let first_error = pass.frame_errors[0].to_string();
            pass.end = ScanEnd::Aborted(QrScanError::AllFramesFailed {
                total: pass.frame_errors.len(),
                first_error,
            });
        }
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{blank, CountingDecoder};
    use std::sync::atomic::AtomicUsize;

    fn render_failed(index: usize) -> Result<RasterFrame, FrameError> {
        Err(FrameError::RenderFailed {
            page: index + 1,
            detail: "boom".into(),
        })
    }

    #[test]
    fn stops_at_page_k_after_k_decodes() {
        let decoder = CountingDecoder::new(&[(3, "third")]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let pulled = AtomicUsize::new(0);
        let frames = (0..8).map(|i| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(blank(i))
        });

        let pass = scanner.scan(frames, 8, &CancelHandle::default());
        assert_eq!(pass.result(), ScanResult::Found("third".into()));
        assert!(matches!(pass.end, ScanEnd::Found { frame: 3, .. }));
        assert_eq!(decoder.calls(), 4);
        assert_eq!(pulled.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn first_match_wins() {
        let decoder = CountingDecoder::new(&[(0, "A"), (1, "B")]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);

        let pass = scanner.scan((0..2).map(|i| Ok(blank(i))), 2, &CancelHandle::default());
        assert_eq!(pass.result(), ScanResult::Found("A".into()));
        assert_eq!(decoder.calls(), 1);
    }

    #[test]
    fn empty_sequence_is_not_found_without_decoding() {
        let decoder = CountingDecoder::new(&[]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);

        let pass = scanner.scan(std::iter::empty(), 0, &CancelHandle::default());
        assert!(matches!(pass.end, ScanEnd::Exhausted));
        assert_eq!(decoder.calls(), 0);
    }

    #[test]
    fn skips_failed_frames_by_default() {
        let decoder = CountingDecoder::new(&[(2, "after gap")]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let frames = vec![Ok(blank(0)), render_failed(1), Ok(blank(2))];

        let pass = scanner.scan(frames, 3, &CancelHandle::default());
        assert_eq!(pass.result(), ScanResult::Found("after gap".into()));
        assert_eq!(pass.frame_errors.len(), 1);
        assert_eq!(pass.frame_errors[0].page(), 2);
    }

    #[test]
    fn fail_fast_aborts_on_first_render_error() {
        let decoder = CountingDecoder::new(&[(2, "unreached")]);
        let scanner = Scanner::new(&decoder, FramePolicy::FailFast);
        let frames = vec![Ok(blank(0)), render_failed(1), Ok(blank(2))];

        let pass = scanner.scan(frames, 3, &CancelHandle::default());
        assert!(matches!(
            pass.end,
            ScanEnd::Aborted(QrScanError::RenderFailure { page: 2, .. })
        ));
        assert_eq!(decoder.calls(), 1);
    }

    #[test]
    fn all_frames_failing_is_distinct_from_empty() {
        let decoder = CountingDecoder::new(&[]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let frames = vec![render_failed(0), render_failed(1)];

        let pass = scanner.scan(frames, 2, &CancelHandle::default());
        match &pass.end {
            ScanEnd::Aborted(QrScanError::AllFramesFailed { total, first_error }) => {
                assert_eq!(*total, 2);
                assert!(first_error.contains("Page 1"));
            }
            other => panic!("expected AllFramesFailed, got {other:?}"),
        }
        assert_eq!(pass.result(), ScanResult::NotFound);
    }

    #[test]
    fn partial_failures_without_match_are_not_found() {
        let decoder = CountingDecoder::new(&[]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let frames = vec![render_failed(0), Ok(blank(1))];

        let pass = scanner.scan(frames, 2, &CancelHandle::default());
        assert!(matches!(pass.end, ScanEnd::Exhausted));
        assert_eq!(pass.frames_scanned, 1);
    }

    #[test]
    fn cancellation_is_checked_between_frames() {
        let decoder = CountingDecoder::new(&[]);
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let cancel = CancelHandle::default();
        let trigger = cancel.clone();
        let frames = (0..5).map(move |i| {
            if i == 1 {
                trigger.cancel();
            }
            Ok(blank(i))
        });

        let pass = scanner.scan(frames, 5, &cancel);
        // Frame 1 was already pulled when the flag flipped; it still completes.
        assert_eq!(pass.frames_scanned, 2);
        assert!(matches!(
            pass.end,
            ScanEnd::Aborted(QrScanError::Cancelled { scanned: 2 })
        ));
    }

    /// Flips the cancel flag while decoding the frame at `at`.
    struct CancelWhileDecoding {
        cancel: CancelHandle,
        at: usize,
    }

    impl SymbolDecoder for CancelWhileDecoding {
        fn decode(&self, frame: &RasterFrame) -> Option<Symbol> {
            if frame.index == self.at {
                self.cancel.cancel();
            }
            None
        }
    }

    #[test]
    fn cancel_during_last_frame_still_completes() {
        let cancel = CancelHandle::default();
        let decoder = CancelWhileDecoding {
            cancel: cancel.clone(),
            at: 2,
        };
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let frames = vec![Ok(blank(0)), Ok(blank(1)), Ok(blank(2))];

        let pass = scanner.scan(frames, 3, &cancel);
        assert!(matches!(pass.end, ScanEnd::Exhausted));
        assert_eq!(pass.frames_scanned, 3);
    }

    #[test]
    fn cancel_before_last_frame_aborts() {
        let cancel = CancelHandle::default();
        let decoder = CancelWhileDecoding {
            cancel: cancel.clone(),
            at: 1,
        };
        let scanner = Scanner::new(&decoder, FramePolicy::SkipAndContinue);
        let frames = vec![Ok(blank(0)), Ok(blank(1)), Ok(blank(2))];

        let pass = scanner.scan(frames, 3, &cancel);
        assert!(matches!(
            pass.end,
            ScanEnd::Aborted(QrScanError::Cancelled { scanned: 2 })
        ));
    }
}
