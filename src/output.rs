//! Result types returned to callers.

use crate::error::{FrameError, QrScanError};
use crate::pipeline::decode::Symbol;
use crate::pipeline::input::MediaKind;
use serde::{Serialize, Serializer};

/// Terminal value of one scan: a payload or nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum ScanResult {
    Found(String),
    NotFound,
}

impl ScanResult {
    pub fn payload(&self) -> Option<&str> {
        match self {
            ScanResult::Found(p) => Some(p),
            ScanResult::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ScanResult::Found(_))
    }
}

/// Everything observed while scanning one input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Display name of the input (file name, URL or caller-provided label).
    pub input_name: String,
    /// How the input was classified.
    pub media_kind: MediaKind,
    /// Frames the source could produce (pages selected, or 1 for images).
    pub total_frames: usize,
    /// Frames handed to the decoder.
    pub frames_scanned: usize,
    /// 0-based ordinal of the frame that yielded the symbol.
    pub matched_frame: Option<usize>,
    /// The decoded symbol, with geometry.
    pub symbol: Option<Symbol>,
    /// Pages that failed to render and were skipped.
    pub frame_errors: Vec<FrameError>,
    /// Time spent opening the source and rendering frames.
    pub render_duration_ms: u64,
    /// Time spent in the decoder.
    pub decode_duration_ms: u64,
    /// Wall-clock time of the whole submission.
    pub total_duration_ms: u64,
}

/// What a caller receives for one submission.
///
/// Hard failures are normalised: `result` is `NotFound` and `failure`
/// carries the diagnostic.
#[derive(Debug, Serialize)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub report: ScanReport,
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<QrScanError>,
}

impl ScanOutcome {
    pub fn payload(&self) -> Option<&str> {
        self.result.payload()
    }

    /// `true` when the input was neither an image nor a document.
    pub fn is_unsupported(&self) -> bool {
        self.report.media_kind == MediaKind::Unsupported
    }

    /// Convert into a `Result`, surfacing the normalised failure as `Err`.
    pub fn into_result(self) -> Result<ScanResult, QrScanError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.result),
        }
    }
}

fn serialize_failure<S>(failure: &Option<QrScanError>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match failure {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// Cheap summary of an input without scanning it.
#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub name: String,
    pub media_kind: MediaKind,
    pub byte_len: usize,
    /// 1 for images, the page count for documents, 0 when unsupported.
    pub frame_count: usize,
}
