//! Error types for the qrscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QrScanError`] — **Fatal**: the input cannot be scanned at all
//!   (missing file, corrupt image, encrypted PDF, every page unrenderable).
//!   The orchestrator normalises these into a "no result" outcome with the
//!   error attached as a diagnostic; [`crate::output::ScanOutcome::into_result`]
//!   turns them back into an `Err` for callers that prefer `?`.
//!
//! * [`FrameError`] — **Non-fatal**: a single page could not be rasterised
//!   but the remaining pages are still scanned. Collected in
//!   [`crate::output::ScanReport::frame_errors`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the qrscan library.
#[derive(Debug, Error)]
pub enum QrScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input is neither an image nor a document we can rasterise.
    #[error("Unsupported input '{name}' (declared type: {declared})")]
    UnsupportedInput { name: String, declared: String },

    // ── Decoding errors ───────────────────────────────────────────────────
    /// The bytes are not a valid instance of their declared kind.
    #[error("Could not decode '{name}' as {kind}: {detail}")]
    DecodeFailure {
        name: String,
        kind: &'static str,
        detail: String,
    },

    /// PDF requires a password but none was provided.
    #[error("Document '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for document '{name}'")]
    WrongPassword { name: String },

    /// The page selection matched none of the document's pages.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Scan errors ───────────────────────────────────────────────────────
    /// A page failed to render and the fail-fast policy is active.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailure { page: usize, detail: String },

    /// Every page that was attempted failed to render.
    #[error("All {total} pages failed to render.\nFirst error: {first_error}")]
    AllFramesFailed { total: usize, first_error: String },

    /// The caller cancelled the scan between two frames.
    #[error("Scan cancelled after {scanned} frames")]
    Cancelled { scanned: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF input needs the PDFium shared library. You can:\n\
  • Place libpdfium next to the executable or in the working directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QrScanError {
    /// `true` for the soft "we don't handle this kind of file" error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, QrScanError::UnsupportedInput { .. })
    }
}

/// A non-fatal error for a single frame.
///
/// The scan continues with the next page unless the fail-fast policy is
/// configured.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FrameError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },
}

impl FrameError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            FrameError::RenderFailed { page, .. } => *page,
        }
    }
}
