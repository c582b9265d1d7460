//! # qrscan
//!
//! Find and decode the first QR code in an image or a multi-page PDF.
//!
//! ## What it does
//!
//! An uploaded file is classified as an image, a document or something
//! else. Images become a single frame. Documents become a lazy sequence of
//! page renders: page N+1 is only rasterised after page N has been
//! decoded, so a code on page 2 of a 300-page PDF costs two renders. The
//! first frame that yields a symbol wins.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / URL / bytes
//!  │
//!  ├─ 1. Input     read local file or download from URL
//!  ├─ 2. Classify  declared MIME → extension → magic bytes
//!  ├─ 3. Frames    decode image, or render PDF pages on demand (pdfium)
//!  ├─ 4. Scan      rqrr over each frame in order, stop at first match
//!  └─ 5. Outcome   Found(payload) | NotFound, plus a scan report
//! ```
//!
//! Steps 3 and 4 run together on one `spawn_blocking` thread.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qrscan::{scan, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let outcome = scan("boarding-pass.pdf", &ScanConfig::default()).await?;
//!     match outcome.payload() {
//!         Some(text) => println!("{text}"),
//!         None => eprintln!("no QR code in {} frames", outcome.report.frames_scanned),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For state observation and cancellation, drive an [`Orchestrator`]
//! directly:
//!
//! ```rust,no_run
//! use qrscan::{InputFile, Orchestrator, ScanConfig};
//!
//! # async fn run(bytes: Vec<u8>) {
//! let mut orchestrator = Orchestrator::new(ScanConfig::default());
//! let mut states = orchestrator.subscribe();
//! tokio::spawn(async move {
//!     while states.changed().await.is_ok() {
//!         println!("{:?}", *states.borrow());
//!     }
//! });
//! let outcome = orchestrator
//!     .submit(InputFile::new("upload", bytes, Some("application/pdf".into())))
//!     .await;
//! # let _ = outcome;
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qrscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! qrscan = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDFium
//!
//! Documents are rendered with PDFium, bound at runtime on the first
//! document a scan sees. Set `PDFIUM_LIB_PATH` to a library file or its
//! directory; otherwise the current directory and then the system library
//! path are tried. Image-only use never loads PDFium.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FramePolicy, InversionMode, PageSelection, ScanConfig, ScanConfigBuilder};
pub use error::{FrameError, QrScanError};
pub use orchestrator::{Orchestrator, PipelineState};
pub use output::{InputSummary, ScanOutcome, ScanReport, ScanResult};
pub use pipeline::decode::{RqrrDecoder, Symbol, SymbolDecoder};
pub use pipeline::document::{Document, DocumentRenderer, PdfiumRenderer, RenderSession};
pub use pipeline::frames::RasterFrame;
pub use pipeline::input::{InputFile, MediaKind};
pub use pipeline::scanner::CancelHandle;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::{acquire, inspect, scan, scan_bytes, scan_file, scan_sync};
