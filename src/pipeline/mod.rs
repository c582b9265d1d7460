//! Pipeline stages for QR extraction.
//!
//! Each submodule implements exactly one step. The two external
//! capabilities (document rendering, symbol decoding) sit behind traits so
//! they can be swapped, and faked in tests, without touching the control
//! flow.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ frames ──▶ scanner ──▶ (payload | none)
//! (bytes)   (lazy RGBA) (first match)
//!              │           │
//!          document      decode
//!          (pdfium)      (rqrr)
//! ```
//!
//! 1. [`input`]    — read or download the file and classify it
//! 2. [`frames`]   — decode the image, or open the document and render
//!    pages on demand
//! 3. [`scanner`]  — decode frames in order and stop at the first symbol
//! 4. [`document`] — the rendering seam and its PDFium implementation
//! 5. [`decode`]   — the decoding seam and its `rqrr` implementation

pub mod decode;
pub mod document;
pub mod frames;
pub mod input;
pub mod scanner;
