//! Document rasterisation seam and its PDFium implementation.
//!
//! Rendering is split into two levels so the library binding never has to
//! cross threads:
//!
//! * [`DocumentRenderer`] — `Send + Sync` factory held by the orchestrator.
//! * [`RenderSession`]    — created on the blocking scan thread, owns the
//!   bound library for the duration of one scan and opens [`Document`]s
//!   that borrow from it.
//!
//! Images never touch this module, so scanning a PNG works on machines
//! without libpdfium.

use crate::error::{FrameError, QrScanError};
use crate::pipeline::frames::RasterFrame;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// An opened multi-page document.
pub trait Document {
    /// Number of pages, possibly zero.
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based) at `scale` times its natural size.
    fn render_page(&self, index: usize, scale: f32) -> Result<RasterFrame, FrameError>;
}

/// Per-scan handle on a rendering library.
pub trait RenderSession {
    /// Parse `bytes` as a document.
    ///
    /// Fails with [`QrScanError::DecodeFailure`] for malformed input and with
    /// the password variants for encrypted documents.
    fn open<'a>(
        &'a self,
        name: &str,
        bytes: &'a [u8],
        password: Option<&str>,
    ) -> Result<Box<dyn Document + 'a>, QrScanError>;
}

/// Factory for render sessions, shared with the blocking scan task.
pub trait DocumentRenderer: Send + Sync {
    fn session(&self) -> Result<Box<dyn RenderSession + '_>, QrScanError>;
}

// ── PDFium ───────────────────────────────────────────────────────────────

/// Renders PDF documents through the PDFium shared library.
///
/// The library is located when the first document is opened:
/// `PDFIUM_LIB_PATH` (file or directory) first, then the working directory,
/// then the system loader path.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRenderer;

impl DocumentRenderer for PdfiumRenderer {
    fn session(&self) -> Result<Box<dyn RenderSession + '_>, QrScanError> {
        Ok(Box::new(PdfiumSession {
            pdfium: bind_pdfium()?,
        }))
    }
}

/// Locate and bind the PDFium shared library.
pub fn bind_pdfium() -> Result<Pdfium, QrScanError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    };

    bindings
        .map(Pdfium::new)
        .map_err(|e| QrScanError::PdfiumBindingFailed(e.to_string()))
}

struct PdfiumSession {
    pdfium: Pdfium,
}

impl RenderSession for PdfiumSession {
    fn open<'a>(
        &'a self,
        name: &str,
        bytes: &'a [u8],
        password: Option<&str>,
    ) -> Result<Box<dyn Document + 'a>, QrScanError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        QrScanError::WrongPassword {
                            name: name.to_string(),
                        }
                    } else {
                        QrScanError::PasswordRequired {
                            name: name.to_string(),
                        }
                    }
                } else {
                    QrScanError::DecodeFailure {
                        name: name.to_string(),
                        kind: "document",
                        detail: err_str,
                    }
                }
            })?;

        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl Document for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RasterFrame, FrameError> {
        let render_failed = |e: PdfiumError| FrameError::RenderFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };

        let page = self
            .document
            .pages()
            .get(index as PdfPageIndex)
            .map_err(render_failed)?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        // The bitmap is the off-screen surface for this one page; it is
        // dropped at the end of this block whether or not the copy succeeds.
        let pixels = {
            let bitmap = page.render_with_config(&render_config).map_err(render_failed)?;
            bitmap.as_image().to_rgba8()
        };

        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            pixels.width(),
            pixels.height()
        );

        Ok(RasterFrame::from_rgba(index, pixels))
    }
}
