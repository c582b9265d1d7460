//! Frame source: turn an input into a lazy, ordered sequence of RGBA frames.
//!
//! An image yields exactly one frame. A document yields one frame per
//! selected page, in page order, and renders each page only when the
//! consumer asks for it. A scanner that stops at page 2 of a 300-page PDF
//! therefore renders two pages, not 300.

use crate::config::ScanConfig;
use crate::error::{FrameError, QrScanError};
use crate::pipeline::document::{Document, DocumentRenderer, RenderSession};
use crate::pipeline::input::{is_decodable_image, InputFile, MediaKind};
use image::{ImageError, RgbaImage};
use tracing::{debug, info};

/// A decoded pixel buffer: RGBA, one byte per channel, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterFrame {
    /// 0-based ordinal within the source (the page index for documents).
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for RasterFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterFrame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &format_args!("<{} bytes>", self.pixels.len()))
            .finish()
    }
}

impl RasterFrame {
    pub fn from_rgba(index: usize, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index,
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// 1-indexed page number, for messages.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Luminance plane with alpha composited over white.
    ///
    /// Transparent backgrounds are common in exported QR PNGs; compositing
    /// over black would make the light modules indistinguishable from the
    /// dark ones.
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .map(|px| {
                let a = px[3] as u32;
                let over_white = |c: u8| (c as u32 * a + 255 * (255 - a)) / 255;
                let (r, g, b) = (over_white(px[0]), over_white(px[1]), over_white(px[2]));
                // Y = 0.299*R + 0.587*G + 0.114*B
                ((299 * r + 587 * g + 114 * b) / 1000) as u8
            })
            .collect()
    }
}

/// Lazy, finite, non-restartable sequence of frames.
///
/// Items are `Err` for pages that could not be rendered; the sequence
/// carries on with the next page after such an item.
pub struct FrameSequence<'a> {
    inner: Frames<'a>,
    total: usize,
}

enum Frames<'a> {
    Single(Option<RasterFrame>),
    Pages {
        document: Box<dyn Document + 'a>,
        indices: std::vec::IntoIter<usize>,
        scale: f32,
    },
}

impl<'a> FrameSequence<'a> {
    pub fn single(frame: RasterFrame) -> Self {
        Self {
            inner: Frames::Single(Some(frame)),
            total: 1,
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: Frames::Single(None),
            total: 0,
        }
    }

    /// Frames of `document` at `indices` (0-based, ascending).
    pub fn pages(document: Box<dyn Document + 'a>, indices: Vec<usize>, scale: f32) -> Self {
        Self {
            total: indices.len(),
            inner: Frames::Pages {
                document,
                indices: indices.into_iter(),
                scale,
            },
        }
    }

    /// Number of frames the sequence produces in total, including ones
    /// already taken.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for FrameSequence<'_> {
    type Item = Result<RasterFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Frames::Single(frame) => frame.take().map(Ok),
            Frames::Pages {
                document,
                indices,
                scale,
            } => {
                let idx = indices.next()?;
                debug!("Rendering page {} at scale {}", idx + 1, scale);
                Some(document.render_page(idx, *scale))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.inner {
            Frames::Single(frame) => usize::from(frame.is_some()),
            Frames::Pages { indices, .. } => indices.len(),
        };
        (remaining, Some(remaining))
    }
}

/// Produces frame sequences for inputs, opening a render session on the
/// first document it sees.
pub struct FrameSource<'r> {
    renderer: &'r dyn DocumentRenderer,
    session: Option<Box<dyn RenderSession + 'r>>,
}

impl<'r> FrameSource<'r> {
    pub fn new(renderer: &'r dyn DocumentRenderer) -> Self {
        Self {
            renderer,
            session: None,
        }
    }

    /// Open `file` as `kind` and return its frames.
    ///
    /// # Errors
    /// - [`QrScanError::UnsupportedInput`] for [`MediaKind::Unsupported`]
    /// - [`QrScanError::DecodeFailure`] (or a password error) when the bytes
    ///   are not a valid image/document
    /// - [`QrScanError::PageOutOfRange`] when the page selection matches no
    ///   page of a non-empty document
    pub fn frames<'s>(
        &'s mut self,
        file: &'s InputFile,
        kind: MediaKind,
        config: &ScanConfig,
    ) -> Result<FrameSequence<'s>, QrScanError> {
        match kind {
            MediaKind::Unsupported => Err(QrScanError::UnsupportedInput {
                name: file.name().to_string(),
                declared: file.declared_mime().unwrap_or("unknown").to_string(),
            }),
            MediaKind::Image => decode_image(file).map(FrameSequence::single),
            MediaKind::Document => {
                let document = self.open_document(file, config.password.as_deref())?;
                let total_pages = document.page_count();
                info!("Document loaded: {} pages", total_pages);

                let indices = config.pages.to_indices(total_pages);
                if total_pages > 0 && indices.is_empty() {
                    return Err(QrScanError::PageOutOfRange {
                        page: config.pages.first_requested(),
                        total: total_pages,
                    });
                }
                Ok(FrameSequence::pages(document, indices, config.render_scale))
            }
        }
    }

    /// Frame count without rendering anything.
    pub fn count(
        &mut self,
        file: &InputFile,
        kind: MediaKind,
        password: Option<&str>,
    ) -> Result<usize, QrScanError> {
        match kind {
            MediaKind::Unsupported => Ok(0),
            MediaKind::Image => {
                reject_undecodable(file)?;
                image::guess_format(file.bytes()).map_err(|e| QrScanError::DecodeFailure {
                    name: file.name().to_string(),
                    kind: "image",
                    detail: e.to_string(),
                })?;
                Ok(1)
            }
            MediaKind::Document => Ok(self.open_document(file, password)?.page_count()),
        }
    }

    fn open_document<'s>(
        &'s mut self,
        file: &'s InputFile,
        password: Option<&str>,
    ) -> Result<Box<dyn Document + 's>, QrScanError> {
        let session: &'s (dyn RenderSession + 'r) = match &mut self.session {
            Some(session) => &**session,
            slot @ None => &**slot.insert(self.renderer.session()?),
        };
        session.open(file.name(), file.bytes(), password)
    }
}

/// Refuse images whose magic bytes name a format with no enabled codec.
fn reject_undecodable(file: &InputFile) -> Result<(), QrScanError> {
    match image::guess_format(file.bytes()) {
        Ok(format) if !is_decodable_image(format) => Err(QrScanError::UnsupportedInput {
            name: file.name().to_string(),
            declared: format.to_mime_type().to_string(),
        }),
        _ => Ok(()),
    }
}

/// Decode an image file into its single frame.
fn decode_image(file: &InputFile) -> Result<RasterFrame, QrScanError> {
    reject_undecodable(file)?;
    let image = image::load_from_memory(file.bytes()).map_err(|e| match e {
        ImageError::Unsupported(_) => QrScanError::UnsupportedInput {
            name: file.name().to_string(),
            declared: file.declared_mime().unwrap_or("image").to_string(),
        },
        e => QrScanError::DecodeFailure {
            name: file.name().to_string(),
            kind: "image",
            detail: e.to_string(),
        },
    })?;
    debug!("Decoded image {}x{}", image.width(), image.height());
    Ok(RasterFrame::from_rgba(0, image.to_rgba8()))
}
