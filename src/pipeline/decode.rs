//! QR symbol decoding seam and its `rqrr` implementation.
//!
//! The scanner only needs "give me a symbol in this frame, or nothing";
//! everything about finder patterns and error correction stays behind the
//! [`SymbolDecoder`] trait.

use crate::config::InversionMode;
use crate::pipeline::frames::RasterFrame;
use serde::Serialize;
use tracing::debug;

/// A successfully decoded QR symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    /// Decoded payload text.
    pub payload: String,
    /// QR version (1–40).
    pub version: usize,
    /// Corner points of the symbol in frame pixel coordinates.
    pub corners: [(i32, i32); 4],
}

/// Locate and decode one QR symbol in a frame.
///
/// Decoding is total: a frame either yields a symbol or `None`. There is
/// no separate error channel.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, frame: &RasterFrame) -> Option<Symbol>;
}

/// [`SymbolDecoder`] backed by the pure-Rust `rqrr` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder {
    inversion: InversionMode,
}

impl RqrrDecoder {
    pub fn new(inversion: InversionMode) -> Self {
        Self { inversion }
    }
}

impl SymbolDecoder for RqrrDecoder {
    fn decode(&self, frame: &RasterFrame) -> Option<Symbol> {
        if frame.is_empty() {
            return None;
        }
        let width = frame.width as usize;
        let height = frame.height as usize;
        let luma = frame.to_luma();

        self.inversion
            .passes()
            .iter()
            .find_map(|&invert| decode_luma(&luma, width, height, invert))
    }
}

fn decode_luma(luma: &[u8], width: usize, height: usize, invert: bool) -> Option<Symbol> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let v = luma[y * width + x];
        if invert {
            255 - v
        } else {
            v
        }
    });

    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((meta, payload)) => {
                return Some(Symbol {
                    payload,
                    version: meta.version.0,
                    corners: grid.bounds.map(|p| (p.x, p.y)),
                });
            }
            Err(e) => debug!("Grid rejected (inverted={}): {:?}", invert, e),
        }
    }
    None
}
