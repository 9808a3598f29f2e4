//! Decoder adapter contracts.
//!
//! The pyramid core never decodes compressed images itself; it
//! depends on two narrow contracts. A [`OneShotDecoder`] is handed
//! the complete compressed input and a destination surface and fills
//! it in one call. A [`ScanlineDecoder`] is fed compressed bytes as
//! they arrive and hands back decoded scanlines on demand, possibly
//! suspending mid-scanline until more input shows up.
//!
//! Both produce 4-byte pixels in the pyramid's memory order (the
//! little-endian view of a packed ABGR word: R, G, B, A bytes; alpha
//! written but never read back).

mod image_rs;
mod pnm;

pub use image_rs::{JpegOneShot, SniffingOneShot};
pub use pnm::PnmScanlineDecoder;

use crate::error::DecoderError;

/// Which decoder adapter a constructor should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// One-shot decode, format detected from the input bytes.
    OneShot,
    /// One-shot decode through the explicit JPEG codec.
    OneShotJpeg,
    /// Incremental scanline decoding of binary PPM input.
    Scanline,
}

impl DecoderKind {
    /// Whether this kind drives the streaming pipeline.
    pub fn is_streaming(&self) -> bool {
        matches!(self, DecoderKind::Scanline)
    }

    /// Construct the one-shot adapter for this kind, if it has one.
    pub fn one_shot(&self) -> Option<Box<dyn OneShotDecoder>> {
        match self {
            DecoderKind::OneShot => Some(Box::new(SniffingOneShot)),
            DecoderKind::OneShotJpeg => Some(Box::new(JpegOneShot)),
            DecoderKind::Scanline => None,
        }
    }

    /// Construct the scanline adapter for this kind, if it has one.
    pub fn scanline(&self) -> Option<Box<dyn ScanlineDecoder>> {
        match self {
            DecoderKind::Scanline => Some(Box::new(PnmScanlineDecoder::new())),
            _ => None,
        }
    }
}

/// Image header reported by a scanline decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Source color components per pixel (before RGBA expansion).
    pub components: u8,
}

/// Whole-input decoder: header probe plus a single decompress call
/// into a caller-provided strided surface.
pub trait OneShotDecoder {
    /// Image dimensions, from the header only.
    fn dimensions(&self, input: &[u8]) -> Result<(u32, u32), DecoderError>;

    /// Decompress `input` into `dst`, one `width * 4`-byte pixel row
    /// per `row_stride` bytes.
    fn decode_into(
        &self,
        input: &[u8],
        dst: &mut [u8],
        row_stride: usize,
        width: u32,
        height: u32,
    ) -> Result<(), DecoderError>;
}

/// Incremental decoder: compressed bytes in, decoded scanlines out.
///
/// "Needs more input" is not an error: `pull_scanlines` decodes zero
/// rows and the caller re-enters `push_bytes` when bytes arrive. The
/// decoder must tolerate input split at any byte boundary.
pub trait ScanlineDecoder {
    /// Hand additional compressed bytes to the decoder.
    fn push_bytes(&mut self, buf: &[u8]) -> Result<(), DecoderError>;

    /// The parsed header, once enough input has arrived.
    fn header(&self) -> Option<StreamHeader>;

    /// Decode up to `max_rows` scanlines into `dst`, one row per
    /// `row_stride` bytes. Returns the number of rows produced.
    fn pull_scanlines(
        &mut self,
        dst: &mut [u8],
        row_stride: usize,
        max_rows: usize,
    ) -> Result<usize, DecoderError>;

    /// Whether every scanline of the image has been decoded.
    fn is_done(&self) -> bool;
}
