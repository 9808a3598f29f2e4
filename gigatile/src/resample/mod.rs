//! Downsampling strategies for generating level `k+1` from level `k`.
//!
//! Both strategies operate on the row-major regions of two levels:
//! strided RGBA byte buffers whose strides are the levels' padded row
//! widths, not `width * 4`. Downsampling always runs before either
//! level is retiled.

use crate::config::DownsampleMode;
use crate::layout::BYTES_PER_PIXEL;

/// A 2× decimating resampler over strided RGBA buffers.
///
/// Implementations must write exactly `dst_width × dst_height` pixels
/// and read nothing beyond the declared source extents.
pub trait Resampler: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Downsample `src` (at `src_stride` bytes per row) into `dst`.
    ///
    /// Destination geometry is exactly half the source in each
    /// dimension, truncated.
    #[allow(clippy::too_many_arguments)]
    fn downsample(
        &self,
        src: &[u8],
        src_stride: usize,
        dst: &mut [u8],
        dst_stride: usize,
        dst_width: u32,
        dst_height: u32,
    );
}

/// Nearest-pixel decimation: `dst[r][c] = src[2r][2c]`. The default;
/// fast rather than accurate.
pub struct Decimate;

impl Resampler for Decimate {
    fn name(&self) -> &'static str {
        "decimate"
    }

    fn downsample(
        &self,
        src: &[u8],
        src_stride: usize,
        dst: &mut [u8],
        dst_stride: usize,
        dst_width: u32,
        dst_height: u32,
    ) {
        for r in 0..dst_height as usize {
            let src_row = &src[2 * r * src_stride..];
            let dst_row = &mut dst[r * dst_stride..];
            for c in 0..dst_width as usize {
                let s = 2 * c * BYTES_PER_PIXEL;
                let d = c * BYTES_PER_PIXEL;
                dst_row[d..d + BYTES_PER_PIXEL]
                    .copy_from_slice(&src_row[s..s + BYTES_PER_PIXEL]);
            }
        }
    }
}

/// 2×2 box average per channel. The high-quality option.
pub struct BoxFilter;

impl Resampler for BoxFilter {
    fn name(&self) -> &'static str {
        "box"
    }

    fn downsample(
        &self,
        src: &[u8],
        src_stride: usize,
        dst: &mut [u8],
        dst_stride: usize,
        dst_width: u32,
        dst_height: u32,
    ) {
        for r in 0..dst_height as usize {
            let row0 = &src[2 * r * src_stride..];
            let row1 = &src[(2 * r + 1) * src_stride..];
            let dst_row = &mut dst[r * dst_stride..];
            for c in 0..dst_width as usize {
                let s = 2 * c * BYTES_PER_PIXEL;
                let d = c * BYTES_PER_PIXEL;
                for ch in 0..BYTES_PER_PIXEL {
                    let sum = row0[s + ch] as u16
                        + row0[s + BYTES_PER_PIXEL + ch] as u16
                        + row1[s + ch] as u16
                        + row1[s + BYTES_PER_PIXEL + ch] as u16;
                    dst_row[d + ch] = (sum / 4) as u8;
                }
            }
        }
    }
}

/// The resampler implementing `mode`.
pub fn for_mode(mode: DownsampleMode) -> &'static dyn Resampler {
    match mode {
        DownsampleMode::Decimate => &Decimate,
        DownsampleMode::HighQuality => &BoxFilter,
    }
}
