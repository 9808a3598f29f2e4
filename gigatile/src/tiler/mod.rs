//! Retiling: row-major pixels to contiguous square tiles, in place.
//!
//! A level file is laid out as one tile row of scratch space followed
//! by the row-major pixel region. Because a tile row band is the same
//! size in both layouts, band `r`'s tile-major destination
//! `[r*band, (r+1)*band)` sits exactly one band below its row-major
//! source `[(r+1)*band, (r+2)*band)`: the two never overlap, and the
//! write head never overtakes the read head. Bands are emitted top to
//! bottom, left to right, so the trailing scratch band can be
//! truncated as soon as the last band lands.
//!
//! Right-edge and bottom-edge tiles copy full tile strips; the excess
//! comes from the row padding and the padding rows below the image,
//! and is never observable through the tile provider.

use std::io;

use tracing::trace;

use crate::layout::{LevelLayout, TILE, TILE_BYTES, TILE_ROW_BYTES};
use crate::mapper::{LevelStore, MapMode};

/// Rearrange one tile row band from row-major `src` into tile-major `dst`.
///
/// Both slices are exactly [`LevelLayout::band_bytes`] long.
fn retile_band(dst: &mut [u8], src: &[u8], layout: &LevelLayout) {
    let stride = layout.padded_row_bytes;
    for c in 0..layout.cols as usize {
        let tile_base = c * TILE_BYTES;
        let col_base = c * TILE_ROW_BYTES;
        for i in 0..TILE {
            let d = tile_base + i * TILE_ROW_BYTES;
            let s = i * stride + col_base;
            dst[d..d + TILE_ROW_BYTES].copy_from_slice(&src[s..s + TILE_ROW_BYTES]);
        }
    }
}

/// Whole-file mode: retile every band of a fully mapped level.
///
/// `buf` is the complete mapping, `[0, mapped_size)`. After the call
/// the file is tile-major in `[0, cols*rows*tile_bytes)` with one
/// band of trailing slack for the caller to truncate.
pub fn retile_whole(buf: &mut [u8], layout: &LevelLayout) {
    let band = layout.band_bytes();
    for r in 0..layout.rows as usize {
        let (head, tail) = buf.split_at_mut((r + 1) * band);
        retile_band(&mut head[r * band..], &tail[..band], layout);
        trace!(level = layout.level, band = r, "retiled band");
    }
}

/// Streaming mode: retile a single completed tile row.
///
/// Maps exactly two band-sized windows (the next row-major input
/// band and the next tile-major output band) and performs the same
/// rearrangement for just that band. Idempotent: re-running the same
/// `band` produces identical file bytes.
pub fn retile_row_band(store: &LevelStore, band: u32) -> io::Result<()> {
    let layout = store.layout();
    debug_assert!(band < layout.rows);
    let band_bytes = layout.band_bytes();
    let src_offset = layout.scratch_bytes as u64 + band as u64 * band_bytes as u64;
    let dst_offset = band as u64 * band_bytes as u64;

    let src = store.map_window(src_offset, band_bytes, MapMode::Read)?;
    let mut dst = store.map_window(dst_offset, band_bytes, MapMode::Write)?;
    retile_band(dst.bytes_mut(), src.bytes(), layout);
    trace!(level = layout.level, band, "retiled streamed band");
    Ok(())
}
