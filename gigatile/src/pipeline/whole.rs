//! Whole-image pipeline: decode everything into level 0, then
//! downsample and retile level by level.
//!
//! Each level's map lives from its creation through its last write:
//! level `k` is written while downsampling from level `k-1`, then
//! becomes the source for level `k+1`, is retiled through the same
//! map, and finally unmapped before its scratch truncation.

use tracing::debug;

use crate::decode::{DecoderKind, OneShotDecoder};
use crate::error::PyramidError;
use crate::layout::{LevelLayout, BYTES_PER_PIXEL};
use crate::mapper::MapMode;
use crate::resample;
use crate::tiler;

use super::Core;

/// Build from already-decoded pixels: `width * height` RGBA values,
/// tightly packed.
pub(crate) fn build_from_pixels(
    core: &mut Core,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<(), PyramidError> {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    if pixels.len() != expected {
        return Err(PyramidError::Decoder(format!(
            "pixel buffer holds {} bytes, {width}x{height} needs {expected}",
            pixels.len()
        )));
    }

    run(core, width, height, |dst, layout| {
        let row_bytes = layout.width as usize * BYTES_PER_PIXEL;
        for y in 0..layout.height as usize {
            dst[y * layout.padded_row_bytes..y * layout.padded_row_bytes + row_bytes]
                .copy_from_slice(&pixels[y * row_bytes..(y + 1) * row_bytes]);
        }
        Ok(())
    })
}

/// Build from compressed bytes through a one-shot decoder adapter.
pub(crate) fn build_one_shot(
    core: &mut Core,
    kind: DecoderKind,
    input: &[u8],
) -> Result<(), PyramidError> {
    let decoder = kind
        .one_shot()
        .ok_or_else(|| PyramidError::Decoder(format!("{kind:?} is not a one-shot decoder")))?;
    let (width, height) = decoder.dimensions(input)?;
    run(core, width, height, |dst, layout| {
        decode_level_zero(decoder.as_ref(), input, dst, layout)
    })
}

fn decode_level_zero(
    decoder: &dyn OneShotDecoder,
    input: &[u8],
    dst: &mut [u8],
    layout: &LevelLayout,
) -> Result<(), PyramidError> {
    decoder
        .decode_into(input, dst, layout.padded_row_bytes, layout.width, layout.height)
        .map_err(PyramidError::from)
}

/// The pipeline proper: fill level 0 row-major, then for each further
/// level downsample from the previous one, retile the previous one,
/// and truncate its scratch. The deepest level is retiled last.
fn run<F>(core: &mut Core, width: u32, height: u32, fill: F) -> Result<(), PyramidError>
where
    F: FnOnce(&mut [u8], &LevelLayout) -> Result<(), PyramidError>,
{
    core.dims = Some((width, height));
    let level_count = core.usable_levels();
    let resampler = resample::for_mode(core.config.downsampler());
    debug!(width, height, level_count, resampler = resampler.name(), "whole-image build");

    core.create_level(0)?;
    let mut src_map = core.levels[0].map_whole(MapMode::Write)?;
    {
        let layout = *core.levels[0].layout();
        fill(&mut src_map.bytes_mut()[layout.scratch_bytes..], &layout)?;
        core.stats.scanlines_written += layout.height as u64;
    }

    for k in 1..level_count {
        core.check_cancel()?;
        core.create_level(k)?;
        let mut dst_map = core.levels[k].map_whole(MapMode::Write)?;

        let src_layout = *core.levels[k - 1].layout();
        let dst_layout = *core.levels[k].layout();

        // Both passes over this pair are sequential in file order.
        let _ = src_map.advise_sequential();
        let _ = dst_map.advise_sequential();

        resampler.downsample(
            &src_map.bytes()[src_layout.scratch_bytes..],
            src_layout.padded_row_bytes,
            &mut dst_map.bytes_mut()[dst_layout.scratch_bytes..],
            dst_layout.padded_row_bytes,
            dst_layout.width,
            dst_layout.height,
        );

        tiler::retile_whole(src_map.bytes_mut(), &src_layout);
        drop(src_map);
        core.finish_level(k - 1)?;
        core.stats.tile_rows_emitted += src_layout.rows as u64;

        src_map = dst_map;
    }

    core.check_cancel()?;
    let last = level_count - 1;
    let last_layout = *core.levels[last].layout();
    tiler::retile_whole(src_map.bytes_mut(), &last_layout);
    drop(src_map);
    core.finish_level(last)?;
    core.stats.tile_rows_emitted += last_layout.rows as u64;

    core.finished = true;
    Ok(())
}
