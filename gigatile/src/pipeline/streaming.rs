//! Streaming pipeline: a state machine driven by "more input arrived".
//!
//! Per decoded scanline: write it into level 0 through a one-row map
//! window, copy every `2^k`-th pixel into each level whose stride
//! aligns, and retile each level whose tile row just completed. The
//! pipeline never blocks on decoder input: when the decoder
//! suspends, control returns to the caller holding no mappings.

use tracing::debug;

use crate::decode::ScanlineDecoder;
use crate::error::{DecoderError, PyramidError};
use crate::layout::{BYTES_PER_PIXEL, TILE};
use crate::mapper::{LevelStore, MapMode};
use crate::pyramid::BuildStats;
use crate::tiler;

use super::Core;

/// Outcome of one `append_bytes` call on a streaming build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedProgress {
    /// Nothing could be decoded yet; feed more bytes.
    NeedMore,
    /// At least one scanline landed in the pyramid.
    Progressed,
    /// Every scanline of the image has been decoded.
    Done,
}

/// Phase of the streaming state machine. Failure is latched one
/// level up, in the pyramid's sticky error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No header yet; bytes only accumulate in the decoder.
    AwaitingHeader,
    /// Levels exist; scanlines land as the decoder produces them.
    StreamingScanlines,
    /// Every scanline has been written.
    Done,
}

/// Decoder and cursor state for an in-flight streaming build.
pub(crate) struct StreamState {
    pub decoder: Box<dyn ScanlineDecoder>,
    /// Next level-0 row to receive a scanline.
    pub outline: u32,
    phase: Phase,
}

impl StreamState {
    pub fn new(decoder: Box<dyn ScanlineDecoder>) -> Self {
        Self {
            decoder,
            outline: 0,
            phase: Phase::AwaitingHeader,
        }
    }
}

/// Feed compressed bytes and run the pipeline as far as they allow.
pub(crate) fn feed(
    core: &mut Core,
    st: &mut StreamState,
    buf: &[u8],
) -> Result<FeedProgress, PyramidError> {
    st.decoder.push_bytes(buf)?;

    if st.phase == Phase::AwaitingHeader {
        // First header: create every level's backing file up front.
        let Some(header) = st.decoder.header() else {
            return Ok(FeedProgress::NeedMore);
        };
        core.dims = Some((header.width, header.height));
        let level_count = core.usable_levels();
        debug!(
            width = header.width,
            height = header.height,
            level_count,
            "stream header decoded"
        );
        for k in 0..level_count {
            core.create_level(k)?;
        }
        st.phase = Phase::StreamingScanlines;
    }

    if st.phase == Phase::Done {
        return Ok(FeedProgress::Done);
    }

    let progress = pump(core, st)?;
    if progress == FeedProgress::Done {
        st.phase = Phase::Done;
    }
    Ok(progress)
}

/// Pull scanlines until the decoder suspends or the image completes.
fn pump(core: &mut Core, st: &mut StreamState) -> Result<FeedProgress, PyramidError> {
    let height = core.levels[0].layout().height;
    let mut progressed = false;

    while st.outline < height {
        core.check_cancel()?;

        let s = st.outline;
        let layout0 = *core.levels[0].layout();

        // One scanline window; the decoder writes straight through it.
        let mut window = core.levels[0].map_window(
            layout0.row_major_offset(s),
            layout0.padded_row_bytes,
            MapMode::Write,
        )?;
        let rows = st
            .decoder
            .pull_scanlines(window.bytes_mut(), layout0.padded_row_bytes, 1)?;
        if rows == 0 {
            return Ok(if progressed {
                FeedProgress::Progressed
            } else {
                FeedProgress::NeedMore
            });
        }

        downsample_scanline(&core.levels, s, window.bytes())?;
        drop(window);

        st.outline = s + 1;
        progressed = true;
        core.stats.scanlines_written += 1;

        if (s + 1) % TILE as u32 == 0 {
            retile_completed_bands(&core.levels, &mut core.emitted_bands, &mut core.stats, s + 1)?;
        }
    }

    Ok(FeedProgress::Done)
}

/// Copy every `2^k`-th pixel of a fresh level-0 scanline into each
/// aligned level's current output row.
///
/// The loop stops at the first level whose stride does not divide the
/// scanline index; strides are powers of two, so no later level could
/// align either.
fn downsample_scanline(
    levels: &[LevelStore],
    s: u32,
    scanline: &[u8],
) -> Result<(), PyramidError> {
    for (k, store) in levels.iter().enumerate().skip(1) {
        if s & ((1u32 << k) - 1) != 0 {
            break;
        }
        let layout = store.layout();
        let dst_row = s >> k;
        if dst_row >= layout.height {
            // The source image has trailing rows this level's halved
            // height never uses.
            continue;
        }

        let mut window = store.map_window(
            layout.row_major_offset(dst_row),
            layout.width as usize * BYTES_PER_PIXEL,
            MapMode::Write,
        )?;
        let out = window.bytes_mut();
        let step = (1usize << k) * BYTES_PER_PIXEL;
        for x in 0..layout.width as usize {
            let d = x * BYTES_PER_PIXEL;
            let src = x * step;
            out[d..d + BYTES_PER_PIXEL].copy_from_slice(&scanline[src..src + BYTES_PER_PIXEL]);
        }
    }
    Ok(())
}

/// Retile every level whose tile row completed at `rows_done` level-0
/// scanlines.
fn retile_completed_bands(
    levels: &[LevelStore],
    emitted_bands: &mut [u32],
    stats: &mut BuildStats,
    rows_done: u32,
) -> Result<(), PyramidError> {
    for (k, store) in levels.iter().enumerate() {
        let stride = (TILE as u32) << k;
        if rows_done % stride != 0 {
            break;
        }
        let band = emitted_bands[k];
        debug_assert_eq!(band, rows_done / stride - 1);
        tiler::retile_row_band(store, band)?;
        emitted_bands[k] = band + 1;
        stats.tile_rows_emitted += 1;
    }
    Ok(())
}

/// End of input: verify the decoder finished, retile the remaining
/// (possibly partial) tile rows of every level, finalize each level.
pub(crate) fn finish(core: &mut Core, st: &mut StreamState) -> Result<(), PyramidError> {
    if !st.decoder.is_done() {
        return Err(DecoderError::Truncated.into());
    }

    for k in 0..core.levels.len() {
        core.check_cancel()?;
        let rows = core.levels[k].layout().rows;
        for band in core.emitted_bands[k]..rows {
            tiler::retile_row_band(&core.levels[k], band)?;
            core.emitted_bands[k] = band + 1;
            core.stats.tile_rows_emitted += 1;
        }
        core.finish_level(k)?;
    }

    core.finished = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::decode::StreamHeader;
    use crate::flush::FlushCoordinator;
    use crate::layout::TILE_BYTES;

    /// Scanline decoder test double: each pushed byte unlocks one
    /// scanline of a fixed gradient.
    struct MockScanlineDecoder {
        width: u32,
        height: u32,
        rows_available: u32,
        rows_pulled: u32,
    }

    impl MockScanlineDecoder {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                rows_available: 0,
                rows_pulled: 0,
            }
        }
    }

    impl ScanlineDecoder for MockScanlineDecoder {
        fn push_bytes(&mut self, buf: &[u8]) -> Result<(), DecoderError> {
            self.rows_available = (self.rows_available + buf.len() as u32).min(self.height);
            Ok(())
        }

        fn header(&self) -> Option<StreamHeader> {
            Some(StreamHeader {
                width: self.width,
                height: self.height,
                components: 3,
            })
        }

        fn pull_scanlines(
            &mut self,
            dst: &mut [u8],
            row_stride: usize,
            max_rows: usize,
        ) -> Result<usize, DecoderError> {
            let mut produced = 0;
            while produced < max_rows && self.rows_pulled < self.rows_available {
                let row = &mut dst[produced * row_stride..];
                for x in 0..self.width as usize {
                    let o = x * BYTES_PER_PIXEL;
                    row[o] = x as u8;
                    row[o + 1] = self.rows_pulled as u8;
                    row[o + 2] = 0;
                    row[o + 3] = 255;
                }
                self.rows_pulled += 1;
                produced += 1;
            }
            Ok(produced)
        }

        fn is_done(&self) -> bool {
            self.rows_pulled == self.height
        }
    }

    fn test_core() -> Core {
        Core::new(
            BuildConfig::new()
                .with_levels(2)
                .with_memory_constrained(false)
                .with_flush_coordinator(FlushCoordinator::new()),
        )
    }

    #[test]
    fn test_state_machine_progression() {
        let mut core = test_core();
        let mut st = StreamState::new(Box::new(MockScanlineDecoder::new(300, 300)));

        // Header arrives with the first push; one row decodes.
        assert_eq!(feed(&mut core, &mut st, &[0]).unwrap(), FeedProgress::Progressed);
        assert_eq!(core.dims, Some((300, 300)));
        assert_eq!(core.levels.len(), 2);
        assert_eq!(st.outline, 1);

        // 255 more rows: level-0 band 0 completes and is retiled.
        assert_eq!(
            feed(&mut core, &mut st, &[0u8; 255]).unwrap(),
            FeedProgress::Progressed
        );
        assert_eq!(core.emitted_bands, vec![1, 0]);

        // The rest of the image.
        assert_eq!(
            feed(&mut core, &mut st, &[0u8; 44]).unwrap(),
            FeedProgress::Done
        );
        // Further input is a no-op once the machine is done.
        assert_eq!(feed(&mut core, &mut st, &[0]).unwrap(), FeedProgress::Done);

        finish(&mut core, &mut st).unwrap();
        assert!(core.finished);
        assert_eq!(core.emitted_bands, vec![2, 1]);
        assert_eq!(
            core.levels[1].file_size().unwrap(),
            TILE_BYTES as u64,
            "150x150 level holds one tile"
        );
    }

    #[test]
    fn test_finish_before_last_row_is_truncated_stream() {
        let mut core = test_core();
        let mut st = StreamState::new(Box::new(MockScanlineDecoder::new(64, 64)));
        feed(&mut core, &mut st, &[0u8; 63]).unwrap();

        let err = finish(&mut core, &mut st).unwrap_err();
        assert_eq!(err, PyramidError::Decoder(DecoderError::Truncated.to_string()));
        assert!(!core.finished);
    }
}
