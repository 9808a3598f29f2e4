//! The producer-facing pyramid API.
//!
//! A [`Pyramid`] is built once, from one of three sources (decoded
//! pixels in memory, a file on disk, or a progressively arriving byte
//! stream) and then serves random tile access forever after. One
//! build is single-producer: decoding, downsampling and retiling are
//! sequenced on the calling thread, with only background flushes
//! running concurrently.
//!
//! # Example
//!
//! ```ignore
//! use gigatile::{BuildConfig, DecoderKind, Pyramid};
//!
//! let pyramid = Pyramid::from_path("huge.ppm", DecoderKind::OneShot,
//!     BuildConfig::new().with_levels(3))?;
//! let tile = pyramid.tile_at(0.5, 1, 1)?;
//! let pixels = tile.bytes()?;
//! ```
//!
//! Failures are sticky: after the first fatal error every subsequent
//! operation returns a clone of it, and the pyramid yields no tiles.

mod stats;
mod tile;

pub use stats::{BuildStats, LevelInfo};
pub use tile::{Tile, TileBytes};

use std::path::Path;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::decode::DecoderKind;
use crate::error::PyramidError;
use crate::pipeline::streaming::{self, StreamState};
use crate::pipeline::{whole, Core};

pub use crate::pipeline::streaming::FeedProgress;

/// A pre-tiled multi-resolution pyramid on local persistent storage.
pub struct Pyramid {
    core: Core,
    /// Streaming machinery, present for scanline network builds.
    stream: Option<StreamState>,
    /// Accumulated compressed bytes for one-shot network builds.
    pending: Option<(DecoderKind, BytesMut)>,
    failed: Option<PyramidError>,
}

impl Pyramid {
    /// Build from already-decoded pixels: tightly packed
    /// `width * height` RGBA values.
    pub fn from_pixels(
        pixels: &[u8],
        width: u32,
        height: u32,
        config: BuildConfig,
    ) -> Result<Self, PyramidError> {
        let mut core = Core::new(config);
        whole::build_from_pixels(&mut core, pixels, width, height)?;
        Ok(Self::finished(core))
    }

    /// Build from a compressed image file.
    ///
    /// A streaming `kind` routes the file through the scanline
    /// pipeline; the one-shot kinds decode it in a single pass.
    pub fn from_path(
        path: impl AsRef<Path>,
        kind: DecoderKind,
        config: BuildConfig,
    ) -> Result<Self, PyramidError> {
        let data = std::fs::read(path.as_ref())?;
        if kind.is_streaming() {
            let mut pyramid = Self::for_network(kind, config);
            pyramid.append_bytes(&data)?;
            pyramid.data_finished()?;
            Ok(pyramid)
        } else {
            let mut core = Core::new(config);
            whole::build_one_shot(&mut core, kind, &data)?;
            Ok(Self::finished(core))
        }
    }

    /// Start a build whose compressed bytes arrive incrementally.
    ///
    /// With a streaming `kind`, [`append_bytes`](Self::append_bytes)
    /// drives the scanline pipeline as data arrives; with a one-shot
    /// kind, bytes accumulate and decoding happens at
    /// [`data_finished`](Self::data_finished).
    pub fn for_network(kind: DecoderKind, config: BuildConfig) -> Self {
        let (stream, pending) = match kind.scanline() {
            Some(decoder) => (Some(StreamState::new(decoder)), None),
            None => (None, Some((kind, BytesMut::new()))),
        };
        Self {
            core: Core::new(config),
            stream,
            pending,
            failed: None,
        }
    }

    fn finished(core: Core) -> Self {
        Self {
            core,
            stream: None,
            pending: None,
            failed: None,
        }
    }

    /// Hand the build more compressed bytes.
    pub fn append_bytes(&mut self, buf: &[u8]) -> Result<FeedProgress, PyramidError> {
        self.guard()?;
        if self.core.finished {
            return Ok(FeedProgress::Done);
        }
        let result = if let Some(stream) = &mut self.stream {
            streaming::feed(&mut self.core, stream, buf)
        } else if let Some((_, pending)) = &mut self.pending {
            pending.extend_from_slice(buf);
            Ok(FeedProgress::NeedMore)
        } else {
            Ok(FeedProgress::Done)
        };
        self.record(result)
    }

    /// Signal end of input for an incremental build.
    pub fn data_finished(&mut self) -> Result<(), PyramidError> {
        self.guard()?;
        if self.core.finished {
            return Ok(());
        }
        if let Some(mut stream) = self.stream.take() {
            let result = streaming::finish(&mut self.core, &mut stream);
            return self.record(result);
        }
        if let Some((kind, pending)) = self.pending.take() {
            let result = whole::build_one_shot(&mut self.core, kind, &pending);
            return self.record(result);
        }
        Ok(())
    }

    /// Source image dimensions, once the header has been decoded.
    ///
    /// Still available after a failed build if the failure came later
    /// than the header.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.core.dims
    }

    /// Number of levels this pyramid holds (or will hold).
    pub fn level_count(&self) -> usize {
        self.core.levels.len()
    }

    /// Whether the build has fully finished.
    pub fn is_finished(&self) -> bool {
        self.core.finished
    }

    /// The sticky failure, if the build has failed.
    pub fn failure(&self) -> Option<&PyramidError> {
        self.failed.as_ref()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &BuildStats {
        &self.core.stats
    }

    /// Geometry and file footprint of level `k`.
    pub fn level_info(&self, k: usize) -> Option<LevelInfo> {
        let store = self.core.levels.get(k)?;
        let layout = store.layout();
        let file_bytes = match store.file_size() {
            Ok(n) => n,
            Err(e) => {
                warn!(level = k, error = %e, "could not stat level file");
                0
            }
        };
        Some(LevelInfo {
            level: k,
            width: layout.width,
            height: layout.height,
            cols: layout.cols,
            rows: layout.rows,
            file_bytes,
        })
    }

    /// Fetch the tile at `(row, col)` of the level closest to
    /// `scale`, where scale 1.0 is level 0, 0.5 is level 1, and so
    /// on halving.
    ///
    /// During a streaming build only fully emitted tile rows are
    /// visible; everything else is [`PyramidError::OutOfRange`].
    pub fn tile_at(&self, scale: f64, row: u32, col: u32) -> Result<Tile, PyramidError> {
        self.guard()?;

        let level = level_for_scale(scale).ok_or(PyramidError::OutOfRange {
            level: 0,
            row,
            col,
        })?;
        let out_of_range = PyramidError::OutOfRange { level, row, col };

        let store = self.core.levels.get(level).ok_or(out_of_range.clone())?;
        let layout = store.layout();
        if row >= layout.rows || col >= layout.cols {
            return Err(out_of_range);
        }
        if !self.core.finished && row >= self.core.emitted_bands[level] {
            return Err(out_of_range);
        }

        debug!(level, row, col, "tile mapped for read-back");
        Ok(Tile::new(
            store.file().clone(),
            level,
            row,
            col,
            layout.tile_offset(row, col),
        ))
    }

    fn guard(&self) -> Result<(), PyramidError> {
        match &self.failed {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Latch the first fatal error; later calls replay it.
    fn record<T>(&mut self, result: Result<T, PyramidError>) -> Result<T, PyramidError> {
        if let Err(e) = &result {
            if self.failed.is_none() {
                self.failed = Some(e.clone());
            }
        }
        result
    }
}

/// Resolve a scale fraction to the nearest discrete level.
fn level_for_scale(scale: f64) -> Option<usize> {
    if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
        return None;
    }
    let level = (1.0 / scale).log2().round();
    Some(level.max(0.0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_scale() {
        assert_eq!(level_for_scale(1.0), Some(0));
        assert_eq!(level_for_scale(0.5), Some(1));
        assert_eq!(level_for_scale(0.25), Some(2));
        // Rounded to the nearest discrete level.
        assert_eq!(level_for_scale(0.6), Some(1));
        assert_eq!(level_for_scale(0.9), Some(0));
        assert_eq!(level_for_scale(0.0), None);
        assert_eq!(level_for_scale(1.5), None);
        assert_eq!(level_for_scale(-0.5), None);
    }
}
