//! Build pipelines.
//!
//! [`Core`] holds the state shared by both build paths: the level
//! stores, per-level tile-row watermarks, configuration, and the
//! flush coordinator. [`whole`] decodes everything up front and then
//! walks the levels; [`streaming`] interleaves scanline decoding,
//! cross-level downsampling and partial retiling as input arrives.

pub(crate) mod streaming;
pub(crate) mod whole;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::BuildConfig;
use crate::error::PyramidError;
use crate::flush::FlushCoordinator;
use crate::layout::LevelLayout;
use crate::mapper::LevelStore;
use crate::pyramid::BuildStats;

/// Build state shared by the whole-image and streaming pipelines.
pub(crate) struct Core {
    pub config: BuildConfig,
    pub flush: Arc<FlushCoordinator>,
    /// Source dimensions, known once the header is decoded.
    pub dims: Option<(u32, u32)>,
    /// One store per created level, in level order.
    pub levels: Vec<LevelStore>,
    /// Tile rows emitted per level; tiles below the watermark are
    /// readable even while the build is still running.
    pub emitted_bands: Vec<u32>,
    pub finished: bool,
    pub stats: BuildStats,
}

impl Core {
    pub fn new(config: BuildConfig) -> Self {
        let flush = config.flush_coordinator();
        Self {
            config,
            flush,
            dims: None,
            levels: Vec::new(),
            emitted_bands: Vec::new(),
            finished: false,
            stats: BuildStats::default(),
        }
    }

    /// Requested level count clamped to nonzero dimensions.
    ///
    /// Only meaningful once `dims` is known.
    pub fn usable_levels(&self) -> usize {
        let (w, h) = self.dims.expect("dimensions not yet decoded");
        LevelLayout::usable_levels(w, h, self.config.levels())
    }

    /// Create the backing file for level `k`.
    ///
    /// Waits out any flush throttle first: this is the one allocation
    /// point the back-pressure policy gates.
    pub fn create_level(&mut self, k: usize) -> Result<(), PyramidError> {
        self.flush.wait_until_clear();

        let (w, h) = self.dims.expect("dimensions not yet decoded");
        let layout = LevelLayout::for_level(k, w, h).expect("level count not clamped");
        debug_assert_eq!(self.levels.len(), k);

        let store = LevelStore::create(layout, self.config.temp_dir().map(PathBuf::as_path))?;
        self.levels.push(store);
        self.emitted_bands.push(0);
        Ok(())
    }

    /// Finalize level `k`: drop the scratch band, account the tiled
    /// payload with the flush coordinator, release its cached pages.
    pub fn finish_level(&mut self, k: usize) -> Result<(), PyramidError> {
        let store = &self.levels[k];
        store.truncate_scratch()?;
        self.emitted_bands[k] = store.layout().rows;

        let bytes = store.layout().tiled_payload_bytes();
        if self.config.flush_on_level_finish() {
            self.flush.schedule(k, store.file().clone(), bytes);
            self.stats.bytes_flushed += bytes;
        }
        store.drop_page_cache();

        self.stats.levels_finalized += 1;
        info!(level = k, bytes, "level finalized");
        Ok(())
    }

    /// Fail fast when the build's cancel flag is set.
    pub fn check_cancel(&self) -> Result<(), PyramidError> {
        if self.config.cancel().is_cancelled() {
            Err(PyramidError::Cancelled)
        } else {
            Ok(())
        }
    }
}
