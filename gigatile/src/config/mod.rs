//! Build configuration and cancellation.
//!
//! [`BuildConfig`] collects the options from the producer-facing API:
//! level count, downsampler strategy, flush policy, and an optional
//! private flush coordinator for tests. Options use the builder
//! pattern; `BuildConfig::default()` is the sensible baseline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::flush::FlushCoordinator;
use crate::system;

/// Default number of zoom levels when none is requested.
pub const DEFAULT_LEVELS: usize = 3;

/// Downsampling strategy for generating level `k+1` from level `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsampleMode {
    /// Nearest pixel: `dst[r][c] = src[2r][2c]`. Fast, no filtering.
    #[default]
    Decimate,
    /// 2×2 box average. Slower, smoother small levels.
    HighQuality,
}

/// Cooperative cancellation flag shared with a build.
///
/// The producer checks it at the natural atomic steps (one scanline,
/// one tile row, one level) and stops with `PyramidError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the associated build.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for one pyramid build.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    levels: Option<usize>,
    flush_disk_cache: bool,
    memory_constrained: Option<bool>,
    downsampler: DownsampleMode,
    temp_dir: Option<PathBuf>,
    cancel: CancelFlag,
    flush: Option<Arc<FlushCoordinator>>,
}

impl BuildConfig {
    /// Baseline configuration: three levels, decimation, flush policy
    /// decided by the memory probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of zoom levels to produce (clamped to the levels whose
    /// dimensions stay nonzero).
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = Some(levels.max(1));
        self
    }

    /// Always schedule a background fsync when a level finishes.
    pub fn with_flush_disk_cache(mut self, flush: bool) -> Self {
        self.flush_disk_cache = flush;
        self
    }

    /// Force memory-constrained behavior on or off instead of probing.
    pub fn with_memory_constrained(mut self, constrained: bool) -> Self {
        self.memory_constrained = Some(constrained);
        self
    }

    /// Select the downsampling strategy.
    pub fn with_downsampler(mut self, mode: DownsampleMode) -> Self {
        self.downsampler = mode;
        self
    }

    /// Directory for the unlinked backing files (defaults to the
    /// system temp directory).
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Attach a cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use a private flush coordinator instead of the process-wide one.
    pub fn with_flush_coordinator(mut self, flush: Arc<FlushCoordinator>) -> Self {
        self.flush = Some(flush);
        self
    }

    /// Requested level count.
    pub fn levels(&self) -> usize {
        self.levels.unwrap_or(DEFAULT_LEVELS)
    }

    /// Selected downsampling strategy.
    pub fn downsampler(&self) -> DownsampleMode {
        self.downsampler
    }

    /// Backing-file directory override, if any.
    pub fn temp_dir(&self) -> Option<&PathBuf> {
        self.temp_dir.as_ref()
    }

    /// The build's cancellation flag.
    pub fn cancel(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Whether finished levels should be flushed to media in the
    /// background: explicitly requested, or the device is memory
    /// constrained (configured or probed).
    pub fn flush_on_level_finish(&self) -> bool {
        self.flush_disk_cache
            || self
                .memory_constrained
                .unwrap_or_else(system::is_memory_constrained)
    }

    /// The flush coordinator this build reports to.
    pub fn flush_coordinator(&self) -> Arc<FlushCoordinator> {
        self.flush
            .clone()
            .unwrap_or_else(crate::flush::global)
    }
}
