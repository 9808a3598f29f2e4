//! Build statistics.

/// Counters accumulated over one pyramid build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Scanlines written into level 0.
    pub scanlines_written: u64,
    /// Tile rows emitted across all levels.
    pub tile_rows_emitted: u64,
    /// Levels finalized (retiled and truncated).
    pub levels_finalized: u32,
    /// Bytes handed to the flush coordinator for background sync.
    pub bytes_flushed: u64,
}

/// Geometry and on-disk footprint of one finished level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    /// Zoom level index.
    pub level: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tile columns.
    pub cols: u32,
    /// Tile rows.
    pub rows: u32,
    /// Current backing file size in bytes.
    pub file_bytes: u64,
}
