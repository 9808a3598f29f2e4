//! Random-access tile read-back.
//!
//! A [`Tile`] is a lazy byte source: it owns a reference-counted
//! handle to its level's backing file plus the tile's offset, and
//! maps the tile's bytes only when asked. The mapping is released
//! when the returned [`TileBytes`] drops, so a viewer can hold many
//! tiles while paying for none of them.

use std::fs::File;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::PyramidError;
use crate::layout::{TILE, TILE_BYTES};
use crate::mapper::{MapMode, MapWindow};

/// One tile of one pyramid level.
///
/// Keeps its level's file descriptor alive; the pyramid may be
/// dropped while tiles are still outstanding.
pub struct Tile {
    file: Arc<File>,
    level: usize,
    row: u32,
    col: u32,
    offset: u64,
}

impl Tile {
    pub(crate) fn new(file: Arc<File>, level: usize, row: u32, col: u32, offset: u64) -> Self {
        Self {
            file,
            level,
            row,
            col,
            offset,
        }
    }

    /// Zoom level this tile belongs to.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Tile row within the level.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Tile column within the level.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Logical pixel size. Always full tile dimensions: edge tiles
    /// report `TILE x TILE` too, with unspecified padding pixels.
    pub fn size(&self) -> (u32, u32) {
        (TILE as u32, TILE as u32)
    }

    /// Byte length of the tile's pixel block.
    pub fn byte_len(&self) -> usize {
        TILE_BYTES
    }

    /// Map the tile's bytes read-only.
    ///
    /// Each call maps afresh; the mapping is released when the
    /// returned guard drops.
    pub fn bytes(&self) -> Result<TileBytes, PyramidError> {
        let window = MapWindow::map(&self.file, self.offset, TILE_BYTES, MapMode::Read)?;
        Ok(TileBytes { window })
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("level", &self.level)
            .field("row", &self.row)
            .field("col", &self.col)
            .finish()
    }
}

/// A mapped tile: `TILE * TILE` RGBA pixels, row-major, top-left
/// pixel first. Unmapped on drop.
pub struct TileBytes {
    window: MapWindow,
}

impl Deref for TileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.window.bytes()
    }
}

impl AsRef<[u8]> for TileBytes {
    fn as_ref(&self) -> &[u8] {
        self.window.bytes()
    }
}
