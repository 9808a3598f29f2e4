//! Backing-file ownership and scoped memory maps.
//!
//! Each pyramid level owns one anonymous temp file holding its
//! pixels: row-major while the level is written, tile-major after
//! retiling.
//! [`LevelStore`] creates the file (unlinked, read-ahead disabled,
//! preallocated in one extent, sized by truncate) and hands out
//! [`MapWindow`]s over it. Scanline-granularity work maps tiny
//! windows so a build never pages a whole image; whole-image passes
//! map the full file once and let the kernel prefetch.
//!
//! The descriptor is reference counted: tiles handed to the viewer
//! keep a clone, so the file outlives the pyramid until the last
//! outstanding tile is released.

mod window;

pub use window::{MapMode, MapWindow};

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::layout::LevelLayout;

/// One pyramid level's backing file and geometry.
pub struct LevelStore {
    layout: LevelLayout,
    file: Arc<File>,
}

impl LevelStore {
    /// Create, preallocate and size the backing file for `layout`.
    ///
    /// The file is created already unlinked so abnormal termination
    /// cannot leak it, read-ahead is disabled (tile access is random
    /// once the viewer takes over), and the full `mapped_size` is
    /// requested as a single contiguous extent before the truncate.
    pub fn create(layout: LevelLayout, dir: Option<&Path>) -> io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };

        disable_readahead(&file);
        preallocate(&file, layout.mapped_size)?;
        file.set_len(layout.mapped_size)?;

        debug!(
            level = layout.level,
            width = layout.width,
            height = layout.height,
            mapped_size = layout.mapped_size,
            "created level backing file"
        );

        Ok(Self {
            layout,
            file: Arc::new(file),
        })
    }

    /// This level's geometry.
    pub fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    /// Reference-counted handle to the backing file.
    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    /// Map the entire file.
    pub fn map_whole(&self, mode: MapMode) -> io::Result<MapWindow> {
        MapWindow::map(&self.file, 0, self.layout.mapped_size as usize, mode)
    }

    /// Map `len` bytes starting at `offset`.
    pub fn map_window(&self, offset: u64, len: usize, mode: MapMode) -> io::Result<MapWindow> {
        debug_assert!(offset + len as u64 <= self.layout.mapped_size);
        MapWindow::map(&self.file, offset, len, mode)
    }

    /// Shrink the file by exactly the scratch band, leaving the bare
    /// tile payload. Only valid after the retiling pass completes.
    pub fn truncate_scratch(&self) -> io::Result<()> {
        let final_size = self.layout.mapped_size - self.layout.scratch_bytes as u64;
        debug_assert_eq!(final_size, self.layout.tiled_payload_bytes());
        self.file.set_len(final_size)
    }

    /// Current backing file size in bytes.
    pub fn file_size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Tell the kernel this file's cached pages can go.
    ///
    /// Best effort; used after a level is fully written so a large
    /// build does not hold every level resident at once.
    pub fn drop_page_cache(&self) {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: fd is valid for the lifetime of self.file.
            unsafe {
                libc::posix_fadvise(self.file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED);
            }
        }
    }
}

/// Turn off kernel read-ahead for the file. Best effort.
fn disable_readahead(file: &File) {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is valid for the lifetime of `file`.
        unsafe {
            libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_RANDOM);
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = file;
}

/// Ask for one contiguous preallocated extent of `size` bytes.
///
/// Filesystems that cannot preallocate are tolerated; genuine
/// failures (out of space) are not.
fn preallocate(file: &File, size: u64) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is valid for the lifetime of `file`.
        let rc = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
        if rc != 0 && rc != libc::EOPNOTSUPP && rc != libc::EINVAL {
            return Err(io::Error::from_raw_os_error(rc));
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = (file, size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LevelLayout, TILE_ROW_BYTES};
    use std::os::unix::fs::FileExt;

    fn store(width: u32, height: u32) -> LevelStore {
        let layout = LevelLayout::for_level(0, width, height).unwrap();
        LevelStore::create(layout, None).unwrap()
    }

    #[test]
    fn test_create_sizes_file_to_mapped_size() {
        let s = store(300, 200);
        assert_eq!(s.file_size().unwrap(), s.layout().mapped_size);
    }

    #[test]
    fn test_window_write_lands_at_requested_offset() {
        let s = store(300, 200);
        let offset = s.layout().row_major_offset(3);

        let mut w = s
            .map_window(offset, TILE_ROW_BYTES, MapMode::Write)
            .unwrap();
        w.bytes_mut().copy_from_slice(&[0x5A; TILE_ROW_BYTES]);
        drop(w);

        let mut back = [0u8; TILE_ROW_BYTES];
        s.file().read_exact_at(&mut back, offset).unwrap();
        assert!(back.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_truncate_scratch_leaves_tile_payload() {
        let s = store(512, 512);
        s.truncate_scratch().unwrap();
        assert_eq!(s.file_size().unwrap(), s.layout().tiled_payload_bytes());
    }

    #[test]
    fn test_file_handle_outlives_store() {
        let s = store(256, 256);
        let file = s.file().clone();
        let size = s.layout().mapped_size;
        drop(s);
        // The unlinked file stays alive through the cloned handle.
        assert_eq!(file.metadata().unwrap().len(), size);
    }
}
