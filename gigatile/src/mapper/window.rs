//! Scoped memory-map windows with page-offset rounding.

use std::fs::File;
use std::io;

use memmap2::{Advice, Mmap, MmapMut, MmapOptions};

use crate::system;

/// Access mode for a map window.
///
/// POSIX has no true write-only mapping, so write windows map
/// read-write and callers simply never read through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Read-only mapping.
    Read,
    /// Read-write mapping.
    Write,
}

enum Backing {
    Ro(Mmap),
    Rw(MmapMut),
}

/// A mapped byte range of a level file.
///
/// The requested offset is rounded down to the page boundary and the
/// length grown by the same amount; [`MapWindow::bytes`] hides the
/// rounding and exposes exactly the requested range. The mapping is
/// released on drop, so a window never outlives the scope that
/// created it.
pub struct MapWindow {
    backing: Backing,
    delta: usize,
    len: usize,
}

impl MapWindow {
    /// Map `len` bytes of `file` starting at `offset`.
    pub fn map(file: &File, offset: u64, len: usize, mode: MapMode) -> io::Result<Self> {
        let page = system::page_size() as u64;
        let aligned = offset & !(page - 1);
        let delta = (offset - aligned) as usize;
        let map_len = len + delta;

        let backing = match mode {
            // SAFETY: the level file is exclusively owned by this
            // process for the lifetime of the pyramid; no other
            // process can truncate it under the mapping.
            MapMode::Read => {
                Backing::Ro(unsafe { MmapOptions::new().offset(aligned).len(map_len).map(file)? })
            }
            MapMode::Write => Backing::Rw(unsafe {
                MmapOptions::new().offset(aligned).len(map_len).map_mut(file)?
            }),
        };

        Ok(Self {
            backing,
            delta,
            len,
        })
    }

    /// The requested byte range.
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Ro(m) => &m[self.delta..self.delta + self.len],
            Backing::Rw(m) => &m[self.delta..self.delta + self.len],
        }
    }

    /// The requested byte range, writable.
    ///
    /// # Panics
    ///
    /// Panics when called on a [`MapMode::Read`] window; that is a
    /// caller bug, not a runtime condition.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Rw(m) => &mut m[self.delta..self.delta + self.len],
            Backing::Ro(_) => panic!("write access through a read-only map window"),
        }
    }

    /// Length of the requested range.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the requested range is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hint the kernel that the window will be read sequentially.
    pub fn advise_sequential(&self) -> io::Result<()> {
        match &self.backing {
            Backing::Ro(m) => m.advise(Advice::Sequential),
            Backing::Rw(m) => m.advise(Advice::Sequential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unaligned_window_round_trip() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&vec![0u8; 16384]).unwrap();

        // 1000 is not page aligned on any supported platform.
        let mut w = MapWindow::map(&file, 1000, 512, MapMode::Write).unwrap();
        assert_eq!(w.len(), 512);
        w.bytes_mut().copy_from_slice(&[0xAB; 512]);
        drop(w);

        let r = MapWindow::map(&file, 1000, 512, MapMode::Read).unwrap();
        assert!(r.bytes().iter().all(|&b| b == 0xAB));

        // The byte just before the window is untouched.
        let edge = MapWindow::map(&file, 999, 2, MapMode::Read).unwrap();
        assert_eq!(edge.bytes()[0], 0);
        assert_eq!(edge.bytes()[1], 0xAB);
    }

    #[test]
    #[should_panic(expected = "read-only map window")]
    fn test_read_window_rejects_writes() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0u8; 4096]).unwrap();
        let mut w = MapWindow::map(&file, 0, 16, MapMode::Read).unwrap();
        let _ = w.bytes_mut();
    }
}
