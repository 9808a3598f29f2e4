//! System probes backing the pyramid's resource policy.
//!
//! Provides total-memory detection (deciding the `memory_constrained`
//! default) and the page size used for map-window alignment, with
//! fallbacks for platforms where detection fails.

use std::sync::OnceLock;

use tracing::debug;

/// Devices at or below this much RAM are treated as memory
/// constrained: every finished level is flushed to media in the
/// background so the page cache cannot evict foreground pages.
pub const MEMORY_CONSTRAINED_THRESHOLD: u64 = 512 * 1024 * 1024;

/// Fallback page size when `sysconf` fails.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// OS page size, probed once.
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf with a valid name has no preconditions.
        let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if n > 0 {
            n as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

/// Total physical memory in bytes, if the platform exposes it.
pub fn total_memory() -> Option<u64> {
    // SAFETY: sysconf with valid names has no preconditions.
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    if pages <= 0 {
        return None;
    }
    Some(pages as u64 * page_size() as u64)
}

/// Whether this machine should default to memory-constrained behavior.
///
/// Unknown memory size is treated as constrained; assuming abundance
/// on a device we could not probe is the wrong failure mode.
pub fn is_memory_constrained() -> bool {
    match total_memory() {
        Some(total) => {
            let constrained = total <= MEMORY_CONSTRAINED_THRESHOLD;
            debug!(
                total_bytes = total,
                constrained, "probed total physical memory"
            );
            constrained
        }
        None => {
            debug!("total memory probe failed, assuming constrained");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_positive_power_of_two() {
        let p = page_size();
        assert!(p >= 512);
        assert_eq!(p & (p - 1), 0);
    }

    #[test]
    fn test_total_memory_detects_something() {
        // Any machine running the test suite has more than 16 MB.
        if let Some(total) = total_memory() {
            assert!(total > 16 * 1024 * 1024);
        }
    }
}
