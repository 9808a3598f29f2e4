//! gigatile - pre-tiled multi-resolution pyramids for very large
//! raster images.
//!
//! The builder accepts an image source (decoded pixels in memory, a
//! file on disk, or a progressively arriving compressed byte stream)
//! and produces one memory-mapped backing file per zoom level, each
//! finally laid out as contiguous 256x256 RGBA tiles for random
//! access by a zooming viewer.
//!
//! # High-Level API
//!
//! Most callers only need [`Pyramid`] and [`BuildConfig`]:
//!
//! ```ignore
//! use gigatile::{BuildConfig, DecoderKind, Pyramid};
//!
//! let pyramid = Pyramid::from_path(
//!     "scan.ppm",
//!     DecoderKind::Scanline,
//!     BuildConfig::new().with_levels(3),
//! )?;
//!
//! let (width, height) = pyramid.image_size().unwrap();
//! let tile = pyramid.tile_at(1.0, 0, 0)?;
//! let pixels = tile.bytes()?;
//! ```
//!
//! Incremental sources use [`Pyramid::for_network`] and feed bytes as
//! they arrive; the streaming pipeline decodes scanlines, downsamples
//! across levels and retiles completed tile rows on the fly.

pub mod config;
pub mod decode;
pub mod error;
pub mod flush;
pub mod layout;
pub mod mapper;
mod pipeline;
pub mod pyramid;
pub mod resample;
pub mod system;
pub mod tiler;

pub use config::{BuildConfig, CancelFlag, DownsampleMode};
pub use decode::DecoderKind;
pub use error::{DecoderError, PyramidError};
pub use flush::FlushCoordinator;
pub use pyramid::{BuildStats, FeedProgress, LevelInfo, Pyramid, Tile, TileBytes};

/// Version of the gigatile library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
