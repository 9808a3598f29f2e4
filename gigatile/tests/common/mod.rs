//! Shared helpers for the integration suites.
#![allow(dead_code)]

use gigatile::layout::{BYTES_PER_PIXEL, TILE};
use gigatile::{Pyramid, PyramidError};

/// Binary PPM (P6) bytes for a `width x height` image with pixels
/// from `f(x, y) -> [r, g, b]`.
pub fn ppm_bytes(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
    let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
    for y in 0..height {
        for x in 0..width {
            out.extend_from_slice(&f(x, y));
        }
    }
    out
}

/// Tightly packed RGBA pixels with `f(x, y) -> [r, g, b]` and opaque alpha.
pub fn rgba_pixels(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
    for y in 0..height {
        for x in 0..width {
            let [r, g, b] = f(x, y);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    }
    out
}

/// A gradient whose value pins down the pixel's full coordinates,
/// even past 255 in either axis.
pub fn coord_tag(x: u32, y: u32) -> [u8; 3] {
    [(x & 0xFF) as u8, (y & 0xFF) as u8, ((x >> 8) << 4 | (y >> 8)) as u8]
}

/// Read pixel `(x, y)` of level `level` through the tile provider.
pub fn pyramid_pixel(pyramid: &Pyramid, level: usize, x: u32, y: u32) -> [u8; 4] {
    let scale = 1.0 / (1u32 << level) as f64;
    let tile = pyramid
        .tile_at(scale, y / TILE as u32, x / TILE as u32)
        .expect("tile in range");
    let bytes = tile.bytes().expect("tile mappable");
    let i = (y % TILE as u32) as usize;
    let j = (x % TILE as u32) as usize;
    let o = (i * TILE + j) * BYTES_PER_PIXEL;
    [bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]
}

/// Compare every tile of every level between two pyramids, byte for byte.
pub fn assert_same_tiles(a: &Pyramid, b: &Pyramid) {
    assert_eq!(a.level_count(), b.level_count());
    for level in 0..a.level_count() {
        let info = a.level_info(level).unwrap();
        assert_eq!(Some(info), b.level_info(level));
        let scale = 1.0 / (1u32 << level) as f64;
        for row in 0..info.rows {
            for col in 0..info.cols {
                let ta = a.tile_at(scale, row, col).unwrap();
                let tb = b.tile_at(scale, row, col).unwrap();
                assert_eq!(
                    &*ta.bytes().unwrap(),
                    &*tb.bytes().unwrap(),
                    "level {level} tile ({row}, {col})"
                );
            }
        }
    }
}

/// Expect an out-of-range rejection.
pub fn assert_out_of_range(result: Result<gigatile::Tile, PyramidError>) {
    match result {
        Err(PyramidError::OutOfRange { .. }) => {}
        other => panic!("expected OutOfRange, got {:?}", other.map(|t| (t.level(), t.row(), t.col()))),
    }
}
