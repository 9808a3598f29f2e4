//! Integration tests for the streaming pipeline: equivalence with the
//! whole-image path, suspension at arbitrary byte boundaries, partial
//! tile-row visibility, sticky failures, and flush accounting.

mod common;

use common::{assert_out_of_range, assert_same_tiles, coord_tag, ppm_bytes};
use gigatile::{
    BuildConfig, CancelFlag, DecoderKind, FeedProgress, FlushCoordinator, Pyramid, PyramidError,
};

fn stream_config(levels: usize) -> BuildConfig {
    BuildConfig::new().with_levels(levels)
}

/// Feed `data` in `chunk`-sized pieces and finish.
fn stream_in_chunks(data: &[u8], chunk: usize, config: BuildConfig) -> Pyramid {
    let mut pyramid = Pyramid::for_network(DecoderKind::Scanline, config);
    for piece in data.chunks(chunk) {
        pyramid.append_bytes(piece).expect("append succeeds");
    }
    pyramid.data_finished().expect("stream completes");
    pyramid
}

#[test]
fn test_chunked_stream_matches_whole_image() {
    let data = ppm_bytes(1024, 768, coord_tag);

    let streamed = stream_in_chunks(&data, 1024, stream_config(3));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.ppm");
    std::fs::write(&path, &data).unwrap();
    let whole = Pyramid::from_path(&path, DecoderKind::OneShot, stream_config(3)).unwrap();

    assert_same_tiles(&streamed, &whole);
}

#[test]
fn test_byte_at_a_time_matches_bulk() {
    // Ragged dimensions: partial right and bottom tiles on every level.
    let data = ppm_bytes(300, 300, coord_tag);

    let trickled = stream_in_chunks(&data, 1, stream_config(2));
    let bulk = stream_in_chunks(&data, data.len(), stream_config(2));

    assert_same_tiles(&trickled, &bulk);
    assert_eq!(trickled.stats().scanlines_written, 300);
}

#[test]
fn test_feed_progress_reporting() {
    let data = ppm_bytes(64, 512, |_, _| [1, 2, 3]);
    let mut pyramid = Pyramid::for_network(DecoderKind::Scanline, stream_config(1));

    // Nothing decodable from half a magic number.
    assert_eq!(pyramid.append_bytes(&data[..1]).unwrap(), FeedProgress::NeedMore);
    assert_eq!(pyramid.image_size(), None);

    // Header plus some rows.
    let header_len = data.len() - 64 * 512 * 3;
    let some_rows = header_len + 64 * 3 * 10;
    assert_eq!(
        pyramid.append_bytes(&data[1..some_rows]).unwrap(),
        FeedProgress::Progressed
    );
    assert_eq!(pyramid.image_size(), Some((64, 512)));
    assert!(!pyramid.is_finished());

    // The rest of the image.
    assert_eq!(
        pyramid.append_bytes(&data[some_rows..]).unwrap(),
        FeedProgress::Done
    );
    pyramid.data_finished().unwrap();
    assert!(pyramid.is_finished());
}

#[test]
fn test_partial_tile_rows_become_visible() {
    let data = ppm_bytes(512, 512, coord_tag);
    let header_len = data.len() - 512 * 512 * 3;
    let mut pyramid = Pyramid::for_network(DecoderKind::Scanline, stream_config(2));

    // Exactly the first 256 scanlines: level 0 band 0 is complete.
    pyramid
        .append_bytes(&data[..header_len + 512 * 3 * 256])
        .unwrap();
    assert!(pyramid.tile_at(1.0, 0, 0).is_ok());
    assert!(pyramid.tile_at(1.0, 0, 1).is_ok());
    // Band 1 is not, and neither is level 1 (needs all 512 rows).
    assert_out_of_range(pyramid.tile_at(1.0, 1, 0));
    assert_out_of_range(pyramid.tile_at(0.5, 0, 0));

    pyramid.append_bytes(&data[header_len + 512 * 3 * 256..]).unwrap();
    pyramid.data_finished().unwrap();
    assert!(pyramid.tile_at(1.0, 1, 1).is_ok());
    assert!(pyramid.tile_at(0.5, 0, 0).is_ok());
}

#[test]
fn test_truncated_stream_fails_sticky() {
    let data = ppm_bytes(300, 300, |_, _| [7, 7, 7]);
    let mut pyramid = Pyramid::for_network(DecoderKind::Scanline, stream_config(2));
    pyramid.append_bytes(&data[..data.len() - 10]).unwrap();

    let err = pyramid.data_finished().unwrap_err();
    assert!(matches!(err, PyramidError::Decoder(_)), "got {err:?}");
    assert_eq!(pyramid.failure(), Some(&err));

    // Every later operation replays the failure; no tiles come back.
    assert_eq!(pyramid.tile_at(1.0, 0, 0).unwrap_err(), err);
    assert_eq!(pyramid.append_bytes(&[0]).unwrap_err(), err);
    // The header had been decoded before the failure.
    assert_eq!(pyramid.image_size(), Some((300, 300)));
}

#[test]
fn test_one_shot_kind_accumulates_until_finish() {
    let data = ppm_bytes(300, 200, coord_tag);
    let mut pyramid = Pyramid::for_network(DecoderKind::OneShot, stream_config(2));

    for piece in data.chunks(777) {
        assert_eq!(pyramid.append_bytes(piece).unwrap(), FeedProgress::NeedMore);
    }
    assert_eq!(pyramid.image_size(), None, "nothing decodes before finish");

    pyramid.data_finished().unwrap();
    assert_eq!(pyramid.image_size(), Some((300, 200)));
    assert!(pyramid.tile_at(0.5, 0, 0).is_ok());
}

#[test]
fn test_streaming_flush_accounting() {
    let flush = FlushCoordinator::new();
    let data = ppm_bytes(600, 600, |_, _| [9, 9, 9]);
    let config = BuildConfig::new()
        .with_levels(2)
        .with_memory_constrained(true)
        .with_flush_coordinator(flush.clone());

    let pyramid = stream_in_chunks(&data, 4096, config);

    let expected: u64 = (0..pyramid.level_count())
        .map(|k| pyramid.level_info(k).unwrap().file_bytes)
        .sum();
    assert_eq!(pyramid.stats().bytes_flushed, expected);

    flush.wait_idle();
    assert_eq!(flush.dirty_bytes(), 0);
}

#[test]
fn test_cancelled_stream_stops() {
    let data = ppm_bytes(512, 512, |_, _| [0, 0, 0]);
    let cancel = CancelFlag::new();
    let mut pyramid = Pyramid::for_network(
        DecoderKind::Scanline,
        stream_config(1).with_cancel(cancel.clone()),
    );

    pyramid.append_bytes(&data[..1024]).unwrap();
    cancel.cancel();
    assert_eq!(
        pyramid.append_bytes(&data[1024..]).unwrap_err(),
        PyramidError::Cancelled
    );
    assert_eq!(pyramid.failure(), Some(&PyramidError::Cancelled));
}
