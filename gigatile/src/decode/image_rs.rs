//! One-shot adapters backed by the `image` crate.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::error::DecoderError;
use crate::layout::BYTES_PER_PIXEL;

use super::OneShotDecoder;

/// Copy a decoded RGBA image into the strided destination surface.
fn blit_rgba(
    rgba: &image::RgbaImage,
    dst: &mut [u8],
    row_stride: usize,
    width: u32,
    height: u32,
) -> Result<(), DecoderError> {
    if rgba.width() != width || rgba.height() != height {
        return Err(DecoderError::Corrupt(format!(
            "decoded {}x{}, expected {}x{}",
            rgba.width(),
            rgba.height(),
            width,
            height
        )));
    }
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let src = rgba.as_raw();
    for y in 0..height as usize {
        let d = y * row_stride;
        dst[d..d + row_bytes].copy_from_slice(&src[y * row_bytes..(y + 1) * row_bytes]);
    }
    Ok(())
}

/// One-shot decoder with format sniffing: PNG, JPEG, PPM and the rest
/// of the `image` crate's readers.
pub struct SniffingOneShot;

impl OneShotDecoder for SniffingOneShot {
    fn dimensions(&self, input: &[u8]) -> Result<(u32, u32), DecoderError> {
        ImageReader::new(Cursor::new(input))
            .with_guessed_format()
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?
            .into_dimensions()
            .map_err(|e| DecoderError::Corrupt(e.to_string()))
    }

    fn decode_into(
        &self,
        input: &[u8],
        dst: &mut [u8],
        row_stride: usize,
        width: u32,
        height: u32,
    ) -> Result<(), DecoderError> {
        let decoded = ImageReader::new(Cursor::new(input))
            .with_guessed_format()
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?
            .decode()
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?;
        blit_rgba(&decoded.to_rgba8(), dst, row_stride, width, height)
    }
}

/// One-shot decoder pinned to the JPEG codec, for callers that know
/// their input and want to skip sniffing.
pub struct JpegOneShot;

impl OneShotDecoder for JpegOneShot {
    fn dimensions(&self, input: &[u8]) -> Result<(u32, u32), DecoderError> {
        let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(input))
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?;
        Ok(decoder.dimensions())
    }

    fn decode_into(
        &self,
        input: &[u8],
        dst: &mut [u8],
        row_stride: usize,
        width: u32,
        height: u32,
    ) -> Result<(), DecoderError> {
        let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(input))
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?;
        let decoded = DynamicImage::from_decoder(decoder)
            .map_err(|e| DecoderError::Corrupt(e.to_string()))?;
        blit_rgba(&decoded.to_rgba8(), dst, row_stride, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 0, 255])
        });
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_sniffing_dimensions() {
        let bytes = png_bytes(13, 7);
        assert_eq!(SniffingOneShot.dimensions(&bytes).unwrap(), (13, 7));
    }

    #[test]
    fn test_sniffing_decode_into_strided() {
        let bytes = png_bytes(4, 3);
        let stride = 4 * BYTES_PER_PIXEL + 12;
        let mut dst = vec![0u8; stride * 3];
        SniffingOneShot
            .decode_into(&bytes, &mut dst, stride, 4, 3)
            .unwrap();

        for y in 0..3usize {
            for x in 0..4usize {
                let o = y * stride + x * BYTES_PER_PIXEL;
                assert_eq!(&dst[o..o + 4], &[x as u8, y as u8, 0, 255]);
            }
        }
        // Stride padding untouched.
        assert_eq!(&dst[4 * BYTES_PER_PIXEL..stride], &[0u8; 12]);
    }

    #[test]
    fn test_garbage_input_is_corrupt() {
        let err = SniffingOneShot.dimensions(b"not an image at all").unwrap_err();
        assert!(matches!(err, DecoderError::Corrupt(_)));
    }

    #[test]
    fn test_jpeg_adapter_rejects_png() {
        let bytes = png_bytes(4, 4);
        assert!(JpegOneShot.dimensions(&bytes).is_err());
    }
}
