//! Image codec seam.
//!
//! Decoding and encoding go through the [`ImageCodec`] trait so the load
//! and save stages stay testable without touching real files, and so a
//! different codec backend can be dropped in later. [`FileCodec`] is the
//! production implementation built on the `image` crate.

use crate::error::StackError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Decodes and encodes image files.
///
/// Calls may be slow and blocking; the scheduler accounts for that by
/// running them on pool threads.
pub trait ImageCodec: Send + Sync {
    /// Decodes the file at `path` into a pixel buffer.
    fn decode(&self, path: &Path) -> Result<DynamicImage, StackError>;

    /// Encodes `img` to `path`.
    ///
    /// `quality` applies to lossy formats (JPEG) and is ignored otherwise.
    fn encode(&self, path: &Path, img: &DynamicImage, quality: u8) -> Result<(), StackError>;
}

/// Codec backed by the `image` crate, dispatching on file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

impl ImageCodec for FileCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage, StackError> {
        Ok(image::open(path)?)
    }

    fn encode(&self, path: &Path, img: &DynamicImage, quality: u8) -> Result<(), StackError> {
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);

        if is_jpeg {
            let file = File::create(path)?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
            img.write_with_encoder(encoder)?;
        } else {
            img.save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = gradient(64, 48);

        FileCodec.encode(&path, &img, 90).unwrap();
        let back = FileCodec.decode(&path).unwrap();

        assert_eq!(back.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_jpeg_encode_honors_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");

        FileCodec.encode(&path, &gradient(64, 48), 80).unwrap();
        let back = FileCodec.decode(&path).unwrap();
        assert_eq!(back.width(), 64);
        assert_eq!(back.height(), 48);
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileCodec.decode(&dir.path().join("nope.png"));
        assert!(result.is_err());
    }
}
