//! Image saving and final composition stage.
//!
//! [`SaveImgTask`] consumes one image-producing dependency (plus an
//! optional alpha mask), strips the wavelet padding, normalizes exotic
//! channel layouts to something viewable, and either encodes the result
//! to a file or — for the in-memory sentinel path — keeps it as the
//! task's result for programmatic retrieval.

use crate::codec::{FileCodec, ImageCodec};
use crate::error::StackError;
use crate::log::Logger;
use crate::region::Rect;
use crate::task::image::{ImageSlot, ImgTask};
use crate::task::{Task, TaskCore};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

/// Reserved output path meaning "produce the result without file I/O".
pub const MEMORY_SENTINEL: &str = ":memory:";

/// Saves a stacked image to disk, or composes it in memory.
pub struct SaveImgTask {
    core: TaskCore,
    slot: ImageSlot,
    codec: Arc<dyn ImageCodec>,
    path: String,
    quality: u8,
    nocrop: bool,
    input: Mutex<Option<Arc<dyn ImgTask>>>,
    alphamask: Mutex<Option<Arc<dyn ImgTask>>>,
}

impl SaveImgTask {
    /// Creates a save task.
    ///
    /// # Arguments
    ///
    /// * `path` - Output file; empty or [`MEMORY_SENTINEL`] skips file I/O
    /// * `input` - The image-producing dependency to save
    /// * `alphamask` - Optional mask merged in as a 4th channel
    /// * `quality` - Quality level for lossy encoding (JPEG)
    /// * `nocrop` - Keep the full frame, removing only wavelet padding
    pub fn new(
        path: impl Into<String>,
        input: Arc<dyn ImgTask>,
        alphamask: Option<Arc<dyn ImgTask>>,
        quality: u8,
        nocrop: bool,
    ) -> Self {
        Self::with_codec(path, input, alphamask, quality, nocrop, Arc::new(FileCodec))
    }

    /// Creates a save task with an injected codec.
    pub fn with_codec(
        path: impl Into<String>,
        input: Arc<dyn ImgTask>,
        alphamask: Option<Arc<dyn ImgTask>>,
        quality: u8,
        nocrop: bool,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        let path = path.into();
        let name = if !path.is_empty() && path != MEMORY_SENTINEL {
            format!("save {path}")
        } else {
            format!("final crop of {}", input.filename())
        };

        let mut depends: Vec<Arc<dyn Task>> = vec![input.clone()];
        if let Some(mask) = &alphamask {
            depends.push(mask.clone());
        }

        Self {
            core: TaskCore::with_depends(name, path.clone(), depends),
            slot: ImageSlot::new(),
            codec,
            path,
            quality,
            nocrop,
            input: Mutex::new(Some(input)),
            alphamask: Mutex::new(alphamask),
        }
    }

    /// True when the task encodes to a real file.
    pub fn writes_file(&self) -> bool {
        !self.path.is_empty() && self.path != MEMORY_SENTINEL
    }

    /// Removes the padding from the main input according to the crop mode.
    fn depad_input(
        &self,
        input: &Arc<dyn ImgTask>,
        img: &Arc<DynamicImage>,
        logger: &Arc<dyn Logger>,
    ) -> Result<(Arc<DynamicImage>, Rect), StackError> {
        let area = input.valid_area();

        if self.nocrop {
            // Even without cropping, padding never reaches the output.
            if area.covers(img.width(), img.height()) {
                return Ok((img.clone(), area));
            }
            logger.verbose(format_args!(
                "{} extracting original area {} from padded image",
                self.name(),
                area
            ));
            let extracted = match input.extract_original_area(img) {
                Cow::Borrowed(_) => img.clone(),
                Cow::Owned(e) => Arc::new(e),
            };
            let full = Rect::full(extracted.width(), extracted.height());
            Ok((extracted, full))
        } else {
            let orig = (img.width(), img.height());
            let cropped = input
                .img_cropped()
                .ok_or_else(|| StackError::MissingResult(input.name().to_string()))?;
            if (cropped.width(), cropped.height()) != orig {
                logger.verbose(format_args!(
                    "{} cropped from ({}, {}) to ({}, {})",
                    self.name(),
                    orig.0,
                    orig.1,
                    cropped.width(),
                    cropped.height()
                ));
            }
            let full = Rect::full(cropped.width(), cropped.height());
            Ok((cropped, full))
        }
    }

    /// Converts a 2-channel complex-wavelet intermediate into a viewable
    /// 3-channel image: both channels coerced to 8 bits, third zeroed.
    fn normalize_two_channel(img: &Arc<DynamicImage>) -> Arc<DynamicImage> {
        if img.color().channel_count() != 2 {
            return img.clone();
        }
        let la = img.to_luma_alpha8();
        let rgb = RgbImage::from_fn(img.width(), img.height(), |x, y| {
            let p = la.get_pixel(x, y);
            Rgb([p[0], p[1], 0])
        });
        Arc::new(DynamicImage::ImageRgb8(rgb))
    }

    /// Merges the alpha mask in as a 4th channel, mirroring the main
    /// image's crop mode on the mask.
    fn composite_alpha(
        &self,
        result: &Arc<DynamicImage>,
        mask: Arc<dyn ImgTask>,
    ) -> Result<Arc<DynamicImage>, StackError> {
        let mask_img = mask
            .img()
            .ok_or_else(|| StackError::MissingResult(mask.name().to_string()))?;

        let mask_buf = if self.nocrop {
            match mask.extract_original_area(&mask_img) {
                Cow::Borrowed(_) => mask_img.clone(),
                Cow::Owned(m) => Arc::new(m),
            }
        } else {
            mask.img_cropped()
                .ok_or_else(|| StackError::MissingResult(mask.name().to_string()))?
        };

        let (w, h) = (result.width(), result.height());
        if (mask_buf.width(), mask_buf.height()) != (w, h) {
            return Err(StackError::dimension_mismatch(
                "alpha mask",
                (w, h),
                (mask_buf.width(), mask_buf.height()),
            ));
        }

        // A single-channel main image is replicated across RGB first.
        let base = if result.color().channel_count() == 1 {
            let gray = result.to_luma8();
            RgbImage::from_fn(w, h, |x, y| {
                let v = gray.get_pixel(x, y)[0];
                Rgb([v, v, v])
            })
        } else {
            result.to_rgb8()
        };

        let alpha = mask_buf.to_luma8();
        let rgba = RgbaImage::from_fn(w, h, |x, y| {
            let Rgb([r, g, b]) = *base.get_pixel(x, y);
            Rgba([r, g, b, alpha.get_pixel(x, y)[0]])
        });
        Ok(Arc::new(DynamicImage::ImageRgba8(rgba)))
    }
}

impl Task for SaveImgTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn execute(&self, logger: &Arc<dyn Logger>) -> Result<(), StackError> {
        let input = self
            .input
            .lock()
            .take()
            .ok_or_else(|| StackError::MissingResult(self.name().to_string()))?;
        let img = input
            .img()
            .ok_or_else(|| StackError::MissingResult(input.name().to_string()))?;

        let (depadded, valid) = self.depad_input(&input, &img, logger)?;
        let mut result = Self::normalize_two_channel(&depadded);

        if let Some(mask) = self.alphamask.lock().take() {
            result = self.composite_alpha(&result, mask)?;
        }

        // Dependency image references are released here, bounding peak
        // memory when many buffers are resident at once.
        drop(img);
        drop(input);

        self.slot.install(result.clone(), valid);

        if self.writes_file() {
            self.codec
                .encode(Path::new(&self.path), &result, self.quality)?;
        }
        Ok(())
    }
}

impl ImgTask for SaveImgTask {
    fn slot(&self) -> &ImageSlot {
        &self.slot
    }
}
