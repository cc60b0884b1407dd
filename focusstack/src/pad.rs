//! Reflected-border padding.
//!
//! Enlarges a buffer to the size the wavelet decomposition needs, filling
//! the new border with pixels mirrored across the original edges (the
//! edge row/column itself is duplicated). The extra rows and columns are
//! split as evenly as possible between the two sides; with an odd surplus
//! the right/bottom side gets the extra pixel.

use image::{DynamicImage, ImageBuffer, Pixel};

/// Enlarges `img` to `ew` × `eh` with reflected borders.
///
/// The original content lands at offset `((ew - w) / 2, (eh - h) / 2)`,
/// which is also where the caller must place the valid region. The pixel
/// format is preserved for all standard formats.
///
/// # Panics
///
/// Panics if the target size is smaller than the source in either
/// dimension; callers get the target from
/// [`crate::wavelet::levels_for_size`], which never shrinks.
pub fn reflect_expand(img: &DynamicImage, ew: u32, eh: u32) -> DynamicImage {
    assert!(
        ew >= img.width() && eh >= img.height(),
        "expansion target {}x{} smaller than source {}x{}",
        ew,
        eh,
        img.width(),
        img.height()
    );
    let left = (ew - img.width()) / 2;
    let top = (eh - img.height()) / 2;

    match img {
        DynamicImage::ImageLuma8(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageLumaA8(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgb8(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgba8(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageLuma16(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageLumaA16(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgb16(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgba16(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgb32F(b) => pad_buffer(b, left, top, ew, eh).into(),
        DynamicImage::ImageRgba32F(b) => pad_buffer(b, left, top, ew, eh).into(),
        // DynamicImage is non-exhaustive; fall back through RGBA8.
        other => pad_buffer(&other.to_rgba8(), left, top, ew, eh).into(),
    }
}

fn pad_buffer<P: Pixel>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    left: u32,
    top: u32,
    ew: u32,
    eh: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (w, h) = src.dimensions();
    ImageBuffer::from_fn(ew, eh, |x, y| {
        let sx = reflect(x as i64 - left as i64, w as i64);
        let sy = reflect(y as i64 - top as i64, h as i64);
        *src.get_pixel(sx, sy)
    })
}

/// Maps an out-of-range index into `0..len` by mirroring across the
/// borders, duplicating the edge sample. Iterates so padding wider than
/// the source still folds back into range.
fn reflect(mut i: i64, len: i64) -> u32 {
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= len {
            i = 2 * len - i - 1;
        } else {
            return i as u32;
        }
    }
}
