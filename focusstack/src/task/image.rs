//! Image-carrying tasks and the valid-region model.
//!
//! An [`ImgTask`] produces a pixel buffer plus a [`Rect`] describing which
//! part of that buffer is genuine content as opposed to synthetic padding.
//! The two live together in an [`ImageSlot`] and can only be replaced in a
//! single operation, so the buffer and the region never describe
//! mismatched coordinate spaces — the invariant every padding and cropping
//! transformation in the pipeline relies on.

use crate::region::Rect;
use crate::task::Task;
use image::DynamicImage;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result buffer of an image task, paired with its valid region.
///
/// An empty region means "the entire buffer". The only mutators replace
/// buffer and region together ([`install`](ImageSlot::install)) or tighten
/// the region in place ([`limit_valid`](ImageSlot::limit_valid)).
#[derive(Default)]
pub struct ImageSlot {
    inner: Mutex<SlotState>,
    warned_unset: AtomicBool,
}

#[derive(Default)]
struct SlotState {
    img: Option<Arc<DynamicImage>>,
    valid: Rect,
}

impl ImageSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot already holding a buffer, with the region covering
    /// the whole buffer.
    pub fn with_image(img: DynamicImage) -> Self {
        let valid = Rect::full(img.width(), img.height());
        let slot = Self::new();
        slot.install(Arc::new(img), valid);
        slot
    }

    /// Replaces the buffer and the valid region in one operation.
    pub fn install(&self, img: Arc<DynamicImage>, valid: Rect) {
        let mut inner = self.inner.lock();
        inner.img = Some(img);
        inner.valid = valid;
    }

    /// Returns a shared handle to the current buffer, if one is set.
    pub fn image(&self) -> Option<Arc<DynamicImage>> {
        self.inner.lock().img.clone()
    }

    /// Returns the stored region as-is; empty means unset.
    pub fn raw_valid(&self) -> Rect {
        self.inner.lock().valid
    }

    /// Intersects the stored region with `other`.
    pub fn limit_valid(&self, other: Rect) {
        let mut inner = self.inner.lock();
        inner.valid = inner.valid.intersect(other);
    }
}

/// A [`Task`] whose result is an image buffer plus a valid region.
///
/// Implementors supply [`slot`](ImgTask::slot); the region accessors are
/// provided and shared by every image-producing stage.
pub trait ImgTask: Task {
    /// The result slot holding buffer and valid region.
    fn slot(&self) -> &ImageSlot;

    /// Returns the current buffer, unmodified.
    ///
    /// `None` until the task has produced its result.
    fn img(&self) -> Option<Arc<DynamicImage>> {
        self.slot().image()
    }

    /// Returns the valid rectangle, or the full buffer extent if unset.
    ///
    /// An unset region usually means an upstream stage forgot to propagate
    /// it, so the fallback is reported once per task.
    fn valid_area(&self) -> Rect {
        let slot = self.slot();
        let valid = slot.raw_valid();
        if !valid.is_empty() {
            return valid;
        }
        if !slot.warned_unset.swap(true, Ordering::Relaxed) {
            tracing::debug!(task = %self.name(), "valid area not defined, using full extent");
        }
        match slot.image() {
            Some(img) => Rect::full(img.width(), img.height()),
            None => Rect::default(),
        }
    }

    /// Returns the sub-image restricted to the valid rectangle.
    ///
    /// When the rectangle covers the whole buffer (or is unset) the buffer
    /// is returned unchanged without copying.
    fn img_cropped(&self) -> Option<Arc<DynamicImage>> {
        let img = self.img()?;
        match self.extract_original_area(&img) {
            Cow::Borrowed(_) => Some(img),
            Cow::Owned(cropped) => Some(Arc::new(cropped)),
        }
    }

    /// Returns a deep copy of the valid region of `expanded`.
    ///
    /// The region is clamped to the given buffer's bounds first, guarding
    /// against callers pairing it with a mismatched buffer. Returns the
    /// input unchanged (borrowed, no copy) if no region is set or the
    /// region already covers the whole buffer.
    fn extract_original_area<'a>(&self, expanded: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        let valid = self.slot().raw_valid();
        if valid.is_empty() {
            return Cow::Borrowed(expanded);
        }

        let safe = valid.clamp_to(expanded.width(), expanded.height());
        if safe.is_empty() || safe.covers(expanded.width(), expanded.height()) {
            return Cow::Borrowed(expanded);
        }

        Cow::Owned(expanded.crop_imm(safe.x, safe.y, safe.width, safe.height))
    }

    /// Intersects the valid region with `other`.
    ///
    /// Used when two images combine, so the tightest common content
    /// region propagates.
    fn limit_valid_area(&self, other: Rect) {
        self.slot().limit_valid(other);
    }
}
