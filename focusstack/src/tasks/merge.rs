//! Frame combination bookkeeping.
//!
//! [`ReferenceMergeTask`] stands where the depth-merging algorithms plug
//! in: it consumes every input frame, carries the reference frame's buffer
//! forward, and narrows the valid region to the intersection of all
//! inputs' regions so downstream cropping only ever emits pixels that are
//! genuine content in every frame.

use crate::error::StackError;
use crate::log::Logger;
use crate::task::image::{ImageSlot, ImgTask};
use crate::task::{Task, TaskCore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Combines a set of frames by passing the reference frame through,
/// tracking the common valid region of all inputs.
pub struct ReferenceMergeTask {
    core: TaskCore,
    slot: ImageSlot,
    inputs: Mutex<Option<Vec<Arc<dyn ImgTask>>>>,
    reference: usize,
}

impl ReferenceMergeTask {
    /// Creates a merge over `inputs`, carrying frame `reference` forward.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` is empty or `reference` is out of range.
    pub fn new(inputs: Vec<Arc<dyn ImgTask>>, reference: usize) -> Self {
        assert!(reference < inputs.len(), "reference frame out of range");
        let filename = inputs[reference].filename().to_string();
        let depends: Vec<Arc<dyn Task>> =
            inputs.iter().map(|i| i.clone() as Arc<dyn Task>).collect();

        Self {
            core: TaskCore::with_depends(
                format!("merge {} frames", inputs.len()),
                filename,
                depends,
            ),
            slot: ImageSlot::new(),
            inputs: Mutex::new(Some(inputs)),
            reference,
        }
    }
}

impl Task for ReferenceMergeTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn execute(&self, _logger: &Arc<dyn Logger>) -> Result<(), StackError> {
        let inputs = self
            .inputs
            .lock()
            .take()
            .ok_or_else(|| StackError::MissingResult(self.name().to_string()))?;

        let reference = &inputs[self.reference];
        let img = reference
            .img()
            .ok_or_else(|| StackError::MissingResult(reference.name().to_string()))?;
        self.slot.install(img.clone(), reference.valid_area());

        // All frames must share the padded working size; the valid region
        // shrinks to what is genuine content in every one of them.
        for input in &inputs {
            let other = input
                .img()
                .ok_or_else(|| StackError::MissingResult(input.name().to_string()))?;
            if (other.width(), other.height()) != (img.width(), img.height()) {
                return Err(StackError::dimension_mismatch(
                    input.name(),
                    (img.width(), img.height()),
                    (other.width(), other.height()),
                ));
            }
            self.limit_valid_area(input.valid_area());
        }

        Ok(())
    }
}

impl ImgTask for ReferenceMergeTask {
    fn slot(&self) -> &ImageSlot {
        &self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use crate::region::Rect;
    use image::{DynamicImage, Rgb, RgbImage};

    struct StubImgTask {
        core: TaskCore,
        slot: ImageSlot,
    }

    impl StubImgTask {
        fn with_region(name: &str, img: DynamicImage, valid: Rect) -> Arc<Self> {
            let slot = ImageSlot::new();
            slot.install(Arc::new(img), valid);
            Arc::new(Self {
                core: TaskCore::new(name, name),
                slot,
            })
        }
    }

    impl Task for StubImgTask {
        fn core(&self) -> &TaskCore {
            &self.core
        }

        fn execute(&self, _logger: &Arc<dyn Logger>) -> Result<(), StackError> {
            Ok(())
        }
    }

    impl ImgTask for StubImgTask {
        fn slot(&self) -> &ImageSlot {
            &self.slot
        }
    }

    fn logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger)
    }

    fn frame(name: &str, shade: u8, valid: Rect) -> Arc<StubImgTask> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 64, Rgb([shade, 0, 0])));
        StubImgTask::with_region(name, img, valid)
    }

    #[test]
    fn test_reference_frame_passes_through() {
        let a = frame("a", 10, Rect::full(80, 64));
        let b = frame("b", 20, Rect::full(80, 64));
        let reference_img = b.img().unwrap();

        let merge = ReferenceMergeTask::new(vec![a, b], 1);
        merge.run(&logger());

        assert!(!merge.has_failed(), "{:?}", merge.error());
        assert!(Arc::ptr_eq(&merge.img().unwrap(), &reference_img));
    }

    #[test]
    fn test_valid_region_is_intersection_of_inputs() {
        let a = frame("a", 1, Rect::new(0, 2, 80, 60));
        let b = frame("b", 2, Rect::new(4, 0, 76, 64));

        let merge = ReferenceMergeTask::new(vec![a, b], 0);
        merge.run(&logger());

        assert_eq!(merge.valid_area(), Rect::new(4, 2, 76, 60));
    }

    #[test]
    fn test_mismatched_frame_size_fails() {
        let a = frame("a", 1, Rect::full(80, 64));
        let small = StubImgTask::with_region(
            "small",
            DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 32, Rgb([0, 0, 0]))),
            Rect::full(40, 32),
        );

        let merge = ReferenceMergeTask::new(vec![a, small], 0);
        merge.run(&logger());

        assert!(merge.has_failed());
        assert!(merge.error().unwrap().contains("dimension mismatch"));
    }

    #[test]
    fn test_input_references_released_after_run() {
        let a = frame("a", 1, Rect::full(80, 64));
        let merge = ReferenceMergeTask::new(vec![a], 0);
        merge.run(&logger());
        assert!(merge.inputs.lock().is_none());
    }

    #[test]
    fn test_depends_on_all_inputs() {
        let a = frame("a", 1, Rect::full(80, 64));
        let b = frame("b", 2, Rect::full(80, 64));
        let merge = ReferenceMergeTask::new(vec![a.clone(), b], 0);

        assert_eq!(merge.depends_on().len(), 2);
        assert_eq!(merge.name(), "merge 2 frames");
        assert_eq!(merge.filename(), "a");
        assert!(!merge.ready_to_run());
        a.run(&logger());
        assert!(!merge.ready_to_run());
    }
}
