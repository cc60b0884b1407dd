//! Image loading stage.
//!
//! [`LoadImgTask`] decodes one input frame and prepares it for the wavelet
//! pipeline: it records the original dimensions, keeps an unpadded copy of
//! the pristine image, and enlarges the working buffer with reflected
//! borders when the decomposition needs a bigger size — shifting the valid
//! region so it keeps denoting exactly the original content.
//!
//! A wait window supports pipelines that consume images as an external
//! producer (camera, microscope stage) writes them: while the window is
//! open the task tolerates the file not existing yet, and its readiness
//! check holds the task back so pool threads run other work instead of
//! burning on a pure existence check.

use crate::codec::{FileCodec, ImageCodec};
use crate::error::StackError;
use crate::log::Logger;
use crate::pad;
use crate::region::Rect;
use crate::task::image::{ImageSlot, ImgTask};
use crate::task::{Task, TaskCore};
use crate::wavelet;
use image::DynamicImage;
use parking_lot::Mutex;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a loader retries a file that has not appeared yet.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Loads one input image, padding it for the wavelet decomposition.
pub struct LoadImgTask {
    core: TaskCore,
    slot: ImageSlot,
    codec: Arc<dyn ImageCodec>,
    path: PathBuf,
    wait_window: Duration,
    deadline: Instant,
    preloaded: Mutex<Option<DynamicImage>>,
    original: Mutex<Option<Arc<DynamicImage>>>,
    orig_size: Mutex<Option<(u32, u32)>>,
    levels: AtomicU32,
}

impl LoadImgTask {
    /// Creates a loader for a file, using the default file codec.
    ///
    /// # Arguments
    ///
    /// * `path` - Image file to decode
    /// * `wait_window` - How long to tolerate the file not existing yet;
    ///   zero means the file must be decodable immediately
    pub fn new(path: impl Into<PathBuf>, wait_window: Duration) -> Self {
        Self::with_codec(path, wait_window, Arc::new(FileCodec))
    }

    /// Creates a loader with an injected codec.
    pub fn with_codec(
        path: impl Into<PathBuf>,
        wait_window: Duration,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        let path = path.into();
        let display = path.display().to_string();
        Self {
            core: TaskCore::new(format!("load {display}"), display),
            slot: ImageSlot::new(),
            codec,
            path,
            wait_window,
            deadline: Instant::now() + wait_window,
            preloaded: Mutex::new(None),
            original: Mutex::new(None),
            orig_size: Mutex::new(None),
            levels: AtomicU32::new(0),
        }
    }

    /// Creates a loader from an already-decoded in-memory buffer.
    ///
    /// No file I/O happens; the wait window is forced to zero.
    pub fn from_memory(name: impl Into<String>, img: DynamicImage) -> Self {
        let name = name.into();
        Self {
            core: TaskCore::new(format!("memory image {name}"), name.clone()),
            slot: ImageSlot::new(),
            codec: Arc::new(FileCodec),
            path: PathBuf::from(name),
            wait_window: Duration::ZERO,
            deadline: Instant::now(),
            preloaded: Mutex::new(Some(img)),
            original: Mutex::new(None),
            orig_size: Mutex::new(None),
            levels: AtomicU32::new(0),
        }
    }

    /// Dimensions of the decoded image before padding.
    pub fn original_size(&self) -> Option<(u32, u32)> {
        *self.orig_size.lock()
    }

    /// The pristine decoded image, before any padding.
    ///
    /// Retained for consumers that need the unmodified original.
    pub fn original_img(&self) -> Option<Arc<DynamicImage>> {
        self.original.lock().clone()
    }

    /// Wavelet decomposition depth chosen for this image.
    pub fn levels(&self) -> u32 {
        self.levels.load(Ordering::Relaxed)
    }

    fn wait_window_open(&self) -> bool {
        !self.wait_window.is_zero() && Instant::now() < self.deadline
    }

    fn try_decode(&self) -> Option<DynamicImage> {
        self.codec.decode(&self.path).ok()
    }
}

impl Task for LoadImgTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    /// In addition to the base dependency check, while the wait window is
    /// open the target file must already exist and be readable. This lets
    /// the scheduler skip this task and run other ready work instead.
    fn ready_to_run(&self) -> bool {
        if !self.core().depends_ready() {
            return false;
        }
        if self.wait_window_open() && File::open(&self.path).is_err() {
            return false;
        }
        true
    }

    fn execute(&self, logger: &Arc<dyn Logger>) -> Result<(), StackError> {
        let mut img = self.preloaded.lock().take();
        if img.is_none() {
            img = self.try_decode();
        }

        // The producer may still be writing the file; retry on a fixed
        // interval until the wait window closes.
        while img.is_none() && Instant::now() < self.deadline {
            thread::sleep(RETRY_INTERVAL);
            img = self.try_decode();
        }

        let img = img.ok_or_else(|| StackError::LoadFailed(self.filename().to_string()))?;

        let (width, height) = (img.width(), img.height());
        *self.orig_size.lock() = Some((width, height));
        let original = Arc::new(img);
        *self.original.lock() = Some(original.clone());

        let (levels, (ew, eh)) = wavelet::levels_for_size(width, height);
        self.levels.store(levels, Ordering::Relaxed);
        logger.verbose(format_args!(
            "{} has resolution {}x{}, using {} wavelet levels and expanding to {}x{}",
            self.basename(),
            width,
            height,
            levels,
            ew,
            eh
        ));

        if (ew, eh) != (width, height) {
            let padded = pad::reflect_expand(&original, ew, eh);
            let valid = Rect::new((ew - width) / 2, (eh - height) / 2, width, height);
            self.slot.install(Arc::new(padded), valid);
        } else {
            self.slot.install(original, Rect::full(width, height));
        }

        Ok(())
    }
}

impl ImgTask for LoadImgTask {
    fn slot(&self) -> &ImageSlot {
        &self.slot
    }
}
