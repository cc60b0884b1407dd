//! Wires the stage tasks into a runnable stacking job.
//!
//! [`run_stack`] is the seam the CLI and integration tests drive: it
//! builds one loader per input frame, a merge over all of them, and a
//! final save, submits everything to a [`Worker`], and blocks until the
//! job settles. The merge slot is where the depth-map algorithms plug in;
//! this orchestration layer only guarantees ordering, padding bookkeeping
//! and output handling around them.

use crate::error::StackError;
use crate::log::Logger;
use crate::task::image::ImgTask;
use crate::task::Task;
use crate::tasks::load::LoadImgTask;
use crate::tasks::merge::ReferenceMergeTask;
use crate::tasks::save::SaveImgTask;
use crate::worker::{ErrorPolicy, Worker, WorkerConfig};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a stacking job needs to know.
#[derive(Debug, Clone)]
pub struct StackOptions {
    /// Input frames, in stacking order.
    pub inputs: Vec<PathBuf>,
    /// Output file; [`crate::tasks::save::MEMORY_SENTINEL`] keeps the
    /// result in memory only.
    pub output: String,
    /// JPEG quality, 0-100.
    pub jpgquality: u8,
    /// Keep the full frame instead of cropping to the common content area.
    pub nocrop: bool,
    /// How long loaders tolerate input files that do not exist yet.
    pub wait_images: Duration,
    /// Pool threads; zero picks the machine's parallelism.
    pub threads: usize,
    /// Cap on concurrent tasks using the GPU-accelerated path.
    pub opencl_cap: usize,
    /// Failed-dependency handling.
    pub error_policy: ErrorPolicy,
}

impl Default for StackOptions {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            inputs: Vec::new(),
            output: "output.jpg".to_string(),
            jpgquality: 95,
            nocrop: false,
            wait_images: Duration::ZERO,
            threads: 0,
            opencl_cap: worker.opencl_cap,
            error_policy: worker.error_policy,
        }
    }
}

/// Outcome of a completed stacking job.
#[derive(Clone, Debug)]
pub struct StackReport {
    /// Where the result was written, or the in-memory sentinel.
    pub output: String,
    /// The composited result image.
    pub image: Option<Arc<DynamicImage>>,
    /// Number of tasks the job ran.
    pub tasks: usize,
}

/// Runs a full stacking job to completion.
///
/// Builds load, merge and save tasks for `options`, submits them in
/// dependency order with 1-based progress indices, and blocks until all
/// of them settle. The first task failure becomes the job's error.
pub fn run_stack(
    options: &StackOptions,
    logger: &Arc<dyn Logger>,
) -> Result<StackReport, StackError> {
    if options.inputs.is_empty() {
        return Err(StackError::NoInputs);
    }

    let loads: Vec<Arc<LoadImgTask>> = options
        .inputs
        .iter()
        .map(|path| Arc::new(LoadImgTask::new(path, options.wait_images)))
        .collect();
    let frames: Vec<Arc<dyn ImgTask>> = loads
        .iter()
        .map(|l| l.clone() as Arc<dyn ImgTask>)
        .collect();

    // The middle frame is the reference, matching how focus stacks are
    // usually shot (sweep through the subject).
    let merge = Arc::new(ReferenceMergeTask::new(frames, loads.len() / 2));
    let save = Arc::new(SaveImgTask::new(
        options.output.clone(),
        merge.clone() as Arc<dyn ImgTask>,
        None,
        options.jpgquality,
        options.nocrop,
    ));

    let mut tasks: Vec<Arc<dyn Task>> = Vec::with_capacity(loads.len() + 2);
    tasks.extend(loads.iter().map(|l| l.clone() as Arc<dyn Task>));
    tasks.push(merge.clone());
    tasks.push(save.clone());

    logger.info(format_args!(
        "stacking {} images into {}",
        options.inputs.len(),
        options.output
    ));

    let worker = Worker::new(
        WorkerConfig {
            threads: if options.threads > 0 {
                options.threads
            } else {
                WorkerConfig::default().threads
            },
            opencl_cap: options.opencl_cap,
            error_policy: options.error_policy,
        },
        logger.clone(),
    );

    let total = tasks.len();
    for (i, task) in tasks.into_iter().enumerate() {
        task.set_index(i + 1);
        worker.add(task);
    }
    worker.wait_all(None);

    if let Some(error) = worker.error() {
        return Err(StackError::TaskFailed(error));
    }

    logger.info(format_args!("{} finished", save.name()));
    Ok(StackReport {
        output: options.output.clone(),
        image: save.img(),
        tasks: total,
    })
}
