//! Focus-stacking pipeline core.
//!
//! Provides the orchestration layer of a focus-stacking tool: a
//! dependency-ordered [`Task`] abstraction with a thread-pool scheduler
//! ([`worker::Worker`]), image-carrying tasks that track which part of a
//! padded buffer is genuine content ([`task::image::ImgTask`]), and the
//! load/merge/save stages wired together by [`pipeline::run_stack`].
//!
//! The depth-map merging algorithms themselves are behind the
//! [`tasks::merge`] seam; this crate guarantees their inputs arrive
//! decoded, padded to wavelet-compatible sizes, and correctly annotated
//! with valid regions, and that their output is cropped and encoded.

pub mod codec;
pub mod error;
pub mod log;
pub mod logging;
pub mod pad;
pub mod pipeline;
pub mod region;
pub mod task;
pub mod tasks;
pub mod wavelet;
pub mod worker;

pub use error::StackError;
pub use log::{LogLevel, Logger, NoOpLogger, TracingLogger};
pub use pipeline::{run_stack, StackOptions, StackReport};
pub use region::Rect;
pub use task::image::ImgTask;
pub use task::{Task, TaskCore, TaskState};
pub use worker::{ErrorPolicy, Worker, WorkerConfig, WorkerStatus};
