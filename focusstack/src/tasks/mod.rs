//! Concrete pipeline stages: load, merge bookkeeping, save.

pub mod load;
pub mod merge;
pub mod save;

pub use load::LoadImgTask;
pub use merge::ReferenceMergeTask;
pub use save::{SaveImgTask, MEMORY_SENTINEL};
