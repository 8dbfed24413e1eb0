//! Metadata synchronization: debounce gates, loop guard, ingestors, the
//! generation pipeline and the controller actor tying them together.

mod controller;
pub mod debounce;
mod error;
mod handle;
pub mod ingest;
mod link_resolver;
mod loop_guard;
mod pipeline;

pub use controller::{
    create_controller, spawn_controller, ControllerSnapshot, InputSource, SyncController,
    SyncSettings,
};
pub use error::{ErrorKind, ErrorReport, SyncError};
pub use handle::SyncHandle;
pub use ingest::IncomingFile;
pub use link_resolver::{LinkResolver, SimulatedLinkResolver};
pub use loop_guard::{LoopGuard, LoopGuardScope};
pub use pipeline::{
    GenerationPipeline, PipelineOutcome, ProgressReporter, DEFAULT_DESCRIPTION, DEFAULT_TAGS,
};
