//! Pipeline execution engine

pub mod cancel;
pub mod engine;
pub mod runner;

pub use cancel::CancelToken;
pub use engine::{EventHandler, ExecutionEvent, PipelineEngine};
pub use runner::StageRunner;
