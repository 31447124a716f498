pub mod qualify;
pub mod scanner;

pub use qualify::{run, Collaborators, PipelineOutcome, RunSummary};
