mod job;
mod state;

pub use job::{PatchJob, parse_patch_jobs};
pub use state::{Phase, PhaseMachine, Transition};
