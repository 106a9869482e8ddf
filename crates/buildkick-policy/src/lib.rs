//! Run policy evaluation for buildkick
//!
//! Decides, without touching the network, which discovered configurations
//! are skipped and which of their steps are switched off for the run.

mod evaluate;
mod policy;
mod types;

pub use evaluate::evaluate;
pub use policy::RunPolicy;
pub use types::{Exclusion, PolicyOutcome, PolicyWarning};
