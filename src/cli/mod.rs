//! Command-line interface for buildkick
//!
//! - `args`: flag definitions (clap)
//! - `run`: entry point, runtime creation and error output

pub mod args;
mod run;

pub use args::Cli;
pub use run::{run, run_with_env};
