//! Run pipeline for buildkick
//!
//! A run walks four stages in one direction:
//!
//! 1. [`provider`] discovers every build configuration and its steps.
//! 2. The policy engine (`buildkick-policy`) marks exclusions and steps to
//!    switch off.
//! 3. [`execution`] processes configurations one at a time: steps are
//!    switched off inside a [`bracket::StepBracket`], the build is queued and
//!    polled until it leaves the queue, and the steps are switched back on.
//! 4. Reporting (`buildkick-report`) renders counts and the closing summary.
//!
//! [`TriggerRun`] wires the stages together.
//!
//! # Example
//!
//! ```ignore
//! let transport = HttpTransport::new(&config.credentials.username, &config.credentials.password)?;
//! let messages = ServiceMessages::stdout(config.redactor());
//! let artifacts = DebugArtifacts::disabled();
//! let summary = TriggerRun::new(&config, &transport, &messages, &artifacts)
//!     .execute()
//!     .await?;
//! println!("{} builds triggered", summary.triggered());
//! ```

pub mod bracket;
pub mod execution;
pub mod provider;
mod run;

#[cfg(test)]
mod fake;

pub use bracket::StepBracket;
pub use execution::{Executor, PollSettings};
pub use provider::fetch_all;
pub use run::TriggerRun;
