//! Foundation utilities for buildkick
//!
//! Domain types, the error taxonomy, exit codes, tracing setup and atomic
//! file writes shared by every other crate in the workspace.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

pub use error::{
    BuildKickError, ConfigError, ErrorCategory, MalformedResponseError, TransportError,
    TransportErrorKind, UserFriendlyError,
};
pub use exit_codes::ExitCode;
pub use types::{
    BuildConfig, BuildParameters, BuildStep, ExclusionReason, ExclusionRule, ExecutionRecord,
    ExecutionState,
};
