//! Console and file reporting for buildkick runs
//!
//! Counts, step listings and the end-of-run summary are produced as plain
//! lines for the caller to log. Service-message sections and debug artifacts
//! write directly to the console and the debug directory.

pub mod artifacts;
pub mod service_messages;
pub mod summary;
pub mod table;

pub use artifacts::{ArtifactSlot, DRY_RUN_RESULT, DebugArtifacts, RUN_SUMMARY_FILE, pretty_json};
pub use service_messages::{CapturedOutput, Section, ServiceMessages, escape_value};
pub use summary::{ExclusionEntry, RunSummary, StepCounts};
pub use table::{step_table, step_type_usage};
