//! CI server REST client for buildkick
//!
//! The [`CiTransport`] trait is the seam between the run pipeline and the
//! network. [`HttpTransport`] implements it with reqwest; tests substitute
//! recording fakes.

pub mod paths;
pub mod queue;
pub mod transport;
pub mod wire;

pub use paths::RestPaths;
pub use queue::{escape_attribute, queue_request_xml};
pub use transport::{CiTransport, HttpTransport};
pub use wire::{BuildId, BuildStatus, BuildTypeDetail, BuildTypeList, StepWire, decode};
