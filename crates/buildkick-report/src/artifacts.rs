//! Debug artifacts
//!
//! With debug enabled, request bodies and raw responses are snapshotted into
//! the debug directory. Each artifact file is written at most once per run:
//! the first configuration to hit a slot wins, later ones are skipped.

use buildkick_redaction::CredentialRedactor;
use buildkick_utils::atomic_write::write_file_atomic;
use buildkick_utils::error::BuildKickError;
use camino::Utf8PathBuf;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Written in place of a result that was never requested.
pub const DRY_RUN_RESULT: &str = "N/A because of dry run";

/// File name of the end-of-run summary.
pub const RUN_SUMMARY_FILE: &str = "run-summary.json";

/// One kind of server call that can be snapshotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactSlot {
    BuildTypes,
    BuildType,
    StepDisable,
    QueueBuild,
    BuildStatus,
    StepEnable,
}

impl ArtifactSlot {
    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            ArtifactSlot::BuildTypes => "build-types",
            ArtifactSlot::BuildType => "build-type",
            ArtifactSlot::StepDisable => "step-disable",
            ArtifactSlot::QueueBuild => "queue-build",
            ArtifactSlot::BuildStatus => "build-status",
            ArtifactSlot::StepEnable => "step-enable",
        }
    }

    fn request_file(self) -> String {
        match self {
            ArtifactSlot::QueueBuild => format!("{}.xml", self.stem()),
            _ => format!("{}.txt", self.stem()),
        }
    }

    fn result_file(self) -> String {
        match self {
            ArtifactSlot::StepDisable | ArtifactSlot::StepEnable => {
                format!("{}.result.txt", self.stem())
            }
            _ => format!("{}.result.json", self.stem()),
        }
    }

    const fn result_is_json(self) -> bool {
        !matches!(self, ArtifactSlot::StepDisable | ArtifactSlot::StepEnable)
    }
}

/// Write-once artifact store shared by discovery and execution.
pub struct DebugArtifacts {
    dir: Option<Utf8PathBuf>,
    redactor: CredentialRedactor,
    written: Mutex<HashSet<String>>,
}

impl fmt::Debug for DebugArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugArtifacts")
            .field("dir", &self.dir)
            .field("written", &self.written_names().len())
            .finish()
    }
}

impl DebugArtifacts {
    /// A store that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            dir: None,
            redactor: CredentialRedactor::new(),
            written: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>, redactor: CredentialRedactor) -> Self {
        Self {
            dir: Some(dir.into()),
            redactor,
            written: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Snapshot a request body (an address for reads, the payload for writes).
    pub fn record_request(&self, slot: ArtifactSlot, body: &str) -> Result<(), BuildKickError> {
        self.write_once(&slot.request_file(), body).map(|_| ())
    }

    /// Snapshot a response. `None` means the call was not made in this run.
    pub fn record_result(
        &self,
        slot: ArtifactSlot,
        body: Option<&str>,
    ) -> Result<(), BuildKickError> {
        let content = match body {
            None => DRY_RUN_RESULT.to_string(),
            Some(body) if slot.result_is_json() => pretty_json(body),
            Some(body) => body.to_string(),
        };
        self.write_once(&slot.result_file(), &content).map(|_| ())
    }

    /// Write any serializable value as pretty JSON under `file_name`.
    pub fn record_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<Option<Utf8PathBuf>, BuildKickError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let json = serde_json::to_string_pretty(value).map_err(|e| BuildKickError::Artifact {
            path: file_name.to_string(),
            reason: e.to_string(),
        })?;
        self.write_once(file_name, &json)
    }

    /// Names of the artifacts written so far, sorted.
    #[must_use]
    pub fn written_names(&self) -> Vec<String> {
        let written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = written.iter().cloned().collect();
        names.sort();
        names
    }

    fn write_once(
        &self,
        file_name: &str,
        content: &str,
    ) -> Result<Option<Utf8PathBuf>, BuildKickError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };

        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if written.contains(file_name) {
            return Ok(None);
        }

        let path = dir.join(file_name);
        write_file_atomic(&path, &self.redactor.redact(content)).map_err(|e| {
            BuildKickError::Artifact {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })?;
        written.insert(file_name.to_string());
        debug!("Wrote debug artifact: '{path}'");
        Ok(Some(path))
    }
}

/// Re-indent a JSON body; anything else is returned unchanged.
#[must_use]
pub fn pretty_json(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string())
}
