//! Per-configuration execution
//!
//! Each configuration moves `Pending -> Skipped` when policy excluded it, or
//! `Pending -> Triggering -> Completed` otherwise. Triggering runs four
//! phases: disable steps, queue the build, confirm it left the queue, enable
//! steps. Excluded configurations and dry runs walk the same phases with a
//! `[skip]` or `[dry-run]` marker and make no network call.

use crate::bracket::StepBracket;
use buildkick_client::{BuildStatus, CiTransport, RestPaths, decode, queue_request_xml};
use buildkick_report::{ArtifactSlot, DebugArtifacts, ServiceMessages};
use buildkick_utils::error::BuildKickError;
use buildkick_utils::types::{BuildConfig, ExecutionRecord, ExecutionState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const SKIP_MARKER: &str = "[skip]";
const DRY_RUN_MARKER: &str = "[dry-run]";

/// How queued builds are confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause before every status request
    pub interval: Duration,
    /// Give up after this long; `None` waits until the build starts
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Runs configurations one at a time against one server.
pub struct Executor<'a> {
    transport: &'a dyn CiTransport,
    paths: &'a RestPaths,
    artifacts: &'a DebugArtifacts,
    messages: &'a ServiceMessages,
    cancel: CancellationToken,
    poll: PollSettings,
    dry_run: bool,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("paths", &self.paths)
            .field("poll", &self.poll)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'a> Executor<'a> {
    #[must_use]
    pub fn new(
        transport: &'a dyn CiTransport,
        paths: &'a RestPaths,
        artifacts: &'a DebugArtifacts,
        messages: &'a ServiceMessages,
    ) -> Self {
        Self {
            transport,
            paths,
            artifacts,
            messages,
            cancel: CancellationToken::new(),
            poll: PollSettings::default(),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process one configuration inside its own console section.
    ///
    /// `record` is updated as the configuration moves through its states, so
    /// the caller keeps an accurate record even when this returns an error.
    ///
    /// # Errors
    ///
    /// Any transport, decode or artifact failure, a confirmation timeout,
    /// cancellation, or steps that could not be switched back on.
    pub async fn execute(
        &self,
        config: &BuildConfig,
        record: &mut ExecutionRecord,
    ) -> Result<(), BuildKickError> {
        let _section = self.messages.section(format!("Queuing: {}", config.id));

        if self.cancel.is_cancelled() {
            return Err(BuildKickError::Cancelled {
                phase: format!("queuing {}", config.id),
            });
        }

        if config.do_not_run {
            self.rehearse(config, SKIP_MARKER)?;
            record.state = ExecutionState::Skipped;
            return Ok(());
        }

        record.state = ExecutionState::Triggering;
        if self.dry_run {
            record.toggled_steps = config.steps_to_disable().map(|s| s.id.clone()).collect();
            self.rehearse(config, DRY_RUN_MARKER)?;
        } else {
            self.trigger(config, record).await?;
        }
        record.state = ExecutionState::Completed;
        Ok(())
    }

    /// Log every phase with `marker` and snapshot the requests that would
    /// have been sent.
    fn rehearse(&self, config: &BuildConfig, marker: &str) -> Result<(), BuildKickError> {
        let write = |line: String| self.messages.write_line(&format!("{marker} {line}"));

        for step in config.steps_to_disable() {
            write(format!("Disabling: {}.{}: '{}'", config.id, step.id, step.name));
            self.artifacts.record_request(ArtifactSlot::StepDisable, "true")?;
            self.artifacts.record_result(ArtifactSlot::StepDisable, None)?;
        }

        write(format!("Triggering build: {}", config.id));
        let xml = queue_request_xml(&config.id, &config.parameters);
        self.artifacts.record_request(ArtifactSlot::QueueBuild, &xml)?;
        self.artifacts.record_result(ArtifactSlot::QueueBuild, None)?;

        write(format!("Confirming build: {}", config.id));
        self.artifacts.record_result(ArtifactSlot::BuildStatus, None)?;

        for step in config.steps_to_disable() {
            write(format!("Enabling: {}.{}: '{}'", config.id, step.id, step.name));
            self.artifacts.record_request(ArtifactSlot::StepEnable, "false")?;
            self.artifacts.record_result(ArtifactSlot::StepEnable, None)?;
        }
        Ok(())
    }

    async fn trigger(
        &self,
        config: &BuildConfig,
        record: &mut ExecutionRecord,
    ) -> Result<(), BuildKickError> {
        let mut bracket = StepBracket::new(
            self.transport,
            self.paths,
            self.artifacts,
            self.messages,
            config.id.clone(),
        );
        bracket.engage(config.steps_to_disable()).await?;
        record.toggled_steps = bracket.step_ids();

        let outcome = self.queue_and_confirm(config, record).await;
        let restored = bracket.release().await;

        match (outcome, restored) {
            (Ok(()), restored) => restored,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(restore_err)) => {
                error!("Build of {} failed: {err}", config.id);
                Err(restore_err)
            }
        }
    }

    async fn queue_and_confirm(
        &self,
        config: &BuildConfig,
        record: &mut ExecutionRecord,
    ) -> Result<(), BuildKickError> {
        self.messages
            .write_line(&format!("Triggering build: {}", config.id));
        let address = self.paths.build_queue();
        let xml = queue_request_xml(&config.id, &config.parameters);
        debug!("Address: '{address}'");
        self.artifacts.record_request(ArtifactSlot::QueueBuild, &xml)?;
        let body = self.transport.post_xml(&address, &xml).await?;
        self.artifacts
            .record_result(ArtifactSlot::QueueBuild, Some(&body))?;
        let queued: BuildStatus = decode(&address, &body)?;

        let build_id = queued.id.to_string();
        record.build_id = Some(build_id.clone());

        self.messages
            .write_line(&format!("Confirming build: {}", config.id));
        let confirm = self.confirm(&build_id);
        let confirm = async {
            match self.poll.timeout {
                Some(limit) => tokio::time::timeout(limit, confirm).await.map_err(|_| {
                    BuildKickError::ConfirmationTimeout {
                        build_id: build_id.clone(),
                        waited: limit,
                    }
                })?,
                None => confirm.await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(BuildKickError::Cancelled {
                phase: format!("waiting for build {build_id}"),
            }),
            result = confirm => result,
        }
    }

    /// Poll until the build no longer reports a wait reason.
    async fn confirm(&self, build_id: &str) -> Result<(), BuildKickError> {
        let address = self.paths.build(build_id);
        loop {
            tokio::time::sleep(self.poll.interval).await;
            self.artifacts
                .record_request(ArtifactSlot::BuildStatus, &address)?;
            let body = self.transport.get_json(&address).await?;
            self.artifacts
                .record_result(ArtifactSlot::BuildStatus, Some(&body))?;
            let status: BuildStatus = decode(&address, &body)?;

            match status.wait_reason {
                None => {
                    self.messages.write_line(&format!("Build {build_id} queued."));
                    return Ok(());
                }
                Some(reason) => self
                    .messages
                    .write_line(&format!("Build {build_id} not queued yet: {reason}")),
            }
        }
    }
}
