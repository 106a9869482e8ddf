//! One trigger run from discovery to the closing summary

use crate::execution::{Executor, PollSettings};
use crate::provider::fetch_all;
use buildkick_client::{CiTransport, RestPaths};
use buildkick_config::RunConfig;
use buildkick_policy::{RunPolicy, evaluate};
use buildkick_report::{
    DebugArtifacts, RUN_SUMMARY_FILE, RunSummary, ServiceMessages, StepCounts, step_table,
    step_type_usage,
};
use buildkick_utils::error::BuildKickError;
use buildkick_utils::types::{BuildConfig, ExecutionRecord, sort_by_id};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires discovery, policy, execution and reporting for one run.
pub struct TriggerRun<'a> {
    config: &'a RunConfig,
    transport: &'a dyn CiTransport,
    messages: &'a ServiceMessages,
    artifacts: &'a DebugArtifacts,
    paths: RestPaths,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TriggerRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRun")
            .field("server", &self.config.server)
            .field("dry_run", &self.config.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'a> TriggerRun<'a> {
    #[must_use]
    pub fn new(
        config: &'a RunConfig,
        transport: &'a dyn CiTransport,
        messages: &'a ServiceMessages,
        artifacts: &'a DebugArtifacts,
    ) -> Self {
        Self {
            config,
            transport,
            messages,
            artifacts,
            paths: RestPaths::new(&config.server),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Policy lists taken from the run configuration.
    #[must_use]
    pub fn policy(&self) -> RunPolicy {
        let c = self.config;
        let policy = RunPolicy::new()
            .exclude_configs(c.excluded_configs.iter().cloned())
            .exclude_step_types(c.excluded_step_types.iter().cloned())
            .disable_step_ids(c.disabled_step_ids.iter().cloned())
            .disable_step_types(c.disabled_step_types.iter().cloned());
        match &c.self_config_id {
            Some(id) if c.exclude_self() => policy.with_self_config(id.clone()),
            _ => policy,
        }
    }

    /// Run to completion.
    ///
    /// The closing summary is printed even when the run fails part way, and
    /// in debug mode it is also written as `run-summary.json`.
    ///
    /// # Errors
    ///
    /// The first fatal error of the run. Configurations after the failing one
    /// are not processed.
    pub async fn execute(&self) -> Result<RunSummary, BuildKickError> {
        let mut summary = RunSummary::start(
            self.config.server.clone(),
            self.config.dry_run,
            self.config.sorted_execution,
        );
        let mut records = Vec::new();

        let result = self.pipeline(&mut summary, &mut records).await;

        let redactor = self.config.redactor();
        summary.finish(
            records,
            result
                .as_ref()
                .err()
                .map(|e| redactor.redact(&e.to_string())),
        );
        for line in summary.closing_lines() {
            self.messages.write_line(&line);
        }

        let written = if self.config.debug {
            self.artifacts.record_json(RUN_SUMMARY_FILE, &summary)
        } else {
            Ok(None)
        };
        match (result, written) {
            (Ok(()), Ok(path)) => {
                if let Some(path) = path {
                    info!("Run summary written to '{path}'");
                }
                Ok(summary)
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), written) => {
                if let Err(artifact_err) = written {
                    warn!("{artifact_err}");
                }
                Err(e)
            }
        }
    }

    async fn pipeline(
        &self,
        summary: &mut RunSummary,
        records: &mut Vec<ExecutionRecord>,
    ) -> Result<(), BuildKickError> {
        if self.config.debug {
            self.print_properties();
        }
        if self.config.verbose {
            self.print_effective_config();
        }

        let mut configs = {
            let _section = self.messages.section("Retrieving build configs and steps");
            fetch_all(self.transport, &self.paths, self.artifacts).await?
        };
        for config in &mut configs {
            config.parameters = self.config.parameters.clone();
        }
        summary.record_discovery(&configs);
        self.messages
            .write_line(&StepCounts::of(&configs).found_line());

        if self.config.sorted_execution {
            sort_by_id(&mut configs);
        }

        let outcome = evaluate(&mut configs, &self.policy());
        summary.record_policy(&configs, &outcome);

        if self.config.verbose {
            self.print_catalog(&configs);
        }
        for line in StepCounts::of(&configs).plan_lines() {
            self.messages.write_line(&line);
        }

        let executor = Executor::new(self.transport, &self.paths, self.artifacts, self.messages)
            .with_poll(PollSettings {
                interval: self.config.poll_interval,
                timeout: self.config.confirm_timeout,
            })
            .with_cancellation(self.cancel.clone())
            .dry_run(self.config.dry_run);

        for config in &configs {
            records.push(ExecutionRecord::pending(config.id.clone(), self.config.dry_run));
            if let Some(record) = records.last_mut() {
                executor.execute(config, record).await?;
            }
        }
        Ok(())
    }

    fn print_properties(&self) {
        let redactor = self.config.redactor();
        let build = self.config.build_properties.iter().flat_map(|p| p.iter());
        let config = self.config.config_properties.iter().flat_map(|p| p.iter());
        let lines = build
            .map(|(k, v)| format!("Build: {k}={}", redactor.redact_property(k, v)))
            .chain(config.map(|(k, v)| format!("Config: {k}={}", redactor.redact_property(k, v))));
        self.messages.section_with_lines("CI properties", lines);
    }

    fn print_effective_config(&self) {
        let lines = self
            .config
            .effective_config()
            .into_iter()
            .map(|(key, (value, source))| format!("{key}={value} ({source})"));
        self.messages.section_with_lines("Run configuration", lines);
    }

    fn print_catalog(&self, configs: &[BuildConfig]) {
        let _section = self.messages.section("Build configs and steps");
        for line in step_table(configs).into_iter().chain(step_type_usage(configs)) {
            self.messages.write_line(&line);
        }
    }
}
