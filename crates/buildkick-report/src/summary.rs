//! Run counts and the end-of-run summary

use buildkick_policy::PolicyOutcome;
use buildkick_utils::types::{BuildConfig, ExclusionRule, ExecutionRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Configuration and step counts at one point of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub configs: usize,
    /// Configurations that will be triggered
    pub runnable: usize,
    pub steps_total: usize,
    /// Steps that will execute: enabled on the server and not switched off
    pub steps_enabled: usize,
    pub steps_disabled: usize,
}

impl StepCounts {
    #[must_use]
    pub fn of(configs: &[BuildConfig]) -> Self {
        let steps = || configs.iter().flat_map(|c| c.steps.iter());
        Self {
            configs: configs.len(),
            runnable: configs.iter().filter(|c| !c.do_not_run).count(),
            steps_total: steps().count(),
            steps_enabled: steps().filter(|s| s.runs_this_time()).count(),
            steps_disabled: steps().filter(|s| s.temporarily_disable).count(),
        }
    }

    /// Logged right after discovery.
    #[must_use]
    pub fn found_line(&self) -> String {
        format!(
            "Found {} build configs, with {}/{} enabled build steps.",
            self.configs, self.steps_enabled, self.steps_total
        )
    }

    /// Logged after policy evaluation, before execution.
    #[must_use]
    pub fn plan_lines(&self) -> [String; 3] {
        [
            format!("Excluding {} build configs.", self.configs - self.runnable),
            format!("Disabling {} additional build steps.", self.steps_disabled),
            format!(
                "Triggering {}/{} build configs, with {}/{} enabled build steps...",
                self.runnable, self.configs, self.steps_enabled, self.steps_total
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionEntry {
    pub config_id: String,
    pub rule: ExclusionRule,
    pub reason: String,
}

/// Everything worth keeping about one run, written as `run-summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub server: String,
    pub dry_run: bool,
    pub sorted_execution: bool,
    pub discovered: StepCounts,
    pub planned: StepCounts,
    pub excluded_by_rule: BTreeMap<ExclusionRule, usize>,
    pub exclusions: Vec<ExclusionEntry>,
    pub warnings: Vec<String>,
    pub records: Vec<ExecutionRecord>,
    pub error: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn start(server: impl Into<String>, dry_run: bool, sorted_execution: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            server: server.into(),
            dry_run,
            sorted_execution,
            discovered: StepCounts::default(),
            planned: StepCounts::default(),
            excluded_by_rule: ExclusionRule::ALL.iter().map(|r| (*r, 0)).collect(),
            exclusions: Vec::new(),
            warnings: Vec::new(),
            records: Vec::new(),
            error: None,
        }
    }

    pub fn record_discovery(&mut self, configs: &[BuildConfig]) {
        self.discovered = StepCounts::of(configs);
    }

    pub fn record_policy(&mut self, configs: &[BuildConfig], outcome: &PolicyOutcome) {
        self.planned = StepCounts::of(configs);
        self.excluded_by_rule = outcome.exclusions_by_rule();
        self.exclusions = outcome
            .exclusions
            .iter()
            .map(|e| ExclusionEntry {
                config_id: e.config_id.clone(),
                rule: e.reason.rule,
                reason: e.reason.to_string(),
            })
            .collect();
        self.warnings = outcome.warnings.iter().map(ToString::to_string).collect();
    }

    pub fn finish(&mut self, records: Vec<ExecutionRecord>, error: Option<String>) {
        self.records = records;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    /// Builds actually queued on the server.
    #[must_use]
    pub fn triggered(&self) -> usize {
        self.records.iter().filter(|r| r.triggered()).count()
    }

    /// Closing lines for the console.
    #[must_use]
    pub fn closing_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let rules: Vec<String> = self
            .excluded_by_rule
            .iter()
            .map(|(rule, n)| format!("{rule}: {n}"))
            .collect();
        lines.push(format!(
            "Excluded {} build configs ({}).",
            self.exclusions.len(),
            rules.join(", ")
        ));
        if self.dry_run {
            lines.push(format!(
                "Dry run: {}/{} build configs would have been triggered.",
                self.planned.runnable, self.planned.configs
            ));
        } else {
            lines.push(format!(
                "Triggered {}/{} build configs.",
                self.triggered(),
                self.planned.configs
            ));
        }
        if let Some(error) = &self.error {
            lines.push(format!("Run failed: {error}"));
        }
        lines
    }
}
