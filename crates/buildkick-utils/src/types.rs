//! Domain types shared by every stage of a run
//!
//! Configurations and steps are built fresh from server state at the start of
//! a run, mutated only by policy evaluation, and dropped when the run ends.

use serde::Serialize;
use std::fmt;

/// One unit of work inside a build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Identifier, unique within the owning configuration
    pub id: String,
    /// Display name
    pub name: String,
    /// Runner type tag, e.g. `simpleRunner` or `NuGetPublish`
    pub step_type: String,
    /// Disabled on the server before the run started. Read-only for us.
    pub natively_disabled: bool,
    /// Selected by policy to be switched off for the duration of the run.
    pub temporarily_disable: bool,
}

impl BuildStep {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_type: impl Into<String>,
        natively_disabled: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type: step_type.into(),
            natively_disabled,
            temporarily_disable: false,
        }
    }

    /// Enabled on the server.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !self.natively_disabled
    }

    /// Will actually execute when this run triggers its configuration.
    #[must_use]
    pub const fn runs_this_time(&self) -> bool {
        !self.natively_disabled && !self.temporarily_disable
    }
}

/// Which policy rule excluded a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    /// The configuration has an enabled step of an excluded type
    StepType,
    /// The configuration is the one executing this run
    SelfConfig,
    /// The configuration is named in the exclusion list
    Explicit,
}

impl ExclusionRule {
    pub const ALL: [ExclusionRule; 3] = [
        ExclusionRule::StepType,
        ExclusionRule::SelfConfig,
        ExclusionRule::Explicit,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExclusionRule::StepType => "steptype",
            ExclusionRule::SelfConfig => "me",
            ExclusionRule::Explicit => "explicit",
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a configuration will not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionReason {
    pub rule: ExclusionRule,
    /// Extra detail, e.g. the offending `name|type` pairs for [`ExclusionRule::StepType`]
    pub detail: Option<String>,
}

impl ExclusionReason {
    #[must_use]
    pub const fn new(rule: ExclusionRule) -> Self {
        Self { rule, detail: None }
    }

    #[must_use]
    pub fn with_detail(rule: ExclusionRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.rule),
            None => write!(f, "{}", self.rule),
        }
    }
}

/// Ordered `name=value` parameters injected into every queued build.
///
/// Insertion order is kept so the queue request is deterministic. Inserting an
/// existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildParameters(Vec<(String, String)>);

impl BuildParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A server-defined pipeline and everything this run decided about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub id: String,
    pub steps: Vec<BuildStep>,
    pub parameters: BuildParameters,
    /// Set only by policy evaluation. Never queued, never toggled when true.
    pub do_not_run: bool,
    /// First rule that set `do_not_run`
    pub exclusion: Option<ExclusionReason>,
}

impl BuildConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, steps: Vec<BuildStep>) -> Self {
        Self {
            id: id.into(),
            steps,
            parameters: BuildParameters::new(),
            do_not_run: false,
            exclusion: None,
        }
    }

    /// Case-insensitive id comparison.
    #[must_use]
    pub fn id_matches(&self, other: &str) -> bool {
        self.id.eq_ignore_ascii_case(other)
    }

    /// Mark the configuration as excluded.
    ///
    /// Returns `false` when it was already excluded; the first reason is kept.
    pub fn exclude(&mut self, reason: ExclusionReason) -> bool {
        if self.do_not_run {
            return false;
        }
        self.do_not_run = true;
        self.exclusion = Some(reason);
        true
    }

    pub fn enabled_steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(|s| s.is_enabled())
    }

    /// Steps policy selected for temporary disabling.
    pub fn steps_to_disable(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps
            .iter()
            .filter(|s| s.is_enabled() && s.temporarily_disable)
    }
}

/// Sort configurations by case-insensitive id, keeping discovery order for ties.
pub fn sort_by_id(configs: &mut [BuildConfig]) {
    configs.sort_by_cached_key(|c| c.id.to_ascii_lowercase());
}

/// Lifecycle of one configuration inside the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Triggering,
    Skipped,
    Completed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Triggering => "triggering",
            ExecutionState::Skipped => "skipped",
            ExecutionState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// What happened to one configuration during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub config_id: String,
    pub state: ExecutionState,
    /// Id of the queued build; absent when skipped or in a dry run
    pub build_id: Option<String>,
    /// Steps switched off around the queue call (or that would have been)
    pub toggled_steps: Vec<String>,
    pub dry_run: bool,
}

impl ExecutionRecord {
    #[must_use]
    pub fn pending(config_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            config_id: config_id.into(),
            state: ExecutionState::Pending,
            build_id: None,
            toggled_steps: Vec::new(),
            dry_run,
        }
    }

    /// Actually queued on the server.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.state == ExecutionState::Completed && self.build_id.is_some()
    }
}
