//! Run policy: which configurations to skip and which steps to switch off

use serde::Serialize;

/// Lists that drive policy evaluation.
///
/// Configuration ids compare case-insensitively. Step ids and step types
/// compare exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunPolicy {
    /// Configurations never to trigger
    pub excluded_configs: Vec<String>,
    /// A configuration with an enabled step of one of these types is skipped
    pub excluded_step_types: Vec<String>,
    /// Steps to switch off for the duration of the run
    pub disabled_step_ids: Vec<String>,
    pub disabled_step_types: Vec<String>,
    /// The configuration executing this run
    pub self_config_id: Option<String>,
}

impl RunPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exclude_configs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_configs.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn exclude_step_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_step_types
            .extend(types.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn disable_step_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_step_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn disable_step_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_step_types
            .extend(types.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_self_config(mut self, id: impl Into<String>) -> Self {
        self.self_config_id = Some(id.into());
        self
    }
}
