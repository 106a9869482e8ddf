//! Environment variable access and value parsing
//!
//! Reads go through [`EnvSource`] so that configuration loading can be tested
//! against an in-memory map without touching the process environment.

use buildkick_redaction::CredentialRedactor;
use buildkick_utils::error::ConfigError;
use buildkick_utils::types::BuildParameters;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable names understood by buildkick.
pub mod vars {
    pub const SERVER: &str = "BuildServer";
    pub const USERNAME: &str = "BuildUsername";
    pub const PASSWORD: &str = "BuildPassword";
    pub const BUILD_PROPERTIES_FILE: &str = "TEAMCITY_BUILD_PROPERTIES_FILE";

    pub const ADDITIONAL_PARAMETERS: &str = "BuildAdditionalParameters";
    pub const DISABLE_BUILD_STEPS: &str = "BuildDisableBuildSteps";
    pub const DISABLE_BUILD_STEP_TYPES: &str = "BuildDisableBuildStepTypes";
    pub const DRY_RUN: &str = "BuildDryRun";
    pub const EXCLUDE_BUILD_CONFIGS: &str = "BuildExcludeBuildConfigs";
    pub const EXCLUDE_BUILD_STEP_TYPES: &str = "BuildExcludeBuildStepTypes";
    pub const SORTED_EXECUTION: &str = "BuildSortedExecution";
    pub const DEBUG: &str = "BuildDebug";
    pub const VERBOSE: &str = "BuildVerbose";
    pub const DEBUG_DIR: &str = "BuildDebugDir";
    pub const POLL_INTERVAL_SECONDS: &str = "BuildPollIntervalSeconds";
    pub const CONFIRM_TIMEOUT_SECONDS: &str = "BuildConfirmTimeoutSeconds";

    /// Every optional run setting, in the order shown in usage text.
    pub const OPTIONAL: &[&str] = &[
        ADDITIONAL_PARAMETERS,
        DISABLE_BUILD_STEPS,
        DISABLE_BUILD_STEP_TYPES,
        DRY_RUN,
        EXCLUDE_BUILD_CONFIGS,
        EXCLUDE_BUILD_STEP_TYPES,
        SORTED_EXECUTION,
        DEBUG,
        VERBOSE,
        DEBUG_DIR,
        POLL_INTERVAL_SECONDS,
        CONFIRM_TIMEOUT_SECONDS,
    ];
}

/// Source of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnv {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(MapEnv::new(), |env, (k, v)| env.with(k, v))
    }
}

/// Read a boolean, falling back to `default` when unset or malformed.
pub fn read_bool<E: EnvSource + ?Sized>(env: &E, name: &str, default: bool) -> bool {
    match env.var(name) {
        None => {
            debug!("Environment variable not specified: '{name}', using: '{default}'");
            default
        }
        Some(raw) => match parse_bool(&raw) {
            Some(value) => {
                debug!("Got environment variable: '{name}', value: '{value}'");
                value
            }
            None => {
                warn!("Got malformed environment variable: '{name}', using: '{default}'");
                default
            }
        },
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Read a comma-separated list. Blank entries are dropped.
pub fn read_list<E: EnvSource + ?Sized>(env: &E, name: &str) -> Vec<String> {
    match env.var(name) {
        None => {
            debug!("Environment variable not specified: '{name}', using: <none>");
            Vec::new()
        }
        Some(raw) => {
            let values = split_list(&raw);
            debug!(
                "Got environment variable: '{name}', values: '{}'",
                values.join("', '")
            );
            values
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read comma-separated `name=value` pairs.
///
/// Entries without `=` are ignored with a warning. The value is everything
/// after the first `=`.
pub fn read_parameters<E: EnvSource + ?Sized>(
    env: &E,
    name: &str,
    redactor: &CredentialRedactor,
) -> BuildParameters {
    let Some(raw) = env.var(name) else {
        debug!("Environment variable not specified: '{name}', using: <none>");
        return BuildParameters::new();
    };

    let mut params = BuildParameters::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                params.insert(key.trim(), value);
            }
            _ => warn!(
                "Ignoring malformed environment variable ({name}): '{}'",
                redactor.redact(entry)
            ),
        }
    }

    let shown: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}='{}'", redactor.redact_property(k, v)))
        .collect();
    debug!("Got environment variable: '{name}', value: '{}'", shown.join(", "));
    params
}

/// Read a whole number of seconds.
///
/// Unset or blank yields `Ok(None)`; anything that is not a non-negative
/// integer is a configuration error.
pub fn read_seconds<E: EnvSource + ?Sized>(
    env: &E,
    name: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = env.var(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::InvalidValue {
            key: name.to_string(),
            value: raw.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bool_default_and_parse() {
        let env = MapEnv::from([("A", "TRUE"), ("B", "false"), ("C", "yes")]);
        assert!(read_bool(&env, "A", false));
        assert!(!read_bool(&env, "B", true));
        // malformed falls back to default
        assert!(read_bool(&env, "C", true));
        assert!(!read_bool(&env, "C", false));
        assert!(read_bool(&env, "MISSING", true));
    }

    #[test]
    fn test_read_list_trims_and_drops_blanks() {
        let env = MapEnv::from([("L", " A, B ,,C ")]);
        assert_eq!(read_list(&env, "L"), vec!["A", "B", "C"]);
        assert!(read_list(&env, "MISSING").is_empty());
    }

    #[test]
    fn test_read_parameters_ignores_malformed_entries() {
        let env = MapEnv::from([("P", "env.Mode=nightly,broken,url=a=b")]);
        let params = read_parameters(&env, "P", &CredentialRedactor::new());
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("env.Mode", "nightly"), ("url", "a=b")]);
    }

    #[test]
    fn test_read_parameters_empty_when_unset() {
        let params = read_parameters(&MapEnv::new(), "P", &CredentialRedactor::new());
        assert!(params.is_empty());
    }

    #[test]
    fn test_read_seconds() {
        let env = MapEnv::from([("T", "30"), ("BAD", "soon"), ("BLANK", " ")]);
        assert_eq!(read_seconds(&env, "T").unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(read_seconds(&env, "BLANK").unwrap(), None);
        assert_eq!(read_seconds(&env, "MISSING").unwrap(), None);
        assert!(matches!(
            read_seconds(&env, "BAD"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
