//! Resolved run configuration
//!
//! [`RunConfig::load`] reads the environment, the CI build properties file and
//! the configuration properties file it points at, then applies command-line
//! overrides. Every setting remembers where its value came from.

use buildkick_redaction::{CredentialRedactor, REDACTED};
use buildkick_utils::error::ConfigError;
use buildkick_utils::types::BuildParameters;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::env::{self, EnvSource, vars};
use crate::properties::Properties;
use crate::sources::{
    BuildPropertiesSource, ConfigPropertiesSource, EnvironmentSource, ResolverChain, Setting,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DEBUG_DIR: &str = ".";

/// HTTP basic-auth credentials for the CI server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &REDACTED)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Command-line flags that take precedence over the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub dry_run: Option<bool>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
}

/// Everything a run needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Normalized server base address, no trailing slash
    pub server: String,
    pub credentials: Credentials,
    /// Id of the configuration executing this run, if the agent told us
    pub self_config_id: Option<String>,
    pub dry_run: bool,
    pub sorted_execution: bool,
    pub verbose: bool,
    pub debug: bool,
    pub excluded_configs: Vec<String>,
    pub excluded_step_types: Vec<String>,
    pub disabled_step_ids: Vec<String>,
    pub disabled_step_types: Vec<String>,
    pub parameters: BuildParameters,
    pub debug_dir: Utf8PathBuf,
    pub poll_interval: Duration,
    /// Upper bound on waiting for a queued build to start; `None` waits forever
    pub confirm_timeout: Option<Duration>,
    pub build_properties: Option<Properties>,
    pub config_properties: Option<Properties>,
    /// Which source supplied each resolved setting
    pub source_attribution: BTreeMap<String, String>,
}

impl RunConfig {
    /// Resolve the run configuration.
    ///
    /// Server, username and password are required and checked in that order.
    pub fn load<E: EnvSource + ?Sized>(
        env: &E,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let mut source_attribution = BTreeMap::new();

        let mut flag = |name: &'static str, key: &str, cli: Option<bool>, default: bool| match cli {
            Some(value) => {
                source_attribution.insert(name.to_string(), "cli".to_string());
                value
            }
            None => {
                if env.var(key).is_some() {
                    source_attribution.insert(name.to_string(), "environment".to_string());
                }
                env::read_bool(env, key, default)
            }
        };
        let debug = flag("debug", vars::DEBUG, overrides.debug, false);
        let verbose = flag("verbose", vars::VERBOSE, overrides.verbose, false);
        let dry_run = flag("dry_run", vars::DRY_RUN, overrides.dry_run, false);
        let sorted_execution = flag("sorted_execution", vars::SORTED_EXECUTION, None, true);

        let build = BuildPropertiesSource::from_env(env)?;
        let config = ConfigPropertiesSource::from_build_properties(&build)?;
        let environment = EnvironmentSource::new(env);
        let chain = ResolverChain::new()
            .with_source(&environment)
            .with_source(&build)
            .with_source(&config);

        let server = chain
            .resolve(Setting::ServerUrl)
            .ok_or(ConfigError::MissingServer)?;
        let username = chain
            .resolve(Setting::Username)
            .ok_or(ConfigError::MissingUsername)?;
        let password = chain
            .resolve(Setting::Password)
            .ok_or(ConfigError::MissingPassword)?;
        let self_config_id = chain.resolve(Setting::SelfConfigId);

        for (setting, resolved) in [
            (Setting::ServerUrl, Some(&server)),
            (Setting::Username, Some(&username)),
            (Setting::Password, Some(&password)),
            (Setting::SelfConfigId, self_config_id.as_ref()),
        ] {
            if let Some(resolved) = resolved {
                source_attribution.insert(setting.to_string(), resolved.source.to_string());
            }
        }

        let server = normalize_server(&server.value);
        info!("Server: '{server}'");

        let redactor = CredentialRedactor::new()
            .with_secret(username.value.clone())
            .with_secret(password.value.clone());
        let parameters = env::read_parameters(env, vars::ADDITIONAL_PARAMETERS, &redactor);

        let poll_interval = env::read_seconds(env, vars::POLL_INTERVAL_SECONDS)?
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let confirm_timeout = env::read_seconds(env, vars::CONFIRM_TIMEOUT_SECONDS)?;

        let debug_dir = env
            .var(vars::DEBUG_DIR)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEBUG_DIR.to_string());

        let run_config = Self {
            server,
            credentials: Credentials {
                username: username.value,
                password: password.value,
            },
            self_config_id: self_config_id.map(|r| r.value),
            dry_run,
            sorted_execution,
            verbose,
            debug,
            excluded_configs: env::read_list(env, vars::EXCLUDE_BUILD_CONFIGS),
            excluded_step_types: env::read_list(env, vars::EXCLUDE_BUILD_STEP_TYPES),
            disabled_step_ids: env::read_list(env, vars::DISABLE_BUILD_STEPS),
            disabled_step_types: env::read_list(env, vars::DISABLE_BUILD_STEP_TYPES),
            parameters,
            debug_dir: Utf8PathBuf::from(debug_dir),
            poll_interval,
            confirm_timeout,
            build_properties: build.properties().cloned(),
            config_properties: config.properties().cloned(),
            source_attribution,
        };
        debug!("Resolved run configuration: {run_config:?}");
        Ok(run_config)
    }

    /// Redactor seeded with this run's username and password.
    #[must_use]
    pub fn redactor(&self) -> CredentialRedactor {
        CredentialRedactor::new()
            .with_secret(self.credentials.username.clone())
            .with_secret(self.credentials.password.clone())
    }

    /// The executing configuration never triggers itself.
    #[must_use]
    pub const fn exclude_self(&self) -> bool {
        true
    }

    /// Effective settings as `key -> (value, source)`, with secrets masked.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();
        let source = |key: &str| {
            self.source_attribution
                .get(key)
                .cloned()
                .unwrap_or_else(|| "default".to_string())
        };
        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, source(key)));
        };

        add("server", self.server.clone());
        add("username", REDACTED.to_string());
        add("password", REDACTED.to_string());
        if let Some(id) = &self.self_config_id {
            add("self_config_id", id.clone());
        }
        add("dry_run", self.dry_run.to_string());
        add("sorted_execution", self.sorted_execution.to_string());
        add("verbose", self.verbose.to_string());
        add("debug", self.debug.to_string());
        add("debug_dir", self.debug_dir.to_string());
        add("poll_interval_secs", self.poll_interval.as_secs().to_string());
        add(
            "confirm_timeout_secs",
            self.confirm_timeout
                .map_or_else(|| "none".to_string(), |d| d.as_secs().to_string()),
        );
        config
    }
}

/// Prefix `https://` when no scheme is given and drop trailing slashes.
#[must_use]
pub fn normalize_server(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn base_env() -> MapEnv {
        MapEnv::from([
            (vars::SERVER, "ci.example.com/"),
            (vars::USERNAME, "builder"),
            (vars::PASSWORD, "hunter2"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::load(&base_env(), &CliOverrides::default()).unwrap();
        assert_eq!(config.server, "https://ci.example.com");
        assert!(!config.dry_run);
        assert!(config.sorted_execution);
        assert!(!config.verbose);
        assert!(!config.debug);
        assert!(config.excluded_configs.is_empty());
        assert!(config.parameters.is_empty());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.confirm_timeout, None);
        assert_eq!(config.debug_dir, Utf8PathBuf::from("."));
        assert!(config.self_config_id.is_none());
        assert!(config.exclude_self());
    }

    #[test]
    fn test_missing_settings_checked_in_order() {
        let err = RunConfig::load(&MapEnv::new(), &CliOverrides::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingServer);

        let env = MapEnv::from([(vars::SERVER, "ci")]);
        let err = RunConfig::load(&env, &CliOverrides::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingUsername);

        let env = MapEnv::from([(vars::SERVER, "ci"), (vars::USERNAME, "u")]);
        let err = RunConfig::load(&env, &CliOverrides::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);
    }

    #[test]
    fn test_cli_overrides_environment() {
        let env = base_env().with(vars::DRY_RUN, "false").with(vars::VERBOSE, "true");
        let overrides = CliOverrides {
            dry_run: Some(true),
            verbose: Some(false),
            debug: None,
        };
        let config = RunConfig::load(&env, &overrides).unwrap();
        assert!(config.dry_run);
        assert!(!config.verbose);
        assert_eq!(config.source_attribution.get("dry_run").map(String::as_str), Some("cli"));
    }

    #[test]
    fn test_lists_and_parameters() {
        let env = base_env()
            .with(vars::EXCLUDE_BUILD_CONFIGS, "Root_Deploy, Root_Nightly")
            .with(vars::DISABLE_BUILD_STEP_TYPES, "NuGetPublish")
            .with(vars::ADDITIONAL_PARAMETERS, "env.Channel=beta,oops");
        let config = RunConfig::load(&env, &CliOverrides::default()).unwrap();
        assert_eq!(config.excluded_configs, vec!["Root_Deploy", "Root_Nightly"]);
        assert_eq!(config.disabled_step_types, vec!["NuGetPublish"]);
        assert_eq!(config.parameters.get("env.Channel"), Some("beta"));
        assert_eq!(config.parameters.len(), 1);
    }

    #[test]
    fn test_invalid_timeout_is_error() {
        let env = base_env().with(vars::CONFIRM_TIMEOUT_SECONDS, "ten");
        let err = RunConfig::load(&env, &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == vars::CONFIRM_TIMEOUT_SECONDS));
    }

    #[test]
    fn test_credentials_from_build_properties() {
        let dir = tempfile::tempdir().unwrap();
        let build_path = dir.path().join("build.properties");
        std::fs::write(
            &build_path,
            "teamcity.auth.userId=TeamCityBuildId=99\nteamcity.auth.password=agentpw\nteamcity.buildType.id=Root_RunAll\n",
        )
        .unwrap();
        let env = MapEnv::from([(vars::SERVER, "http://tc:8111")])
            .with(vars::BUILD_PROPERTIES_FILE, build_path.display().to_string());

        let config = RunConfig::load(&env, &CliOverrides::default()).unwrap();
        assert_eq!(config.server, "http://tc:8111");
        assert_eq!(config.credentials.username, "TeamCityBuildId=99");
        assert_eq!(config.self_config_id.as_deref(), Some("Root_RunAll"));
        assert_eq!(
            config.source_attribution.get("password").map(String::as_str),
            Some("build_properties")
        );
    }

    #[test]
    fn test_secrets_never_shown() {
        let config = RunConfig::load(&base_env(), &CliOverrides::default()).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!format!("{config:?}").contains("builder"));
        let effective = config.effective_config();
        assert_eq!(effective["password"].0, REDACTED);
        assert_eq!(effective["username"].0, REDACTED);
        assert_eq!(effective["server"].1, "environment");
        assert_eq!(effective["dry_run"].1, "default");
        assert_eq!(config.redactor().redact("pw=hunter2"), format!("pw={REDACTED}"));
        assert_eq!(config.redactor().redact("user builder"), format!("user {REDACTED}"));
    }

    #[test]
    fn test_normalize_server() {
        assert_eq!(normalize_server("ci"), "https://ci");
        assert_eq!(normalize_server("HTTP://ci:8111/"), "HTTP://ci:8111");
        assert_eq!(normalize_server("https://ci//"), "https://ci");
    }
}
