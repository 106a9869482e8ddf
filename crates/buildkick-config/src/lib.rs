//! Run configuration for buildkick
//!
//! Settings come from the process environment first, then from the CI agent's
//! build and configuration properties files. Command-line flags override the
//! boolean switches.

pub mod env;
pub mod properties;
mod run_config;
pub mod sources;

pub use env::{EnvSource, MapEnv, ProcessEnv, vars};
pub use properties::{Properties, load_properties, parse_properties};
pub use run_config::{
    CliOverrides, Credentials, DEFAULT_DEBUG_DIR, DEFAULT_POLL_INTERVAL, RunConfig,
    normalize_server,
};
pub use sources::{
    BuildPropertiesSource, ConfigPropertiesSource, EnvironmentSource, Resolved, ResolverChain,
    Setting, SettingSource,
};
