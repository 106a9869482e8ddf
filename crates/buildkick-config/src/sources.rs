//! Resolution of server address, credentials and self id
//!
//! Each place a setting can come from is a [`SettingSource`]. A
//! [`ResolverChain`] asks its sources in order and the first non-blank answer
//! wins, recording which source produced it.

use crate::env::{EnvSource, vars};
use crate::properties::{Properties, load_properties};
use buildkick_utils::error::ConfigError;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Build property naming the configuration properties file.
pub const CONFIG_PROPERTIES_FILE_KEY: &str = "teamcity.configuration.properties.file";

/// A value that can be resolved through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    ServerUrl,
    Username,
    Password,
    SelfConfigId,
}

impl Setting {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Setting::ServerUrl => "server",
            Setting::Username => "username",
            Setting::Password => "password",
            Setting::SelfConfigId => "self_config_id",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait SettingSource {
    /// Stable label used for source attribution.
    fn name(&self) -> &'static str;

    fn lookup(&self, setting: Setting) -> Option<String>;
}

/// `BuildServer`, `BuildUsername` and `BuildPassword`.
pub struct EnvironmentSource<'a, E: EnvSource + ?Sized> {
    env: &'a E,
}

impl<'a, E: EnvSource + ?Sized> EnvironmentSource<'a, E> {
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }
}

impl<E: EnvSource + ?Sized> SettingSource for EnvironmentSource<'_, E> {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        let key = match setting {
            Setting::ServerUrl => vars::SERVER,
            Setting::Username => vars::USERNAME,
            Setting::Password => vars::PASSWORD,
            Setting::SelfConfigId => return None,
        };
        self.env.var(key)
    }
}

/// The agent's build properties file, located through
/// `TEAMCITY_BUILD_PROPERTIES_FILE`.
#[derive(Debug, Clone, Default)]
pub struct BuildPropertiesSource {
    properties: Option<Properties>,
}

impl BuildPropertiesSource {
    /// Locate and read the build properties file.
    ///
    /// An unset variable or a missing file gives an empty source.
    pub fn from_env<E: EnvSource + ?Sized>(env: &E) -> Result<Self, ConfigError> {
        let path = env
            .var(vars::BUILD_PROPERTIES_FILE)
            .filter(|p| !p.trim().is_empty());
        let Some(path) = path else {
            info!("Couldn't find build properties file.");
            return Ok(Self::default());
        };
        Ok(Self {
            properties: load_properties(Path::new(&path))?,
        })
    }

    #[must_use]
    pub fn from_properties(properties: Properties) -> Self {
        Self {
            properties: Some(properties),
        }
    }

    #[must_use]
    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    #[must_use]
    pub fn config_properties_path(&self) -> Option<&str> {
        self.properties
            .as_ref()?
            .get(CONFIG_PROPERTIES_FILE_KEY)
            .filter(|p| !p.trim().is_empty())
    }
}

impl SettingSource for BuildPropertiesSource {
    fn name(&self) -> &'static str {
        "build_properties"
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        let key = match setting {
            Setting::Username => "teamcity.auth.userId",
            Setting::Password => "teamcity.auth.password",
            Setting::SelfConfigId => "teamcity.buildType.id",
            Setting::ServerUrl => return None,
        };
        self.properties.as_ref()?.get(key).map(str::to_string)
    }
}

/// The configuration properties file named by the build properties.
#[derive(Debug, Clone, Default)]
pub struct ConfigPropertiesSource {
    properties: Option<Properties>,
}

impl ConfigPropertiesSource {
    pub fn from_build_properties(build: &BuildPropertiesSource) -> Result<Self, ConfigError> {
        if build.properties().is_none() {
            return Ok(Self::default());
        }
        let Some(path) = build.config_properties_path() else {
            info!("Couldn't find config properties file.");
            return Ok(Self::default());
        };
        Ok(Self {
            properties: load_properties(Path::new(path))?,
        })
    }

    #[must_use]
    pub fn from_properties(properties: Properties) -> Self {
        Self {
            properties: Some(properties),
        }
    }

    #[must_use]
    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

impl SettingSource for ConfigPropertiesSource {
    fn name(&self) -> &'static str {
        "config_properties"
    }

    fn lookup(&self, setting: Setting) -> Option<String> {
        match setting {
            Setting::ServerUrl => self
                .properties
                .as_ref()?
                .get("teamcity.serverUrl")
                .map(str::to_string),
            _ => None,
        }
    }
}

/// A resolved value and the source that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: &'static str,
}

/// Ordered list of sources; earlier sources take precedence.
#[derive(Default)]
pub struct ResolverChain<'a> {
    sources: Vec<&'a dyn SettingSource>,
}

impl<'a> ResolverChain<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, source: &'a dyn SettingSource) -> Self {
        self.sources.push(source);
        self
    }

    /// First non-blank value for `setting`, if any source has one.
    #[must_use]
    pub fn resolve(&self, setting: Setting) -> Option<Resolved> {
        let resolved = self.sources.iter().find_map(|source| {
            source
                .lookup(setting)
                .filter(|v| !v.trim().is_empty())
                .map(|value| Resolved {
                    value,
                    source: source.name(),
                })
        });
        match &resolved {
            Some(r) => debug!("Got {setting} from {}", r.source),
            None => debug!("No {setting} found in any source"),
        }
        resolved
    }
}
