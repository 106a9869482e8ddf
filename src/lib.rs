//! buildkick - trigger every build configuration on a CI server
//!
//! buildkick discovers all build configurations and their steps through the
//! server's REST API, applies an exclusion and step-disable policy, switches
//! selected steps off for the duration of the run, queues each remaining
//! configuration and waits until the server confirms the build left the
//! queue. A dry run walks the same decisions without changing anything.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export BuildServer=ci.example.com BuildUsername=bot BuildPassword=...
//! export BuildExcludeBuildConfigs=Nightly_Deploy
//! buildkick --dry-run --verbose
//! ```
//!
//! Inside a CI build the server address, credentials and the id of the
//! executing configuration are read from the build properties file, so only
//! the policy variables need to be set.
//!
//! # Quick Start (Library)
//!
//! ```ignore
//! use buildkick::{DebugArtifacts, HttpTransport, MapEnv, RunConfig, ServiceMessages, TriggerRun};
//!
//! let env = MapEnv::from([("BuildServer", "ci.example.com"), ("BuildUsername", "bot"), ("BuildPassword", "pw")]);
//! let config = RunConfig::load(&env, &Default::default())?;
//! let transport = HttpTransport::new(&config.credentials.username, &config.credentials.password)?;
//! let messages = ServiceMessages::stdout(config.redactor());
//! let summary = TriggerRun::new(&config, &transport, &messages, &DebugArtifacts::disabled())
//!     .execute()
//!     .await?;
//! ```
//!
//! # Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `buildkick-utils` | domain types, errors, exit codes, logging |
//! | `buildkick-redaction` | credential scrubbing |
//! | `buildkick-config` | environment and properties-file resolution |
//! | `buildkick-client` | REST transport and wire types |
//! | `buildkick-policy` | exclusion and step-disable evaluation |
//! | `buildkick-engine` | discovery, step toggling, queueing, confirmation |
//! | `buildkick-report` | console sections, summaries, debug artifacts |

pub mod cli;

pub use buildkick_client::{CiTransport, HttpTransport, RestPaths};
pub use buildkick_config::{CliOverrides, EnvSource, MapEnv, ProcessEnv, RunConfig};
pub use buildkick_engine::{Executor, PollSettings, StepBracket, TriggerRun, fetch_all};
pub use buildkick_policy::{PolicyOutcome, PolicyWarning, RunPolicy, evaluate};
pub use buildkick_redaction::CredentialRedactor;
pub use buildkick_report::{CapturedOutput, DebugArtifacts, RunSummary, ServiceMessages};
pub use buildkick_utils::{
    BuildConfig, BuildKickError, BuildStep, ConfigError, ExecutionRecord, ExecutionState,
    ExitCode, UserFriendlyError,
};
