//! CLI flag definitions
//!
//! Almost everything is configured through the environment, so a CI build
//! step can drive buildkick without a command line. The three flags here
//! override their environment counterparts.

use buildkick_config::CliOverrides;
use clap::Parser;

/// buildkick - trigger every build configuration on a CI server
#[derive(Debug, Parser)]
#[command(name = "buildkick")]
#[command(about = "Trigger every build configuration on a CI server")]
#[command(long_about = r#"
buildkick discovers every build configuration on a CI server, skips the
excluded ones, switches selected build steps off for the duration of the run,
queues a build of each remaining configuration and waits until the server
confirms it started.

EXAMPLES:
  # See what would happen without touching the server
  buildkick --dry-run --verbose

  # Trigger everything except the deploy pipelines, skipping publish steps
  BuildExcludeBuildConfigs=Deploy_Prod,Deploy_Staging \
  BuildDisableBuildStepTypes=NuGetPublish buildkick

ENVIRONMENT:
  BuildServer                  Server address; https:// is added when no scheme is given
  BuildUsername                User for HTTP basic authentication
  BuildPassword                Password for HTTP basic authentication
  TEAMCITY_BUILD_PROPERTIES_FILE
                               CI build properties file; supplies credentials, the
                               executing configuration and the server address
  BuildAdditionalParameters    Comma separated name=value parameters for every build
  BuildDisableBuildSteps       Comma separated step ids to switch off during the run
  BuildDisableBuildStepTypes   Comma separated step types to switch off during the run
  BuildDryRun                  true to log every decision without changing anything
  BuildExcludeBuildConfigs     Comma separated configuration ids never to trigger
  BuildExcludeBuildStepTypes   Skip configurations with an enabled step of these types
  BuildSortedExecution         Process configurations sorted by id (default: true)
  BuildDebug                   true to write request and response snapshots
  BuildVerbose                 true to print the step table and effective settings
  BuildDebugDir                Directory for debug snapshots (default: .)
  BuildPollIntervalSeconds     Pause between queue status checks (default: 1)
  BuildConfirmTimeoutSeconds   Give up waiting for a queued build (default: never)

EXIT CODES:
  0  every remaining configuration was triggered (or the dry run completed)
  1  configuration, network or server error, timeout, interrupt, or usage error
"#)]
#[command(version)]
pub struct Cli {
    /// Log every decision without changing anything on the server
    #[arg(long)]
    pub dry_run: bool,

    /// Print the step table, step type usage and effective settings
    #[arg(short, long)]
    pub verbose: bool,

    /// Write request and response snapshots to the debug directory
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Flags that were given; absent flags leave the environment in charge.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let given = |flag: bool| flag.then_some(true);
        CliOverrides {
            dry_run: given(self.dry_run),
            verbose: given(self.verbose),
            debug: given(self.debug),
        }
    }
}
