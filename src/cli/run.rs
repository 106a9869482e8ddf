//! CLI entry point
//!
//! `run()` parses flags, loads the run configuration, creates the tokio
//! runtime and prints every error itself. main.rs only maps the returned
//! exit code.

use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use buildkick_client::HttpTransport;
use buildkick_config::env::read_bool;
use buildkick_config::{EnvSource, ProcessEnv, RunConfig, vars};
use buildkick_engine::TriggerRun;
use buildkick_report::{DebugArtifacts, RunSummary, ServiceMessages};
use buildkick_utils::error::BuildKickError;
use buildkick_utils::exit_codes::ExitCode;
use buildkick_utils::logging::init_tracing;

use super::args::Cli;

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after the error has been printed.
pub fn run() -> Result<(), ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = err.print();
                return Ok(());
            }
            eprintln!("{err}");
            eprintln!("{}", Cli::command().render_long_help());
            return Err(ExitCode::USAGE);
        }
    };
    run_with_env(&cli, &ProcessEnv)
}

/// Run with an explicit environment.
pub fn run_with_env<E: EnvSource + ?Sized>(cli: &Cli, env: &E) -> Result<(), ExitCode> {
    let verbose = cli.verbose || read_bool(env, vars::VERBOSE, false);
    if let Err(e) = init_tracing(verbose) {
        eprintln!("Warning: logging is unavailable: {e}");
    }

    let config = match RunConfig::load(env, &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            let err = BuildKickError::from(e);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return Err(ExitCode::FAILURE);
        }
    };

    match rt.block_on(trigger(&config)) {
        Ok(_) => Ok(()),
        Err(err) => {
            eprintln!("{}", err.display_for_user_with_redactor(&config.redactor()));
            Err(err.to_exit_code())
        }
    }
}

async fn trigger(config: &RunConfig) -> Result<RunSummary, BuildKickError> {
    let transport = HttpTransport::new(&config.credentials.username, &config.credentials.password)?;
    let messages = ServiceMessages::stdout(config.redactor());
    let artifacts = if config.debug {
        DebugArtifacts::new(config.debug_dir.clone(), config.redactor())
    } else {
        DebugArtifacts::disabled()
    };

    let cancel = CancellationToken::new();
    let watcher = watch_interrupt(cancel.clone());
    let result = TriggerRun::new(config, &transport, &messages, &artifacts)
        .with_cancellation(cancel)
        .execute()
        .await;
    watcher.abort();
    result
}

/// Cancel the run on Ctrl-C. Steps already switched off are still restored.
fn watch_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, restoring build steps before exit");
            cancel.cancel();
        }
    })
}
